//! Artifact guard
//!
//! Notes and photos may only be written while their session is in progress
//! and only by the session's owner. Reads go through
//! [`super::SessionManager::session_detail`] instead.

use serde::Serialize;
use uuid::Uuid;

use super::manager::{SessionEvent, SessionManager};
use crate::error::{AppError, Result};
use crate::models::{Block, ImageUpload, NotePhoto, PhotoRecord, WorkSession, WorkSessionNote};
use crate::store::Store;

/// Where an uploaded photo goes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhotoTarget {
    /// A photo record against a photo-capture block of the session's manual
    Session { session_id: Uuid, block_id: Uuid },
    /// An attachment to an existing note
    Note { note_id: Uuid },
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AttachedPhoto {
    Record(PhotoRecord),
    Note(NotePhoto),
}

#[derive(Clone)]
pub struct ArtifactGuard {
    sessions: SessionManager,
    store: Store,
}

impl ArtifactGuard {
    pub fn new(sessions: SessionManager, store: Store) -> Self {
        Self { sessions, store }
    }

    /// The session, if `acting_user_id` may write to it right now
    pub async fn authorize_write(
        &self,
        session_id: Uuid,
        acting_user_id: Uuid,
    ) -> Result<WorkSession> {
        self.sessions
            .live_owned_session(session_id, acting_user_id)
            .await
            .inspect_err(|e| {
                tracing::debug!(
                    session_id = %session_id,
                    user_id = %acting_user_id,
                    "Artifact write rejected: {}",
                    e
                );
            })
    }

    pub async fn record_note(
        &self,
        session_id: Uuid,
        block_id: Uuid,
        content: &str,
        acting_user_id: Uuid,
    ) -> Result<WorkSessionNote> {
        let session = self.authorize_write(session_id, acting_user_id).await?;
        validate_note(content)?;

        let block = self.session_block(&session, block_id).await?;
        if !block.content.accepts_notes() {
            return Err(AppError::BadRequest(format!(
                "{} blocks do not take notes",
                block.content.block_type()
            )));
        }

        let note = self
            .store
            .insert_note(session.id, acting_user_id, block.id, content)
            .await?;

        self.sessions.publish(SessionEvent::NoteRecorded {
            session_id: session.id,
            note_id: note.id,
            block_id: block.id,
        });

        Ok(note)
    }

    pub async fn update_note(
        &self,
        note_id: Uuid,
        content: &str,
        acting_user_id: Uuid,
    ) -> Result<WorkSessionNote> {
        let note = self.require_note(note_id).await?;
        let session = self.authorize_write(note.session_id, acting_user_id).await?;
        validate_note(content)?;

        self.store
            .update_note(note.id, session.id, acting_user_id, content)
            .await
    }

    pub async fn delete_note(&self, note_id: Uuid, acting_user_id: Uuid) -> Result<()> {
        let note = self.require_note(note_id).await?;
        let session = self.authorize_write(note.session_id, acting_user_id).await?;

        self.store
            .delete_note(note.id, session.id, acting_user_id)
            .await
    }

    /// Store already-decoded image bytes against a session block or a note
    pub async fn attach_photo(
        &self,
        target: PhotoTarget,
        upload: ImageUpload,
        acting_user_id: Uuid,
    ) -> Result<AttachedPhoto> {
        match target {
            PhotoTarget::Session {
                session_id,
                block_id,
            } => {
                let session = self.authorize_write(session_id, acting_user_id).await?;
                validate_image(&upload)?;
                let block = self.session_block(&session, block_id).await?;
                if !block.content.accepts_photo_records() {
                    return Err(AppError::BadRequest(format!(
                        "{} blocks do not take photo records",
                        block.content.block_type()
                    )));
                }

                let record = self
                    .store
                    .insert_photo_record(session.id, acting_user_id, block.id, &upload)
                    .await?;

                self.sessions.publish(SessionEvent::PhotoAttached {
                    session_id: session.id,
                    photo_id: record.id,
                    block_id: block.id,
                });
                Ok(AttachedPhoto::Record(record))
            }
            PhotoTarget::Note { note_id } => {
                let note = self.require_note(note_id).await?;
                let session = self.authorize_write(note.session_id, acting_user_id).await?;
                validate_image(&upload)?;

                let photo = self
                    .store
                    .insert_note_photo(note.id, session.id, acting_user_id, &upload)
                    .await?;

                self.sessions.publish(SessionEvent::PhotoAttached {
                    session_id: session.id,
                    photo_id: photo.id,
                    block_id: note.block_id,
                });
                Ok(AttachedPhoto::Note(photo))
            }
        }
    }

    pub async fn delete_photo_record(&self, photo_id: Uuid, acting_user_id: Uuid) -> Result<()> {
        let record = self
            .store
            .find_photo_record(photo_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Photo {} not found", photo_id)))?;
        let session = self
            .authorize_write(record.session_id, acting_user_id)
            .await?;

        self.store
            .delete_photo_record(record.id, session.id, acting_user_id)
            .await
    }

    pub async fn delete_note_photo(&self, photo_id: Uuid, acting_user_id: Uuid) -> Result<()> {
        let photo = self
            .store
            .find_note_photo(photo_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Photo {} not found", photo_id)))?;
        let note = self.require_note(photo.note_id).await?;
        let session = self.authorize_write(note.session_id, acting_user_id).await?;

        self.store
            .delete_note_photo(photo.id, session.id, acting_user_id)
            .await
    }

    async fn require_note(&self, note_id: Uuid) -> Result<WorkSessionNote> {
        self.store
            .find_note(note_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Note {} not found", note_id)))
    }

    /// A block of the manual the session is running
    async fn session_block(&self, session: &WorkSession, block_id: Uuid) -> Result<Block> {
        let block = self.store.get_block(block_id).await?;
        if block.manual_id != session.manual_id {
            return Err(AppError::NotFound(format!(
                "Block {} is not part of this manual",
                block_id
            )));
        }
        Ok(block)
    }
}

fn validate_note(content: &str) -> Result<()> {
    if content.trim().is_empty() {
        return Err(AppError::BadRequest("Note content is empty".to_string()));
    }
    Ok(())
}

fn validate_image(upload: &ImageUpload) -> Result<()> {
    if upload.bytes.is_empty() {
        return Err(AppError::BadRequest("Image is empty".to_string()));
    }
    if !upload.content_type.starts_with("image/") {
        return Err(AppError::BadRequest(format!(
            "Unsupported content type: {}",
            upload.content_type
        )));
    }
    Ok(())
}
