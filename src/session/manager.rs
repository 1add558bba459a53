//! Session manager
//!
//! Lifecycle of a work session:
//! - `start` creates an `IN_PROGRESS` session (at most one per user and manual)
//! - `complete` moves it to `COMPLETED`, which is terminal
//! - `cancel` removes it together with its notes and photos
//!
//! Every transition re-reads storage; the storage guards decide races.

use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::access::capability::{can_edit_manual, manual_visible};
use crate::access::{AccessResolver, PermissionLevel};
use crate::error::{AppError, Result};
use crate::models::{SessionDetail, WorkSession};
use crate::store::Store;

/// Events emitted by the session manager and the artifact guard
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    Started {
        session_id: Uuid,
        user_id: Uuid,
        manual_id: Uuid,
    },
    Completed {
        session_id: Uuid,
        user_id: Uuid,
        manual_id: Uuid,
    },
    Cancelled {
        session_id: Uuid,
        user_id: Uuid,
        manual_id: Uuid,
    },
    NoteRecorded {
        session_id: Uuid,
        note_id: Uuid,
        block_id: Uuid,
    },
    PhotoAttached {
        session_id: Uuid,
        photo_id: Uuid,
        block_id: Uuid,
    },
}

#[derive(Clone)]
pub struct SessionManager {
    store: Store,
    resolver: AccessResolver<Store, Store>,
    event_tx: broadcast::Sender<SessionEvent>,
}

impl SessionManager {
    pub fn new(store: Store, resolver: AccessResolver<Store, Store>) -> Self {
        let (event_tx, _) = broadcast::channel(256);
        Self {
            store,
            resolver,
            event_tx,
        }
    }

    /// Subscribe to session events
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.event_tx.subscribe()
    }

    pub(crate) fn publish(&self, event: SessionEvent) {
        // No subscribers is fine.
        let _ = self.event_tx.send(event);
    }

    /// Start executing a manual
    pub async fn start(&self, user_id: Uuid, manual_id: Uuid) -> Result<WorkSession> {
        let manual = self.store.get_manual(manual_id).await?;
        let level = self.resolver.resolve(user_id, manual.business_id).await?;

        if !level.can_execute() || !manual_visible(level, &manual) {
            return Err(AppError::Forbidden(format!(
                "User {} cannot run manual {} at level {}",
                user_id, manual_id, level
            )));
        }

        let session = self.store.insert_session(user_id, manual_id).await?;

        tracing::info!(
            session_id = %session.id,
            user_id = %user_id,
            manual_id = %manual_id,
            "Work session started"
        );
        self.publish(SessionEvent::Started {
            session_id: session.id,
            user_id,
            manual_id,
        });

        Ok(session)
    }

    /// Complete a session. Only its owner may do so, whatever their level.
    pub async fn complete(&self, session_id: Uuid, acting_user_id: Uuid) -> Result<WorkSession> {
        let session = self.live_owned_session(session_id, acting_user_id).await?;
        let completed = self
            .store
            .complete_session(session.id, acting_user_id)
            .await?;

        tracing::info!(
            session_id = %completed.id,
            user_id = %completed.user_id,
            manual_id = %completed.manual_id,
            "Work session completed"
        );
        self.publish(SessionEvent::Completed {
            session_id: completed.id,
            user_id: completed.user_id,
            manual_id: completed.manual_id,
        });

        Ok(completed)
    }

    /// Cancel a session, deleting it and everything captured during it.
    /// Returns the session as it was before removal.
    pub async fn cancel(&self, session_id: Uuid, acting_user_id: Uuid) -> Result<WorkSession> {
        let session = self.live_owned_session(session_id, acting_user_id).await?;
        self.store
            .delete_session(session.id, acting_user_id)
            .await?;

        tracing::info!(
            session_id = %session.id,
            user_id = %session.user_id,
            manual_id = %session.manual_id,
            "Work session cancelled"
        );
        self.publish(SessionEvent::Cancelled {
            session_id: session.id,
            user_id: session.user_id,
            manual_id: session.manual_id,
        });

        Ok(session)
    }

    /// Current state of a session, straight from storage
    pub async fn get_session(&self, session_id: Uuid) -> Result<Option<WorkSession>> {
        self.store.find_session(session_id).await
    }

    /// The caller's in-progress session for a manual, if any
    pub async fn active_session(
        &self,
        user_id: Uuid,
        manual_id: Uuid,
    ) -> Result<Option<WorkSession>> {
        let manual = self.store.get_manual(manual_id).await?;
        let level = self.resolver.resolve(user_id, manual.business_id).await?;
        if level == PermissionLevel::None {
            return Err(AppError::Forbidden(format!(
                "User {} has no access to manual {}",
                user_id, manual_id
            )));
        }

        self.store.find_active_session(user_id, manual_id).await
    }

    /// A session with its notes and photos. The owner and editors may read it
    /// at any time. Anyone else with access to the business may read it once
    /// it is completed.
    pub async fn session_detail(
        &self,
        session_id: Uuid,
        acting_user_id: Uuid,
    ) -> Result<SessionDetail> {
        let session = self.require_session(session_id).await?;
        let manual = self.store.get_manual(session.manual_id).await?;
        let level = self
            .resolver
            .resolve(acting_user_id, manual.business_id)
            .await?;

        let allowed = if level == PermissionLevel::None {
            false
        } else {
            session.user_id == acting_user_id
                || can_edit_manual(level)
                || !session.is_in_progress()
        };
        if !allowed {
            return Err(AppError::Forbidden(format!(
                "User {} cannot read session {}",
                acting_user_id, session_id
            )));
        }

        let notes = self.store.list_notes(session.id).await?;
        let photo_records = self.store.list_photo_records(session.id).await?;

        Ok(SessionDetail {
            session,
            notes,
            photo_records,
        })
    }

    /// Sessions run against a manual. Editors see everyone's, others their own.
    pub async fn list_sessions(
        &self,
        manual_id: Uuid,
        acting_user_id: Uuid,
    ) -> Result<Vec<WorkSession>> {
        let manual = self.store.get_manual(manual_id).await?;
        let level = self
            .resolver
            .resolve(acting_user_id, manual.business_id)
            .await?;

        if !manual_visible(level, &manual) {
            return Err(AppError::Forbidden(format!(
                "User {} cannot see manual {}",
                acting_user_id, manual_id
            )));
        }

        let only_user = if can_edit_manual(level) {
            None
        } else {
            Some(acting_user_id)
        };
        self.store.list_sessions(manual_id, only_user).await
    }

    pub(crate) async fn require_session(&self, session_id: Uuid) -> Result<WorkSession> {
        self.get_session(session_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Session {} not found", session_id)))
    }

    /// Existence, then liveness, then ownership
    pub(crate) async fn live_owned_session(
        &self,
        session_id: Uuid,
        acting_user_id: Uuid,
    ) -> Result<WorkSession> {
        let session = self.require_session(session_id).await?;

        if !session.is_in_progress() {
            return Err(AppError::InvalidState(format!(
                "Session {} is {}",
                session_id,
                session.status.as_str()
            )));
        }

        if session.user_id != acting_user_id {
            return Err(AppError::Forbidden(format!(
                "User {} does not own session {}",
                acting_user_id, session_id
            )));
        }

        Ok(session)
    }
}
