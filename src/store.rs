//! Database store for tenants, manuals and work sessions
//!
//! All SQL lives here. Writes that depend on a work session being live carry
//! that condition in the statement itself, so a session that completes or is
//! cancelled between a check and a write still rejects the write.

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::collections::HashMap;
use uuid::Uuid;

use crate::access::{AccessLookup, UserLookup};
use crate::error::{AppError, Result};
use crate::models::{
    Block, BlockContent, Business, BusinessAccess, ImageUpload, Manual, ManualStatus, NotePhoto,
    PhotoRecord, Role, SessionStatus, User, WorkSession, WorkSessionNote,
};

/// Matches a live session owned by the acting user. Binds: session id, user id.
const LIVE_SESSION: &str =
    "EXISTS (SELECT 1 FROM work_sessions s WHERE s.id = ? AND s.user_id = ? AND s.status = 'IN_PROGRESS')";

/// Database store
#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open a pool and bring the schema up to date
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| AppError::Internal(format!("Migration failed: {}", e)))?;

        Ok(Self::new(pool))
    }

    // User operations

    pub async fn create_user(&self, name: &str, email: &str, is_super_admin: bool) -> Result<User> {
        let id = Uuid::new_v4();
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO users (id, name, email, is_super_admin, is_active, created_at)
            VALUES (?, ?, ?, ?, TRUE, ?)
            "#,
        )
        .bind(id.to_string())
        .bind(name)
        .bind(email)
        .bind(is_super_admin)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, format!("Email {} is already registered", email)))?;

        Ok(User {
            id,
            name: name.to_string(),
            email: email.to_string(),
            is_super_admin,
            is_active: true,
            created_at: now,
        })
    }

    pub async fn find_user(&self, id: Uuid) -> Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, name, email, is_super_admin, is_active, created_at
            FROM users
            WHERE id = ?
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(User::try_from).transpose()
    }

    pub async fn get_user(&self, id: Uuid) -> Result<User> {
        self.find_user(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", id)))
    }

    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, name, email, is_super_admin, is_active, created_at
            FROM users
            WHERE email = ?
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        row.map(User::try_from).transpose()
    }

    /// Create a superadmin with this email unless a user already has it
    pub async fn ensure_superadmin(&self, email: &str) -> Result<User> {
        if let Some(existing) = self.find_user_by_email(email).await? {
            if !existing.is_super_admin {
                tracing::warn!(user_id = %existing.id, "Bootstrap email belongs to a regular user");
            }
            return Ok(existing);
        }

        self.create_user("Superadmin", email, true).await
    }

    pub async fn set_user_active(&self, id: Uuid, is_active: bool) -> Result<User> {
        let result = sqlx::query("UPDATE users SET is_active = ? WHERE id = ?")
            .bind(is_active)
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("User {} not found", id)));
        }

        self.get_user(id).await
    }

    // Business operations

    pub async fn create_business(&self, name: &str) -> Result<Business> {
        let id = Uuid::new_v4();
        let now = Utc::now();

        sqlx::query("INSERT INTO businesses (id, name, created_at) VALUES (?, ?, ?)")
            .bind(id.to_string())
            .bind(name)
            .bind(now)
            .execute(&self.pool)
            .await?;

        Ok(Business {
            id,
            name: name.to_string(),
            created_at: now,
        })
    }

    pub async fn get_business(&self, id: Uuid) -> Result<Business> {
        let row = sqlx::query_as::<_, BusinessRow>(
            "SELECT id, name, created_at FROM businesses WHERE id = ?",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Business {} not found", id)))?;

        row.try_into()
    }

    // Business access operations

    /// Grant `role` to a user within a business, replacing any existing role
    pub async fn grant_access(
        &self,
        user_id: Uuid,
        business_id: Uuid,
        role: Role,
    ) -> Result<BusinessAccess> {
        sqlx::query(
            r#"
            INSERT INTO business_access (user_id, business_id, role, created_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT (user_id, business_id) DO UPDATE SET role = excluded.role
            "#,
        )
        .bind(user_id.to_string())
        .bind(business_id.to_string())
        .bind(role.as_str())
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        self.find_access(user_id, business_id)
            .await?
            .ok_or_else(|| AppError::Internal("Access grant vanished after upsert".to_string()))
    }

    pub async fn revoke_access(&self, user_id: Uuid, business_id: Uuid) -> Result<()> {
        let result =
            sqlx::query("DELETE FROM business_access WHERE user_id = ? AND business_id = ?")
                .bind(user_id.to_string())
                .bind(business_id.to_string())
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "User {} has no access to business {}",
                user_id, business_id
            )));
        }
        Ok(())
    }

    pub async fn find_access(
        &self,
        user_id: Uuid,
        business_id: Uuid,
    ) -> Result<Option<BusinessAccess>> {
        let row = sqlx::query_as::<_, AccessRow>(
            r#"
            SELECT user_id, business_id, role, created_at
            FROM business_access
            WHERE user_id = ? AND business_id = ?
            "#,
        )
        .bind(user_id.to_string())
        .bind(business_id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(BusinessAccess::try_from).transpose()
    }

    pub async fn list_access(&self, business_id: Uuid) -> Result<Vec<BusinessAccess>> {
        let rows = sqlx::query_as::<_, AccessRow>(
            r#"
            SELECT user_id, business_id, role, created_at
            FROM business_access
            WHERE business_id = ?
            ORDER BY created_at ASC
            "#,
        )
        .bind(business_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(|r| r.try_into()).collect()
    }

    // Manual operations

    pub async fn create_manual(
        &self,
        business_id: Uuid,
        title: &str,
        admin_only: bool,
    ) -> Result<Manual> {
        let id = Uuid::new_v4();
        let now = Utc::now();
        let status = ManualStatus::Draft;

        sqlx::query(
            r#"
            INSERT INTO manuals (id, business_id, title, status, admin_only, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(id.to_string())
        .bind(business_id.to_string())
        .bind(title)
        .bind(status.as_str())
        .bind(admin_only)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(Manual {
            id,
            business_id,
            title: title.to_string(),
            status,
            admin_only,
            created_at: now,
            updated_at: now,
        })
    }

    pub async fn get_manual(&self, id: Uuid) -> Result<Manual> {
        let row = sqlx::query_as::<_, ManualRow>(
            r#"
            SELECT id, business_id, title, status, admin_only, created_at, updated_at
            FROM manuals
            WHERE id = ?
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Manual {} not found", id)))?;

        row.try_into()
    }

    pub async fn list_manuals(&self, business_id: Uuid) -> Result<Vec<Manual>> {
        let rows = sqlx::query_as::<_, ManualRow>(
            r#"
            SELECT id, business_id, title, status, admin_only, created_at, updated_at
            FROM manuals
            WHERE business_id = ?
            ORDER BY title ASC
            "#,
        )
        .bind(business_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(|r| r.try_into()).collect()
    }

    pub async fn set_manual_status(&self, id: Uuid, status: ManualStatus) -> Result<Manual> {
        let result = sqlx::query("UPDATE manuals SET status = ?, updated_at = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(Utc::now())
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Manual {} not found", id)));
        }

        self.get_manual(id).await
    }

    // Block operations

    /// Append a block after the manual's current last block
    pub async fn add_block(&self, manual_id: Uuid, content: BlockContent) -> Result<Block> {
        let id = Uuid::new_v4();
        let now = Utc::now();
        let json = serde_json::to_string(&content)
            .map_err(|e| AppError::Internal(format!("Failed to encode block: {}", e)))?;

        let position: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO blocks (id, manual_id, position, block_type, content, created_at)
            SELECT ?, ?, COALESCE(MAX(position) + 1, 0), ?, ?, ?
            FROM blocks
            WHERE manual_id = ?
            RETURNING position
            "#,
        )
        .bind(id.to_string())
        .bind(manual_id.to_string())
        .bind(content.block_type())
        .bind(&json)
        .bind(now)
        .bind(manual_id.to_string())
        .fetch_one(&self.pool)
        .await?;

        Ok(Block {
            id,
            manual_id,
            position,
            content,
            created_at: now,
        })
    }

    pub async fn get_block(&self, id: Uuid) -> Result<Block> {
        let row = sqlx::query_as::<_, BlockRow>(
            r#"
            SELECT id, manual_id, position, block_type, content, created_at
            FROM blocks
            WHERE id = ?
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Block {} not found", id)))?;

        row.try_into()
    }

    pub async fn list_blocks(&self, manual_id: Uuid) -> Result<Vec<Block>> {
        let rows = sqlx::query_as::<_, BlockRow>(
            r#"
            SELECT id, manual_id, position, block_type, content, created_at
            FROM blocks
            WHERE manual_id = ?
            ORDER BY position ASC
            "#,
        )
        .bind(manual_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(|r| r.try_into()).collect()
    }

    // Work session operations

    /// Insert a new in-progress session. The partial unique index on
    /// (user_id, manual_id) turns a second live session into `Conflict`.
    pub async fn insert_session(&self, user_id: Uuid, manual_id: Uuid) -> Result<WorkSession> {
        let id = Uuid::new_v4();
        let now = Utc::now();
        let status = SessionStatus::InProgress;

        sqlx::query(
            r#"
            INSERT INTO work_sessions (id, user_id, manual_id, status, started_at, completed_at)
            VALUES (?, ?, ?, ?, ?, NULL)
            "#,
        )
        .bind(id.to_string())
        .bind(user_id.to_string())
        .bind(manual_id.to_string())
        .bind(status.as_str())
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            conflict_on_unique(
                e,
                format!("A session for manual {} is already in progress", manual_id),
            )
        })?;

        Ok(WorkSession {
            id,
            user_id,
            manual_id,
            status,
            started_at: now,
            completed_at: None,
        })
    }

    pub async fn find_session(&self, id: Uuid) -> Result<Option<WorkSession>> {
        let row = sqlx::query_as::<_, SessionRow>(
            r#"
            SELECT id, user_id, manual_id, status, started_at, completed_at
            FROM work_sessions
            WHERE id = ?
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(WorkSession::try_from).transpose()
    }

    pub async fn find_active_session(
        &self,
        user_id: Uuid,
        manual_id: Uuid,
    ) -> Result<Option<WorkSession>> {
        let row = sqlx::query_as::<_, SessionRow>(
            r#"
            SELECT id, user_id, manual_id, status, started_at, completed_at
            FROM work_sessions
            WHERE user_id = ? AND manual_id = ? AND status = 'IN_PROGRESS'
            "#,
        )
        .bind(user_id.to_string())
        .bind(manual_id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(WorkSession::try_from).transpose()
    }

    /// Sessions for a manual, newest first, optionally narrowed to one user
    pub async fn list_sessions(
        &self,
        manual_id: Uuid,
        user_id: Option<Uuid>,
    ) -> Result<Vec<WorkSession>> {
        let rows = sqlx::query_as::<_, SessionRow>(
            r#"
            SELECT id, user_id, manual_id, status, started_at, completed_at
            FROM work_sessions
            WHERE manual_id = ? AND (? IS NULL OR user_id = ?)
            ORDER BY started_at DESC
            "#,
        )
        .bind(manual_id.to_string())
        .bind(user_id.map(|u| u.to_string()))
        .bind(user_id.map(|u| u.to_string()))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(|r| r.try_into()).collect()
    }

    pub async fn count_active_sessions(&self, user_id: Uuid, manual_id: Uuid) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM work_sessions
            WHERE user_id = ? AND manual_id = ? AND status = 'IN_PROGRESS'
            "#,
        )
        .bind(user_id.to_string())
        .bind(manual_id.to_string())
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    /// Transition an in-progress session to completed. Only a row still in
    /// progress and owned by `user_id` is touched.
    pub async fn complete_session(&self, id: Uuid, user_id: Uuid) -> Result<WorkSession> {
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE work_sessions SET status = 'COMPLETED', completed_at = ?
            WHERE id = ? AND user_id = ? AND status = 'IN_PROGRESS'
            "#,
        )
        .bind(now)
        .bind(id.to_string())
        .bind(user_id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(session_not_live(id));
        }

        self.find_session(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Session {} not found", id)))
    }

    /// Remove an in-progress session and everything captured during it, in
    /// one transaction.
    pub async fn delete_session(&self, id: Uuid, user_id: Uuid) -> Result<()> {
        let session_id = id.to_string();
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            DELETE FROM note_photos
            WHERE note_id IN (SELECT id FROM work_session_notes WHERE session_id = ?)
            "#,
        )
        .bind(&session_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM work_session_notes WHERE session_id = ?")
            .bind(&session_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM photo_records WHERE session_id = ?")
            .bind(&session_id)
            .execute(&mut *tx)
            .await?;

        let result = sqlx::query(
            "DELETE FROM work_sessions WHERE id = ? AND user_id = ? AND status = 'IN_PROGRESS'",
        )
        .bind(&session_id)
        .bind(user_id.to_string())
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(session_not_live(id));
        }

        tx.commit().await?;
        Ok(())
    }

    // Note operations

    pub async fn insert_note(
        &self,
        session_id: Uuid,
        user_id: Uuid,
        block_id: Uuid,
        content: &str,
    ) -> Result<WorkSessionNote> {
        let id = Uuid::new_v4();
        let now = Utc::now();

        let result = sqlx::query(&format!(
            r#"
            INSERT INTO work_session_notes (id, session_id, block_id, content, created_at, updated_at)
            SELECT ?, ?, ?, ?, ?, ?
            WHERE {LIVE_SESSION}
            "#
        ))
        .bind(id.to_string())
        .bind(session_id.to_string())
        .bind(block_id.to_string())
        .bind(content)
        .bind(now)
        .bind(now)
        .bind(session_id.to_string())
        .bind(user_id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(session_not_live(session_id));
        }

        Ok(WorkSessionNote {
            id,
            session_id,
            block_id,
            content: content.to_string(),
            photos: Vec::new(),
            created_at: now,
            updated_at: now,
        })
    }

    /// A note without its photos
    pub async fn find_note(&self, id: Uuid) -> Result<Option<WorkSessionNote>> {
        let row = sqlx::query_as::<_, NoteRow>(
            r#"
            SELECT id, session_id, block_id, content, created_at, updated_at
            FROM work_session_notes
            WHERE id = ?
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(WorkSessionNote::try_from).transpose()
    }

    pub async fn update_note(
        &self,
        id: Uuid,
        session_id: Uuid,
        user_id: Uuid,
        content: &str,
    ) -> Result<WorkSessionNote> {
        let result = sqlx::query(&format!(
            r#"
            UPDATE work_session_notes SET content = ?, updated_at = ?
            WHERE id = ? AND {LIVE_SESSION}
            "#
        ))
        .bind(content)
        .bind(Utc::now())
        .bind(id.to_string())
        .bind(session_id.to_string())
        .bind(user_id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(session_not_live(session_id));
        }

        let mut note = self
            .find_note(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Note {} not found", id)))?;
        note.photos = self.list_note_photos(id).await?;
        Ok(note)
    }

    pub async fn delete_note(&self, id: Uuid, session_id: Uuid, user_id: Uuid) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(&format!(
            "DELETE FROM note_photos WHERE note_id = ? AND {LIVE_SESSION}"
        ))
        .bind(id.to_string())
        .bind(session_id.to_string())
        .bind(user_id.to_string())
        .execute(&mut *tx)
        .await?;

        let result = sqlx::query(&format!(
            "DELETE FROM work_session_notes WHERE id = ? AND {LIVE_SESSION}"
        ))
        .bind(id.to_string())
        .bind(session_id.to_string())
        .bind(user_id.to_string())
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(session_not_live(session_id));
        }

        tx.commit().await?;
        Ok(())
    }

    /// Notes of a session with their photos, oldest first
    pub async fn list_notes(&self, session_id: Uuid) -> Result<Vec<WorkSessionNote>> {
        let rows = sqlx::query_as::<_, NoteRow>(
            r#"
            SELECT id, session_id, block_id, content, created_at, updated_at
            FROM work_session_notes
            WHERE session_id = ?
            ORDER BY created_at ASC
            "#,
        )
        .bind(session_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        let photo_rows = sqlx::query_as::<_, NotePhotoRow>(
            r#"
            SELECT p.id, p.note_id, p.content_type, p.byte_len, p.created_at
            FROM note_photos p
            JOIN work_session_notes n ON n.id = p.note_id
            WHERE n.session_id = ?
            ORDER BY p.created_at ASC
            "#,
        )
        .bind(session_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        let mut photos: HashMap<Uuid, Vec<NotePhoto>> = HashMap::new();
        for row in photo_rows {
            let photo = NotePhoto::try_from(row)?;
            photos.entry(photo.note_id).or_default().push(photo);
        }

        rows.into_iter()
            .map(|r| {
                let mut note = WorkSessionNote::try_from(r)?;
                note.photos = photos.remove(&note.id).unwrap_or_default();
                Ok(note)
            })
            .collect()
    }

    // Photo operations

    pub async fn insert_note_photo(
        &self,
        note_id: Uuid,
        session_id: Uuid,
        user_id: Uuid,
        upload: &ImageUpload,
    ) -> Result<NotePhoto> {
        let id = Uuid::new_v4();
        let now = Utc::now();
        let byte_len = upload.bytes.len() as i64;

        let result = sqlx::query(&format!(
            r#"
            INSERT INTO note_photos (id, note_id, content_type, data, byte_len, created_at)
            SELECT ?, ?, ?, ?, ?, ?
            WHERE {LIVE_SESSION}
            "#
        ))
        .bind(id.to_string())
        .bind(note_id.to_string())
        .bind(&upload.content_type)
        .bind(&upload.bytes)
        .bind(byte_len)
        .bind(now)
        .bind(session_id.to_string())
        .bind(user_id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(session_not_live(session_id));
        }

        Ok(NotePhoto {
            id,
            note_id,
            content_type: upload.content_type.clone(),
            byte_len,
            created_at: now,
        })
    }

    pub async fn find_note_photo(&self, id: Uuid) -> Result<Option<NotePhoto>> {
        let row = sqlx::query_as::<_, NotePhotoRow>(
            r#"
            SELECT id, note_id, content_type, byte_len, created_at
            FROM note_photos
            WHERE id = ?
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(NotePhoto::try_from).transpose()
    }

    pub async fn list_note_photos(&self, note_id: Uuid) -> Result<Vec<NotePhoto>> {
        let rows = sqlx::query_as::<_, NotePhotoRow>(
            r#"
            SELECT id, note_id, content_type, byte_len, created_at
            FROM note_photos
            WHERE note_id = ?
            ORDER BY created_at ASC
            "#,
        )
        .bind(note_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(|r| r.try_into()).collect()
    }

    pub async fn delete_note_photo(&self, id: Uuid, session_id: Uuid, user_id: Uuid) -> Result<()> {
        let result = sqlx::query(&format!(
            "DELETE FROM note_photos WHERE id = ? AND {LIVE_SESSION}"
        ))
        .bind(id.to_string())
        .bind(session_id.to_string())
        .bind(user_id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(session_not_live(session_id));
        }
        Ok(())
    }

    pub async fn insert_photo_record(
        &self,
        session_id: Uuid,
        user_id: Uuid,
        block_id: Uuid,
        upload: &ImageUpload,
    ) -> Result<PhotoRecord> {
        let id = Uuid::new_v4();
        let now = Utc::now();
        let byte_len = upload.bytes.len() as i64;

        let result = sqlx::query(&format!(
            r#"
            INSERT INTO photo_records (id, session_id, block_id, content_type, data, byte_len, created_at)
            SELECT ?, ?, ?, ?, ?, ?, ?
            WHERE {LIVE_SESSION}
            "#
        ))
        .bind(id.to_string())
        .bind(session_id.to_string())
        .bind(block_id.to_string())
        .bind(&upload.content_type)
        .bind(&upload.bytes)
        .bind(byte_len)
        .bind(now)
        .bind(session_id.to_string())
        .bind(user_id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(session_not_live(session_id));
        }

        Ok(PhotoRecord {
            id,
            session_id,
            block_id,
            content_type: upload.content_type.clone(),
            byte_len,
            created_at: now,
        })
    }

    pub async fn find_photo_record(&self, id: Uuid) -> Result<Option<PhotoRecord>> {
        let row = sqlx::query_as::<_, PhotoRecordRow>(
            r#"
            SELECT id, session_id, block_id, content_type, byte_len, created_at
            FROM photo_records
            WHERE id = ?
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(PhotoRecord::try_from).transpose()
    }

    pub async fn list_photo_records(&self, session_id: Uuid) -> Result<Vec<PhotoRecord>> {
        let rows = sqlx::query_as::<_, PhotoRecordRow>(
            r#"
            SELECT id, session_id, block_id, content_type, byte_len, created_at
            FROM photo_records
            WHERE session_id = ?
            ORDER BY created_at ASC
            "#,
        )
        .bind(session_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(|r| r.try_into()).collect()
    }

    pub async fn delete_photo_record(
        &self,
        id: Uuid,
        session_id: Uuid,
        user_id: Uuid,
    ) -> Result<()> {
        let result = sqlx::query(&format!(
            "DELETE FROM photo_records WHERE id = ? AND {LIVE_SESSION}"
        ))
        .bind(id.to_string())
        .bind(session_id.to_string())
        .bind(user_id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(session_not_live(session_id));
        }
        Ok(())
    }
}

impl UserLookup for Store {
    async fn find_user(&self, user_id: Uuid) -> Result<Option<User>> {
        Store::find_user(self, user_id).await
    }
}

impl AccessLookup for Store {
    async fn find_access(&self, user_id: Uuid, business_id: Uuid) -> Result<Option<BusinessAccess>> {
        Store::find_access(self, user_id, business_id).await
    }
}

fn conflict_on_unique(err: sqlx::Error, message: String) -> AppError {
    if let sqlx::Error::Database(db) = &err {
        if db.is_unique_violation() {
            return AppError::Conflict(message);
        }
    }
    AppError::Database(err)
}

fn session_not_live(id: Uuid) -> AppError {
    AppError::InvalidState(format!("Session {} is not in progress", id))
}

fn parse_uuid(value: &str, field: &str) -> Result<Uuid> {
    Uuid::parse_str(value).map_err(|e| AppError::Internal(format!("Invalid {} UUID: {}", field, e)))
}

// Internal row types for sqlx

#[derive(sqlx::FromRow)]
struct UserRow {
    id: String,
    name: String,
    email: String,
    is_super_admin: bool,
    is_active: bool,
    created_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = AppError;

    fn try_from(row: UserRow) -> Result<Self> {
        Ok(User {
            id: parse_uuid(&row.id, "user")?,
            name: row.name,
            email: row.email,
            is_super_admin: row.is_super_admin,
            is_active: row.is_active,
            created_at: row.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct BusinessRow {
    id: String,
    name: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<BusinessRow> for Business {
    type Error = AppError;

    fn try_from(row: BusinessRow) -> Result<Self> {
        Ok(Business {
            id: parse_uuid(&row.id, "business")?,
            name: row.name,
            created_at: row.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct AccessRow {
    user_id: String,
    business_id: String,
    role: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<AccessRow> for BusinessAccess {
    type Error = AppError;

    fn try_from(row: AccessRow) -> Result<Self> {
        Ok(BusinessAccess {
            user_id: parse_uuid(&row.user_id, "user")?,
            business_id: parse_uuid(&row.business_id, "business")?,
            role: row.role.parse().map_err(AppError::Internal)?,
            created_at: row.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct ManualRow {
    id: String,
    business_id: String,
    title: String,
    status: String,
    admin_only: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ManualRow> for Manual {
    type Error = AppError;

    fn try_from(row: ManualRow) -> Result<Self> {
        Ok(Manual {
            id: parse_uuid(&row.id, "manual")?,
            business_id: parse_uuid(&row.business_id, "business")?,
            title: row.title,
            status: row.status.parse().map_err(AppError::Internal)?,
            admin_only: row.admin_only,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct BlockRow {
    id: String,
    manual_id: String,
    position: i64,
    block_type: String,
    content: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<BlockRow> for Block {
    type Error = AppError;

    fn try_from(row: BlockRow) -> Result<Self> {
        let content: BlockContent = serde_json::from_str(&row.content)
            .map_err(|e| AppError::Internal(format!("Invalid block content: {}", e)))?;
        if content.block_type() != row.block_type {
            return Err(AppError::Internal(format!(
                "Block {} is stored as {} but holds {}",
                row.id,
                row.block_type,
                content.block_type()
            )));
        }

        Ok(Block {
            id: parse_uuid(&row.id, "block")?,
            manual_id: parse_uuid(&row.manual_id, "manual")?,
            position: row.position,
            content,
            created_at: row.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct SessionRow {
    id: String,
    user_id: String,
    manual_id: String,
    status: String,
    started_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
}

impl TryFrom<SessionRow> for WorkSession {
    type Error = AppError;

    fn try_from(row: SessionRow) -> Result<Self> {
        Ok(WorkSession {
            id: parse_uuid(&row.id, "session")?,
            user_id: parse_uuid(&row.user_id, "user")?,
            manual_id: parse_uuid(&row.manual_id, "manual")?,
            status: row.status.parse().map_err(AppError::Internal)?,
            started_at: row.started_at,
            completed_at: row.completed_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct NoteRow {
    id: String,
    session_id: String,
    block_id: String,
    content: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<NoteRow> for WorkSessionNote {
    type Error = AppError;

    fn try_from(row: NoteRow) -> Result<Self> {
        Ok(WorkSessionNote {
            id: parse_uuid(&row.id, "note")?,
            session_id: parse_uuid(&row.session_id, "session")?,
            block_id: parse_uuid(&row.block_id, "block")?,
            content: row.content,
            photos: Vec::new(),
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct NotePhotoRow {
    id: String,
    note_id: String,
    content_type: String,
    byte_len: i64,
    created_at: DateTime<Utc>,
}

impl TryFrom<NotePhotoRow> for NotePhoto {
    type Error = AppError;

    fn try_from(row: NotePhotoRow) -> Result<Self> {
        Ok(NotePhoto {
            id: parse_uuid(&row.id, "photo")?,
            note_id: parse_uuid(&row.note_id, "note")?,
            content_type: row.content_type,
            byte_len: row.byte_len,
            created_at: row.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct PhotoRecordRow {
    id: String,
    session_id: String,
    block_id: String,
    content_type: String,
    byte_len: i64,
    created_at: DateTime<Utc>,
}

impl TryFrom<PhotoRecordRow> for PhotoRecord {
    type Error = AppError;

    fn try_from(row: PhotoRecordRow) -> Result<Self> {
        Ok(PhotoRecord {
            id: parse_uuid(&row.id, "photo record")?,
            session_id: parse_uuid(&row.session_id, "session")?,
            block_id: parse_uuid(&row.block_id, "block")?,
            content_type: row.content_type,
            byte_len: row.byte_len,
            created_at: row.created_at,
        })
    }
}
