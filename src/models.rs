//! Data models for tenants, manuals and work sessions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A platform user. Superadmin status is global.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub is_super_admin: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Business {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// Role granted to a user within one business
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Admin,
    Worker,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::Worker => "WORKER",
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ADMIN" => Ok(Role::Admin),
            "WORKER" => Ok(Role::Worker),
            _ => Err(format!("Invalid role: {}", s)),
        }
    }
}

/// The persisted grant of a role to a user within one business
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BusinessAccess {
    pub user_id: Uuid,
    pub business_id: Uuid,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ManualStatus {
    Draft,
    Published,
}

impl ManualStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ManualStatus::Draft => "DRAFT",
            ManualStatus::Published => "PUBLISHED",
        }
    }
}

impl std::str::FromStr for ManualStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DRAFT" => Ok(ManualStatus::Draft),
            "PUBLISHED" => Ok(ManualStatus::Published),
            _ => Err(format!("Invalid manual status: {}", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manual {
    pub id: Uuid,
    pub business_id: Uuid,
    pub title: String,
    pub status: ManualStatus,
    /// Hidden from workers even when they have access to the business
    pub admin_only: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Block payload, discriminated by `type`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BlockContent {
    Text {
        body: String,
    },
    Image {
        url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        caption: Option<String>,
    },
    Warning {
        message: String,
    },
    /// Items a worker confirms while executing. Tick state lives only in the
    /// viewer and is never stored.
    Checkpoint {
        items: Vec<String>,
    },
    PhotoRecord {
        instructions: String,
    },
}

impl BlockContent {
    pub fn block_type(&self) -> &'static str {
        match self {
            BlockContent::Text { .. } => "TEXT",
            BlockContent::Image { .. } => "IMAGE",
            BlockContent::Warning { .. } => "WARNING",
            BlockContent::Checkpoint { .. } => "CHECKPOINT",
            BlockContent::PhotoRecord { .. } => "PHOTO_RECORD",
        }
    }

    /// Whether a work session note may be attached to this block
    pub fn accepts_notes(&self) -> bool {
        match self {
            BlockContent::Text { .. }
            | BlockContent::Image { .. }
            | BlockContent::Warning { .. }
            | BlockContent::Checkpoint { .. }
            | BlockContent::PhotoRecord { .. } => true,
        }
    }

    /// Whether session photo records may be captured against this block
    pub fn accepts_photo_records(&self) -> bool {
        match self {
            BlockContent::PhotoRecord { .. } => true,
            BlockContent::Text { .. }
            | BlockContent::Image { .. }
            | BlockContent::Warning { .. }
            | BlockContent::Checkpoint { .. } => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    pub id: Uuid,
    pub manual_id: Uuid,
    pub position: i64,
    pub content: BlockContent,
    pub created_at: DateTime<Utc>,
}

/// Status of a work session. Cancellation removes the row instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    InProgress,
    Completed,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::InProgress => "IN_PROGRESS",
            SessionStatus::Completed => "COMPLETED",
        }
    }
}

impl std::str::FromStr for SessionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "IN_PROGRESS" => Ok(SessionStatus::InProgress),
            "COMPLETED" => Ok(SessionStatus::Completed),
            _ => Err(format!("Invalid session status: {}", s)),
        }
    }
}

/// One user actively executing one manual
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkSession {
    pub id: Uuid,
    pub user_id: Uuid,
    pub manual_id: Uuid,
    pub status: SessionStatus,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl WorkSession {
    pub fn is_in_progress(&self) -> bool {
        self.status == SessionStatus::InProgress
    }
}

/// Metadata for a stored image. The bytes themselves are served separately.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotePhoto {
    pub id: Uuid,
    pub note_id: Uuid,
    pub content_type: String,
    pub byte_len: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkSessionNote {
    pub id: Uuid,
    pub session_id: Uuid,
    pub block_id: Uuid,
    pub content: String,
    pub photos: Vec<NotePhoto>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhotoRecord {
    pub id: Uuid,
    pub session_id: Uuid,
    pub block_id: Uuid,
    pub content_type: String,
    pub byte_len: i64,
    pub created_at: DateTime<Utc>,
}

/// A session together with everything captured during it
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionDetail {
    pub session: WorkSession,
    pub notes: Vec<WorkSessionNote>,
    pub photo_records: Vec<PhotoRecord>,
}

/// A manual together with its ordered blocks
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ManualWithBlocks {
    #[serde(flatten)]
    pub manual: Manual,
    pub blocks: Vec<Block>,
}

/// Already-decoded image handed over by the upload collaborator
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub content_type: String,
    pub bytes: Vec<u8>,
}

// Request bodies

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub is_super_admin: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    pub is_active: bool,
}

#[derive(Debug, Deserialize)]
pub struct CreateBusinessRequest {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct GrantAccessRequest {
    pub role: Role,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateManualRequest {
    pub title: String,
    #[serde(default)]
    pub admin_only: bool,
}

#[derive(Debug, Deserialize)]
pub struct UpdateManualRequest {
    pub status: ManualStatus,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordNoteRequest {
    pub block_id: Uuid,
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateNoteRequest {
    pub content: String,
}
