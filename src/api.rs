//! HTTP routes
//!
//! The acting user is always explicit: the `x-user-id` header is resolved to a
//! user on every request and every handler authorizes through a fresh
//! [`crate::access::AccessResolver::resolve`] call.

use axum::{
    async_trait,
    body::Bytes,
    extract::{DefaultBodyLimit, FromRequestParts, Path, State},
    http::{header::CONTENT_TYPE, request::Parts, HeaderMap, StatusCode},
    routing::{delete, get, patch, post, put},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::access::capability::{
    can_edit_manual, can_manage_businesses, can_manage_users, manual_visible,
};
use crate::access::{AccessDescriptor, Capabilities, PermissionLevel};
use crate::error::{AppError, Result};
use crate::models::{
    Block, BlockContent, Business, BusinessAccess, CreateBusinessRequest, CreateManualRequest,
    CreateUserRequest, GrantAccessRequest, ImageUpload, Manual, ManualWithBlocks,
    RecordNoteRequest, SessionDetail, UpdateManualRequest, UpdateNoteRequest, UpdateUserRequest,
    User, WorkSession, WorkSessionNote,
};
use crate::session::{AttachedPhoto, PhotoTarget};
use crate::AppState;

pub const USER_HEADER: &str = "x-user-id";

/// Build the application router
pub fn router(state: Arc<AppState>, max_photo_bytes: usize) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/users", post(create_user))
        .route("/users/:id", patch(update_user))
        .route("/businesses", post(create_business))
        .route("/businesses/:id/access", get(describe_access))
        .route("/businesses/:id/members", get(list_members))
        .route(
            "/businesses/:id/members/:user_id",
            put(grant_member).delete(revoke_member),
        )
        .route(
            "/businesses/:id/manuals",
            get(list_manuals).post(create_manual),
        )
        .route("/manuals/:id", get(get_manual).patch(update_manual))
        .route("/manuals/:id/blocks", post(add_block))
        .route(
            "/manuals/:id/sessions",
            get(list_sessions).post(start_session),
        )
        .route("/manuals/:id/sessions/active", get(active_session))
        .route("/sessions/:id", get(get_session).delete(cancel_session))
        .route("/sessions/:id/complete", post(complete_session))
        .route("/sessions/:id/notes", post(record_note))
        .route(
            "/sessions/:id/blocks/:block_id/photos",
            post(attach_session_photo),
        )
        .route("/notes/:id", patch(update_note).delete(delete_note))
        .route("/notes/:id/photos", post(attach_note_photo))
        .route("/note-photos/:id", delete(delete_note_photo))
        .route("/photos/:id", delete(delete_photo_record))
        .layer(DefaultBodyLimit::max(max_photo_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

/// The authenticated caller. Unknown and deactivated users are rejected here,
/// before any permission level is resolved.
pub struct ActingUser(pub User);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for ActingUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> std::result::Result<Self, Self::Rejection> {
        let id = parts
            .headers
            .get(USER_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| Uuid::parse_str(value.trim()).ok())
            .ok_or_else(|| AppError::Unauthenticated("Missing or malformed user id".to_string()))?;

        let user = state
            .store
            .find_user(id)
            .await?
            .ok_or_else(|| AppError::Unauthenticated(format!("Unknown user {}", id)))?;

        if !user.is_active {
            return Err(AppError::Unauthenticated(format!(
                "User {} is deactivated",
                id
            )));
        }

        Ok(ActingUser(user))
    }
}

fn forbidden(user: &User, action: &str) -> AppError {
    AppError::Forbidden(format!("User {} may not {}", user.id, action))
}

// Access

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AccessResponse {
    level: PermissionLevel,
    #[serde(flatten)]
    access: AccessDescriptor,
    capabilities: Capabilities,
}

async fn describe_access(
    State(state): State<Arc<AppState>>,
    ActingUser(user): ActingUser,
    Path(business_id): Path<Uuid>,
) -> Result<Json<AccessResponse>> {
    let level = state.resolver.resolve(user.id, business_id).await?;

    Ok(Json(AccessResponse {
        level,
        access: AccessDescriptor::from(level),
        capabilities: Capabilities::for_level(level),
    }))
}

// Administration

async fn create_user(
    State(state): State<Arc<AppState>>,
    ActingUser(user): ActingUser,
    Json(req): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<User>)> {
    let level = state.resolver.resolve_global(user.id).await?;
    if !can_manage_users(level) {
        return Err(forbidden(&user, "manage users"));
    }
    if req.email.trim().is_empty() {
        return Err(AppError::BadRequest("Email is required".to_string()));
    }

    let created = state
        .store
        .create_user(req.name.trim(), req.email.trim(), req.is_super_admin)
        .await?;
    tracing::info!(user_id = %created.id, created_by = %user.id, "User created");

    Ok((StatusCode::CREATED, Json(created)))
}

async fn update_user(
    State(state): State<Arc<AppState>>,
    ActingUser(user): ActingUser,
    Path(user_id): Path<Uuid>,
    Json(req): Json<UpdateUserRequest>,
) -> Result<Json<User>> {
    let level = state.resolver.resolve_global(user.id).await?;
    if !can_manage_users(level) {
        return Err(forbidden(&user, "manage users"));
    }

    let updated = state.store.set_user_active(user_id, req.is_active).await?;
    Ok(Json(updated))
}

async fn create_business(
    State(state): State<Arc<AppState>>,
    ActingUser(user): ActingUser,
    Json(req): Json<CreateBusinessRequest>,
) -> Result<(StatusCode, Json<Business>)> {
    let level = state.resolver.resolve_global(user.id).await?;
    if !can_manage_businesses(level) {
        return Err(forbidden(&user, "manage businesses"));
    }
    if req.name.trim().is_empty() {
        return Err(AppError::BadRequest("Business name is required".to_string()));
    }

    let business = state.store.create_business(req.name.trim()).await?;
    Ok((StatusCode::CREATED, Json(business)))
}

async fn list_members(
    State(state): State<Arc<AppState>>,
    ActingUser(user): ActingUser,
    Path(business_id): Path<Uuid>,
) -> Result<Json<Vec<BusinessAccess>>> {
    let level = state.resolver.resolve(user.id, business_id).await?;
    if !can_manage_businesses(level) {
        return Err(forbidden(&user, "manage business members"));
    }

    state.store.get_business(business_id).await?;
    Ok(Json(state.store.list_access(business_id).await?))
}

async fn grant_member(
    State(state): State<Arc<AppState>>,
    ActingUser(user): ActingUser,
    Path((business_id, member_id)): Path<(Uuid, Uuid)>,
    Json(req): Json<GrantAccessRequest>,
) -> Result<Json<BusinessAccess>> {
    let level = state.resolver.resolve(user.id, business_id).await?;
    if !can_manage_businesses(level) {
        return Err(forbidden(&user, "manage business members"));
    }

    state.store.get_business(business_id).await?;
    state.store.get_user(member_id).await?;

    let grant = state
        .store
        .grant_access(member_id, business_id, req.role)
        .await?;
    tracing::info!(
        business_id = %business_id,
        user_id = %member_id,
        role = grant.role.as_str(),
        "Business access granted"
    );

    Ok(Json(grant))
}

async fn revoke_member(
    State(state): State<Arc<AppState>>,
    ActingUser(user): ActingUser,
    Path((business_id, member_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode> {
    let level = state.resolver.resolve(user.id, business_id).await?;
    if !can_manage_businesses(level) {
        return Err(forbidden(&user, "manage business members"));
    }

    state.store.revoke_access(member_id, business_id).await?;
    tracing::info!(business_id = %business_id, user_id = %member_id, "Business access revoked");

    Ok(StatusCode::NO_CONTENT)
}

// Manuals

async fn list_manuals(
    State(state): State<Arc<AppState>>,
    ActingUser(user): ActingUser,
    Path(business_id): Path<Uuid>,
) -> Result<Json<Vec<Manual>>> {
    let level = state.resolver.resolve(user.id, business_id).await?;
    if level == PermissionLevel::None {
        return Err(forbidden(&user, "view this business"));
    }

    let manuals = state
        .store
        .list_manuals(business_id)
        .await?
        .into_iter()
        .filter(|manual| manual_visible(level, manual))
        .collect();

    Ok(Json(manuals))
}

async fn create_manual(
    State(state): State<Arc<AppState>>,
    ActingUser(user): ActingUser,
    Path(business_id): Path<Uuid>,
    Json(req): Json<CreateManualRequest>,
) -> Result<(StatusCode, Json<Manual>)> {
    let level = state.resolver.resolve(user.id, business_id).await?;
    if !can_edit_manual(level) {
        return Err(forbidden(&user, "edit manuals"));
    }
    if req.title.trim().is_empty() {
        return Err(AppError::BadRequest("Manual title is required".to_string()));
    }

    state.store.get_business(business_id).await?;
    let manual = state
        .store
        .create_manual(business_id, req.title.trim(), req.admin_only)
        .await?;

    Ok((StatusCode::CREATED, Json(manual)))
}

/// Load a manual the caller may edit
async fn editable_manual(state: &AppState, user: &User, manual_id: Uuid) -> Result<Manual> {
    let manual = state.store.get_manual(manual_id).await?;
    let level = state.resolver.resolve(user.id, manual.business_id).await?;
    if !can_edit_manual(level) {
        return Err(forbidden(user, "edit manuals"));
    }
    Ok(manual)
}

async fn get_manual(
    State(state): State<Arc<AppState>>,
    ActingUser(user): ActingUser,
    Path(manual_id): Path<Uuid>,
) -> Result<Json<ManualWithBlocks>> {
    let manual = state.store.get_manual(manual_id).await?;
    let level = state.resolver.resolve(user.id, manual.business_id).await?;
    if !manual_visible(level, &manual) {
        return Err(forbidden(&user, "view this manual"));
    }

    let blocks = state.store.list_blocks(manual.id).await?;
    Ok(Json(ManualWithBlocks { manual, blocks }))
}

async fn update_manual(
    State(state): State<Arc<AppState>>,
    ActingUser(user): ActingUser,
    Path(manual_id): Path<Uuid>,
    Json(req): Json<UpdateManualRequest>,
) -> Result<Json<Manual>> {
    let manual = editable_manual(&state, &user, manual_id).await?;
    let updated = state.store.set_manual_status(manual.id, req.status).await?;
    Ok(Json(updated))
}

async fn add_block(
    State(state): State<Arc<AppState>>,
    ActingUser(user): ActingUser,
    Path(manual_id): Path<Uuid>,
    Json(content): Json<BlockContent>,
) -> Result<(StatusCode, Json<Block>)> {
    let manual = editable_manual(&state, &user, manual_id).await?;
    let block = state.store.add_block(manual.id, content).await?;
    Ok((StatusCode::CREATED, Json(block)))
}

// Sessions

async fn list_sessions(
    State(state): State<Arc<AppState>>,
    ActingUser(user): ActingUser,
    Path(manual_id): Path<Uuid>,
) -> Result<Json<Vec<WorkSession>>> {
    Ok(Json(state.sessions.list_sessions(manual_id, user.id).await?))
}

async fn start_session(
    State(state): State<Arc<AppState>>,
    ActingUser(user): ActingUser,
    Path(manual_id): Path<Uuid>,
) -> Result<(StatusCode, Json<WorkSession>)> {
    let session = state.sessions.start(user.id, manual_id).await?;
    Ok((StatusCode::CREATED, Json(session)))
}

async fn active_session(
    State(state): State<Arc<AppState>>,
    ActingUser(user): ActingUser,
    Path(manual_id): Path<Uuid>,
) -> Result<Json<Option<WorkSession>>> {
    Ok(Json(state.sessions.active_session(user.id, manual_id).await?))
}

async fn get_session(
    State(state): State<Arc<AppState>>,
    ActingUser(user): ActingUser,
    Path(session_id): Path<Uuid>,
) -> Result<Json<SessionDetail>> {
    Ok(Json(state.sessions.session_detail(session_id, user.id).await?))
}

async fn complete_session(
    State(state): State<Arc<AppState>>,
    ActingUser(user): ActingUser,
    Path(session_id): Path<Uuid>,
) -> Result<Json<WorkSession>> {
    Ok(Json(state.sessions.complete(session_id, user.id).await?))
}

async fn cancel_session(
    State(state): State<Arc<AppState>>,
    ActingUser(user): ActingUser,
    Path(session_id): Path<Uuid>,
) -> Result<Json<WorkSession>> {
    Ok(Json(state.sessions.cancel(session_id, user.id).await?))
}

// Notes and photos

async fn record_note(
    State(state): State<Arc<AppState>>,
    ActingUser(user): ActingUser,
    Path(session_id): Path<Uuid>,
    Json(req): Json<RecordNoteRequest>,
) -> Result<(StatusCode, Json<WorkSessionNote>)> {
    let note = state
        .artifacts
        .record_note(session_id, req.block_id, &req.content, user.id)
        .await?;
    Ok((StatusCode::CREATED, Json(note)))
}

async fn update_note(
    State(state): State<Arc<AppState>>,
    ActingUser(user): ActingUser,
    Path(note_id): Path<Uuid>,
    Json(req): Json<UpdateNoteRequest>,
) -> Result<Json<WorkSessionNote>> {
    Ok(Json(
        state
            .artifacts
            .update_note(note_id, &req.content, user.id)
            .await?,
    ))
}

async fn delete_note(
    State(state): State<Arc<AppState>>,
    ActingUser(user): ActingUser,
    Path(note_id): Path<Uuid>,
) -> Result<StatusCode> {
    state.artifacts.delete_note(note_id, user.id).await?;
    Ok(StatusCode::NO_CONTENT)
}

fn image_upload(headers: &HeaderMap, body: Bytes) -> ImageUpload {
    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("application/octet-stream")
        .to_string();

    ImageUpload {
        content_type,
        bytes: body.to_vec(),
    }
}

async fn attach_session_photo(
    State(state): State<Arc<AppState>>,
    ActingUser(user): ActingUser,
    Path((session_id, block_id)): Path<(Uuid, Uuid)>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<AttachedPhoto>)> {
    let target = PhotoTarget::Session {
        session_id,
        block_id,
    };
    let photo = state
        .artifacts
        .attach_photo(target, image_upload(&headers, body), user.id)
        .await?;
    Ok((StatusCode::CREATED, Json(photo)))
}

async fn attach_note_photo(
    State(state): State<Arc<AppState>>,
    ActingUser(user): ActingUser,
    Path(note_id): Path<Uuid>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<AttachedPhoto>)> {
    let photo = state
        .artifacts
        .attach_photo(
            PhotoTarget::Note { note_id },
            image_upload(&headers, body),
            user.id,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(photo)))
}

async fn delete_note_photo(
    State(state): State<Arc<AppState>>,
    ActingUser(user): ActingUser,
    Path(photo_id): Path<Uuid>,
) -> Result<StatusCode> {
    state.artifacts.delete_note_photo(photo_id, user.id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn delete_photo_record(
    State(state): State<Arc<AppState>>,
    ActingUser(user): ActingUser,
    Path(photo_id): Path<Uuid>,
) -> Result<StatusCode> {
    state.artifacts.delete_photo_record(photo_id, user.id).await?;
    Ok(StatusCode::NO_CONTENT)
}
