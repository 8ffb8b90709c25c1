use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};

use parley_types::api::{
    AddMemberRequest, CreateGroupRequest, GroupNameRequest, LeaveResponse, SetPhotoRequest,
    StartDirectRequest, StartDirectResponse, Validate,
};
use parley_types::{ConversationId, ConversationSummary, User};

use crate::error::ApiError;
use crate::middleware::Session;
use crate::state::{AppState, blocking};

pub async fn list(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> Result<Json<Vec<ConversationSummary>>, ApiError> {
    let conversations = blocking(&state, move |db| db.list_for_user(&session.user_id)).await?;
    Ok(Json(conversations))
}

pub async fn get(
    State(state): State<AppState>,
    Path(conversation_id): Path<ConversationId>,
    Extension(session): Extension<Session>,
) -> Result<Json<ConversationSummary>, ApiError> {
    let summary = blocking(&state, move |db| {
        db.conversation_for(&session.user_id, conversation_id)
    })
    .await?;
    Ok(Json(summary))
}

pub async fn members(
    State(state): State<AppState>,
    Path(conversation_id): Path<ConversationId>,
    Extension(session): Extension<Session>,
) -> Result<Json<Vec<User>>, ApiError> {
    let users = blocking(&state, move |db| {
        db.list_members(&session.user_id, conversation_id)
    })
    .await?;
    Ok(Json(users))
}

/// First message to someone: opens the direct conversation and sends in one go.
pub async fn start_direct(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Json(req): Json<StartDirectRequest>,
) -> Result<impl IntoResponse, ApiError> {
    req.validate()?;
    let (conversation, message) = blocking(&state, move |db| {
        db.start_direct(
            &session.user_id,
            &req.recipient_id,
            &req.content,
            req.content_type,
        )
    })
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(StartDirectResponse {
            conversation,
            message,
        }),
    ))
}

pub async fn create_group(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Json(req): Json<CreateGroupRequest>,
) -> Result<impl IntoResponse, ApiError> {
    req.validate()?;
    let group = blocking(&state, move |db| {
        db.create_group(
            &session.user_id,
            &req.name,
            &req.members,
            req.photo.as_deref(),
        )
    })
    .await?;
    Ok((StatusCode::CREATED, Json(group)))
}

/// Members may add others to their group.
pub async fn add_member(
    State(state): State<AppState>,
    Path(conversation_id): Path<ConversationId>,
    Extension(session): Extension<Session>,
    Json(req): Json<AddMemberRequest>,
) -> Result<StatusCode, ApiError> {
    blocking(&state, move |db| {
        db.add_member(&session.user_id, conversation_id, &req.user_id)
    })
    .await?;
    Ok(StatusCode::CREATED)
}

pub async fn leave(
    State(state): State<AppState>,
    Path(conversation_id): Path<ConversationId>,
    Extension(session): Extension<Session>,
) -> Result<Json<LeaveResponse>, ApiError> {
    let group_deleted = blocking(&state, move |db| {
        db.remove_member(conversation_id, &session.user_id)
    })
    .await?;
    Ok(Json(LeaveResponse { group_deleted }))
}

pub async fn rename_group(
    State(state): State<AppState>,
    Path(conversation_id): Path<ConversationId>,
    Extension(session): Extension<Session>,
    Json(req): Json<GroupNameRequest>,
) -> Result<StatusCode, ApiError> {
    req.validate()?;
    blocking(&state, move |db| {
        db.rename_group(&session.user_id, conversation_id, &req.name)
    })
    .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn set_group_photo(
    State(state): State<AppState>,
    Path(conversation_id): Path<ConversationId>,
    Extension(session): Extension<Session>,
    Json(req): Json<SetPhotoRequest>,
) -> Result<StatusCode, ApiError> {
    req.validate()?;
    blocking(&state, move |db| {
        db.set_group_photo(&session.user_id, conversation_id, &req.photo)
    })
    .await?;
    Ok(StatusCode::NO_CONTENT)
}
