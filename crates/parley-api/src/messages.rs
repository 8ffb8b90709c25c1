use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};

use parley_db::{Database, DbError};
use parley_types::api::{CommentRequest, ForwardRequest, SendMessageRequest, Validate};
use parley_types::{Comment, CommentId, ConversationId, Message, MessageId, MessageWithSender};

use crate::error::ApiError;
use crate::middleware::Session;
use crate::state::{AppState, blocking};

/// The message, provided it lives in the conversation named by the path.
fn message_in(
    db: &Database,
    conversation_id: ConversationId,
    message_id: MessageId,
) -> parley_db::Result<Message> {
    let message = db.get_message(message_id)?;
    if message.conversation_id != conversation_id {
        return Err(DbError::NotFound("message"));
    }
    Ok(message)
}

pub async fn list(
    State(state): State<AppState>,
    Path(conversation_id): Path<ConversationId>,
    Extension(session): Extension<Session>,
) -> Result<Json<Vec<MessageWithSender>>, ApiError> {
    let messages = blocking(&state, move |db| {
        db.list_by_conversation(conversation_id, &session.user_id)
    })
    .await?;
    Ok(Json(messages))
}

pub async fn send(
    State(state): State<AppState>,
    Path(conversation_id): Path<ConversationId>,
    Extension(session): Extension<Session>,
    Json(req): Json<SendMessageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    req.validate()?;
    let message = blocking(&state, move |db| {
        db.send(conversation_id, &session.user_id, &req.content, req.content_type)
    })
    .await?;
    Ok((StatusCode::CREATED, Json(message)))
}

pub async fn delete(
    State(state): State<AppState>,
    Path((conversation_id, message_id)): Path<(ConversationId, MessageId)>,
    Extension(session): Extension<Session>,
) -> Result<StatusCode, ApiError> {
    blocking(&state, move |db| {
        message_in(db, conversation_id, message_id)?;
        db.delete_message(message_id, &session.user_id)
    })
    .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn forward(
    State(state): State<AppState>,
    Path((conversation_id, message_id)): Path<(ConversationId, MessageId)>,
    Extension(session): Extension<Session>,
    Json(req): Json<ForwardRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let message = blocking(&state, move |db| {
        db.forward(
            conversation_id,
            message_id,
            req.target_conversation_id,
            &session.user_id,
        )
    })
    .await?;
    Ok((StatusCode::CREATED, Json(message)))
}

pub async fn list_comments(
    State(state): State<AppState>,
    Path((conversation_id, message_id)): Path<(ConversationId, MessageId)>,
    Extension(session): Extension<Session>,
) -> Result<Json<Vec<Comment>>, ApiError> {
    let comments = blocking(&state, move |db| {
        message_in(db, conversation_id, message_id)?;
        db.list_comments(message_id, &session.user_id)
    })
    .await?;
    Ok(Json(comments))
}

pub async fn comment(
    State(state): State<AppState>,
    Path((conversation_id, message_id)): Path<(ConversationId, MessageId)>,
    Extension(session): Extension<Session>,
    Json(req): Json<CommentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    req.validate()?;
    let comment = blocking(&state, move |db| {
        message_in(db, conversation_id, message_id)?;
        db.comment(message_id, &session.user_id, &req.content, req.content_type)
    })
    .await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

pub async fn promote(
    State(state): State<AppState>,
    Path((conversation_id, message_id)): Path<(ConversationId, MessageId)>,
    Extension(session): Extension<Session>,
) -> Result<Json<Vec<Message>>, ApiError> {
    let promoted = blocking(&state, move |db| {
        db.promote_comments(message_id, conversation_id, &session.user_id)
    })
    .await?;
    Ok(Json(promoted))
}

pub async fn delete_comment(
    State(state): State<AppState>,
    Path(comment_id): Path<CommentId>,
    Extension(session): Extension<Session>,
) -> Result<StatusCode, ApiError> {
    blocking(&state, move |db| db.delete_comment(comment_id, &session.user_id)).await?;
    Ok(StatusCode::NO_CONTENT)
}
