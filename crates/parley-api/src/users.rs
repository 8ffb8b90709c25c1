use axum::{
    Extension, Json,
    extract::{Query, State},
    http::StatusCode,
};

use parley_types::User;
use parley_types::api::{RenameRequest, SetPhotoRequest, UserSearchQuery, Validate};

use crate::error::ApiError;
use crate::middleware::Session;
use crate::state::{AppState, blocking};

pub async fn me(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> Result<Json<User>, ApiError> {
    let user = blocking(&state, move |db| db.get_user(&session.user_id)).await?;
    Ok(Json(user))
}

pub async fn rename(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Json(req): Json<RenameRequest>,
) -> Result<StatusCode, ApiError> {
    req.validate()?;
    blocking(&state, move |db| db.rename(&session.user_id, &req.name)).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn set_photo(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Json(req): Json<SetPhotoRequest>,
) -> Result<StatusCode, ApiError> {
    req.validate()?;
    blocking(&state, move |db| db.set_photo(&session.user_id, &req.photo)).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn search(
    State(state): State<AppState>,
    Query(query): Query<UserSearchQuery>,
) -> Result<Json<Vec<User>>, ApiError> {
    let users = blocking(&state, move |db| db.search_users(&query.prefix)).await?;
    Ok(Json(users))
}
