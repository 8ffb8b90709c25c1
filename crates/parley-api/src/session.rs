use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use tracing::info;

use parley_types::api::{LoginRequest, LoginResponse, Validate};

use crate::error::ApiError;
use crate::middleware::Session;
use crate::state::{AppState, blocking};

/// Log in by name. New users get 201, returning users 200; either way the
/// previous token stops working.
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    req.validate()?;

    let outcome = blocking(&state, move |db| db.login(&req.name)).await?;
    let status = if outcome.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };

    Ok((
        status,
        Json(LoginResponse {
            user: outcome.user,
            token: outcome.token,
        }),
    ))
}

pub async fn logout(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> Result<StatusCode, ApiError> {
    let user_id = session.user_id;
    blocking(&state, move |db| db.logout(&session.token)).await?;
    info!(user_id = %user_id, "Logged out");
    Ok(StatusCode::NO_CONTENT)
}
