use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::headers::{Authorization, HeaderMapExt, authorization::Bearer};
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::{AppState, blocking};

/// The authenticated caller, inserted as a request extension.
#[derive(Debug, Clone)]
pub struct Session {
    pub user_id: Uuid,
    pub token: String,
}

/// Resolve the bearer token to its user, or reject with 401.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = req
        .headers()
        .typed_get::<Authorization<Bearer>>()
        .map(|auth| auth.token().to_string())
        .ok_or(ApiError::MissingToken)?;

    let lookup = token.clone();
    let user_id = blocking(&state, move |db| db.resolve_token(&lookup)).await?;

    req.extensions_mut().insert(Session { user_id, token });
    Ok(next.run(req).await)
}
