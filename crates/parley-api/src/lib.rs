//! HTTP surface over the parley database: bearer-token sessions, JSON
//! request/response bodies and the status mapping for database errors.

pub mod conversations;
pub mod error;
pub mod messages;
pub mod middleware;
pub mod session;
pub mod state;
pub mod users;

use axum::{
    Router, middleware as axum_middleware,
    routing::{delete, get, post, put},
};

pub use error::ApiError;
pub use state::{AppState, AppStateInner};

async fn health() -> &'static str {
    "ok"
}

/// All routes with state applied. Transport layers (CORS, tracing) are added
/// by the binary.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(health))
        .route("/session", post(session::login))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route("/session", delete(session::logout))
        .route("/users", get(users::search))
        .route("/users/me", get(users::me))
        .route("/users/me/name", put(users::rename))
        .route("/users/me/photo", put(users::set_photo))
        .route("/conversations", get(conversations::list))
        .route("/conversations/direct", post(conversations::start_direct))
        .route("/conversations/{conversation_id}", get(conversations::get))
        .route(
            "/conversations/{conversation_id}/members",
            get(conversations::members),
        )
        .route(
            "/conversations/{conversation_id}/messages",
            get(messages::list).post(messages::send),
        )
        .route(
            "/conversations/{conversation_id}/messages/{message_id}",
            delete(messages::delete),
        )
        .route(
            "/conversations/{conversation_id}/messages/{message_id}/forward",
            post(messages::forward),
        )
        .route(
            "/conversations/{conversation_id}/messages/{message_id}/comments",
            get(messages::list_comments).post(messages::comment),
        )
        .route(
            "/conversations/{conversation_id}/messages/{message_id}/comments/promote",
            post(messages::promote),
        )
        .route("/comments/{comment_id}", delete(messages::delete_comment))
        .route("/groups", post(conversations::create_group))
        .route(
            "/groups/{conversation_id}/members",
            post(conversations::add_member),
        )
        .route(
            "/groups/{conversation_id}/members/me",
            delete(conversations::leave),
        )
        .route("/groups/{conversation_id}/name", put(conversations::rename_group))
        .route(
            "/groups/{conversation_id}/photo",
            put(conversations::set_group_photo),
        )
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ))
        .with_state(state);

    Router::new().merge(public_routes).merge(protected_routes)
}
