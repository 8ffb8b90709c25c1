use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use parley_db::{DbError, ErrorKind};
use parley_types::api::{ErrorResponse, ValidationError};
use tracing::error;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Db(#[from] DbError),

    #[error("{0}")]
    Validation(#[from] ValidationError),

    #[error("background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("missing bearer token")]
    MissingToken,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Db(e) => match e.kind() {
                ErrorKind::NotFound => StatusCode::NOT_FOUND,
                ErrorKind::Forbidden => StatusCode::FORBIDDEN,
                ErrorKind::Conflict => StatusCode::CONFLICT,
                ErrorKind::Unauthenticated => StatusCode::UNAUTHORIZED,
                ErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
                ErrorKind::StorageFailure => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Join(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::MissingToken => StatusCode::UNAUTHORIZED,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status.is_server_error() {
            error!("Request failed: {}", self);
            "internal server error".to_string()
        } else {
            self.to_string()
        };
        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn db_errors_map_by_kind() {
        let cases = [
            (DbError::NotFound("user"), StatusCode::NOT_FOUND),
            (DbError::Forbidden("nope"), StatusCode::FORBIDDEN),
            (DbError::AlreadyMember, StatusCode::CONFLICT),
            (DbError::DirectConversationExists, StatusCode::CONFLICT),
            (DbError::Unauthenticated, StatusCode::UNAUTHORIZED),
            (DbError::InvalidInput("x".into()), StatusCode::BAD_REQUEST),
            (DbError::LockPoisoned, StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status(), status);
        }
    }

    #[test]
    fn server_errors_hide_details() {
        let res = ApiError::from(DbError::Corrupt("column 0: bad uuid".into())).into_response();
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
