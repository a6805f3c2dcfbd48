use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

pub type ApiResult<T> = Result<T, ApiError>;

/// Service-level failure, translated to an HTTP status by the gateway.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed or missing input (400).
    #[error("{0}")]
    Validation(String),

    /// Bad credentials or invalid token (401).
    #[error("{0}")]
    Unauthorized(String),

    /// Authenticated but not permitted (403).
    #[error("{0}")]
    Forbidden(String),

    /// Referenced entity absent (404).
    #[error("{0}")]
    NotFound(String),

    /// Uniqueness violation (409).
    #[error("{0}")]
    Conflict(String),

    /// Internal failure (500); cause is logged, never exposed.
    #[error("{0}")]
    Internal(String),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            ApiError::Validation(msg) => (StatusCode::BAD_REQUEST, "validation_error", msg),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "unauthorized", msg),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, "forbidden", msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg),
        };
        (status, Json(ErrorBody { error: code, message })).into_response()
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => ApiError::NotFound("Resource not found".into()),
            sqlx::Error::Database(db_err) => {
                if let Some(constraint) = db_err.constraint() {
                    if constraint.contains("email") {
                        return ApiError::Conflict("Email already registered".into());
                    }
                    tracing::error!(%constraint, "constraint violation");
                    return ApiError::Conflict("Constraint violation".into());
                }
                tracing::error!(error = %db_err, "database error");
                ApiError::Internal("Database error".into())
            }
            other => {
                tracing::error!(error = %other, "database error");
                ApiError::Internal("Database error".into())
            }
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        tracing::error!(error = %err, "internal error");
        ApiError::Internal("Internal error".into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_not_found_maps_to_404() {
        let err: ApiError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[test]
    fn error_display_carries_message() {
        let err = ApiError::Forbidden("Not authorized".into());
        assert_eq!(err.to_string(), "Not authorized");
    }

    #[test]
    fn into_response_sets_status() {
        let res = ApiError::Conflict("Email already registered".into()).into_response();
        assert_eq!(res.status(), StatusCode::CONFLICT);
        let res = ApiError::Validation("Missing required fields".into()).into_response();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }
}
