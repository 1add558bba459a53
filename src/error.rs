//! Error types for the application

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Body returned for every authentication or authorization failure, so callers
/// cannot tell a missing business apart from a missing role.
pub const ACCESS_DENIED: &str = "Access denied";

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::Database(e) => {
                tracing::error!("Database error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Database error".to_string())
            }
            AppError::Unauthenticated(e) => {
                tracing::debug!("Unauthenticated: {}", e);
                (StatusCode::UNAUTHORIZED, ACCESS_DENIED.to_string())
            }
            AppError::Forbidden(e) => {
                tracing::debug!("Forbidden: {}", e);
                (StatusCode::FORBIDDEN, ACCESS_DENIED.to_string())
            }
            AppError::Conflict(e) => (StatusCode::CONFLICT, e.clone()),
            AppError::InvalidState(e) => (StatusCode::UNPROCESSABLE_ENTITY, e.clone()),
            AppError::NotFound(e) => (StatusCode::NOT_FOUND, e.clone()),
            AppError::BadRequest(e) => (StatusCode::BAD_REQUEST, e.clone()),
            AppError::Internal(e) => {
                tracing::error!("Internal error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal error".to_string(),
                )
            }
        };

        (status, message).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    async fn body_text(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("session".to_string());
        assert_eq!(format!("{}", err), "Not found: session");

        let err = AppError::Conflict("already started".to_string());
        assert_eq!(format!("{}", err), "Conflict: already started");

        let err = AppError::InvalidState("completed".to_string());
        assert_eq!(format!("{}", err), "Invalid state: completed");

        let err = AppError::Forbidden("not the owner".to_string());
        assert_eq!(format!("{}", err), "Forbidden: not the owner");
    }

    #[test]
    fn test_status_codes() {
        let cases = [
            (AppError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (AppError::BadRequest("x".into()), StatusCode::BAD_REQUEST),
            (AppError::Conflict("x".into()), StatusCode::CONFLICT),
            (
                AppError::InvalidState("x".into()),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (AppError::Unauthenticated("x".into()), StatusCode::UNAUTHORIZED),
            (AppError::Forbidden("x".into()), StatusCode::FORBIDDEN),
            (
                AppError::Internal("x".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, expected) in cases {
            assert_eq!(err.into_response().status(), expected);
        }
    }

    #[tokio::test]
    async fn test_access_failures_do_not_leak_reason() {
        let missing_business = AppError::Forbidden("business does not exist".to_string());
        let missing_role = AppError::Forbidden("no role in business".to_string());

        let a = body_text(missing_business.into_response()).await;
        let b = body_text(missing_role.into_response()).await;
        assert_eq!(a, ACCESS_DENIED);
        assert_eq!(a, b);

        let unauthenticated = AppError::Unauthenticated("unknown user".to_string());
        assert_eq!(body_text(unauthenticated.into_response()).await, ACCESS_DENIED);
    }

    #[test]
    fn test_database_error_from_sqlx() {
        let sqlx_err = sqlx::Error::Configuration("test".into());
        let app_err: AppError = sqlx_err.into();
        assert!(matches!(app_err, AppError::Database(_)));
        assert_eq!(
            app_err.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
