/// Unified error types for Purge Hub
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for the service
#[derive(Error, Debug)]
pub enum HubError {
    /// Database errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Authentication errors
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Authorization errors
    #[error("Not authorized: {0}")]
    Authorization(String),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Not found errors
    #[error("Not found: {0}")]
    NotFound(String),

    /// Conflict errors (e.g., duplicate username, illegal report transition)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Caller's profile carries the ban flag
    #[error("Account banned: {0}")]
    AccountBanned(String),

    /// Email is on the ban ledger
    #[error("Email banned: {0}")]
    EmailBanned(String),

    /// Internal server errors
    #[error("Internal error: {0}")]
    Internal(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// JSON error body
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl IntoResponse for HubError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            HubError::Authentication(_) => (
                StatusCode::UNAUTHORIZED,
                "AuthenticationRequired",
                self.to_string(),
            ),
            HubError::Authorization(_) => (StatusCode::FORBIDDEN, "Forbidden", self.to_string()),
            HubError::Validation(_) => (
                StatusCode::BAD_REQUEST,
                "InvalidRequest",
                self.to_string(),
            ),
            HubError::NotFound(_) => (StatusCode::NOT_FOUND, "NotFound", self.to_string()),
            HubError::Conflict(_) => (StatusCode::CONFLICT, "Conflict", self.to_string()),
            HubError::AccountBanned(_) => (
                StatusCode::FORBIDDEN,
                "AccountBanned",
                self.to_string(),
            ),
            HubError::EmailBanned(_) => (StatusCode::FORBIDDEN, "EmailBanned", self.to_string()),
            HubError::Database(_) | HubError::Internal(_) | HubError::Io(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "InternalServerError",
                "Internal server error".to_string(), // Don't leak details
            ),
        };

        let body = Json(ErrorResponse {
            error: error_code.to_string(),
            message,
        });

        (status, body).into_response()
    }
}

/// Result type alias for service operations
pub type HubResult<T> = Result<T, HubError>;
