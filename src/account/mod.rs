/// Account management system
///
/// Owns the authentication records and the profile row created at signup.
/// Bearer credentials are verified here and resolved to a live account.

mod manager;

pub use manager::AccountManager;

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Signup request
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    #[validate(length(min = 3, max = 32, message = "Username must be 3-32 characters"))]
    pub username: String,
    #[serde(default)]
    #[validate(length(max = 64, message = "Display name is too long"))]
    pub display_name: Option<String>,
}

/// Signup response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupResponse {
    pub user_id: String,
    pub email: String,
    pub username: String,
}

/// Bearer token claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Account id
    pub sub: String,
    pub exp: usize,
}

/// Validated identity behind a bearer token
#[derive(Debug, Clone)]
pub struct ValidatedSession {
    pub user_id: String,
    /// Email as currently stored on the auth record, not as claimed by the token
    pub email: Option<String>,
}
