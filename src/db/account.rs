/// Row models shared by the account and moderation layers
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Authentication record; its absence means the account cannot authenticate
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthUser {
    pub id: String,
    pub email: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Per-account profile and moderation state
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub user_id: String,
    pub username: String,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub is_banned: bool,
    pub ban_reason: Option<String>,
    pub is_verified: bool,
    pub certification_type: Option<String>,
    pub created_at: DateTime<Utc>,
}
