/// Privileged account deletion workflow
///
/// Irreversible, cascading erasure of an account. Steps run in a fixed
/// order: credential and role checks, request validation, target
/// resolution, a concurrent fan-out over the records that only reference
/// the account, then posts, profile, roles, the ban ledger entry and
/// finally the auth record. Any failure stops the remaining steps;
/// completed deletions stay deleted, and every step is a no-op when
/// repeated, so the call can simply be retried.
use crate::{
    account::AccountManager,
    admin::{policy, BanLedger, Caller, ProfileManager, Role, RoleManager},
    config::ServerConfig,
    db::account::AuthUser,
    error::HubError,
    events::{EventBus, ModerationEvent},
};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::sync::Arc;
use thiserror::Error;

/// `(table, owner column)` pairs erased concurrently in the fan-out step.
/// None of these depend on each other.
pub const DEPENDENT_RECORDS: &[(&str, &str)] = &[
    ("comments", "user_id"),
    ("post_likes", "user_id"),
    ("post_favorites", "user_id"),
    ("follows", "follower_id"),
    ("follows", "following_id"),
    ("messages", "sender_id"),
    ("notifications", "user_id"),
    ("notifications", "related_user_id"),
    ("group_members", "user_id"),
    ("stories", "user_id"),
    ("reports", "reporter_id"),
];

/// Records removed one by one after the fan-out, in this order.
pub const PRIMARY_RECORDS: &[(&str, &str)] = &[
    ("posts", "user_id"),
    ("profiles", "user_id"),
    ("user_roles", "user_id"),
];

/// Deletion failures. The display strings are the messages returned to callers.
#[derive(Error, Debug)]
pub enum DeletionError {
    #[error("No auth header")]
    MissingAuthHeader,

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Admin only")]
    AdminOnly,

    #[error("Invalid request body: {0}")]
    InvalidBody(String),

    #[error("userId required")]
    MissingUserId,

    #[error("User not found")]
    UserNotFound,

    #[error("Not permitted")]
    NotPermitted,

    #[error("{0}")]
    Storage(String),
}

impl From<HubError> for DeletionError {
    fn from(e: HubError) -> Self {
        DeletionError::Storage(e.to_string())
    }
}

impl From<sqlx::Error> for DeletionError {
    fn from(e: sqlx::Error) -> Self {
        DeletionError::Storage(HubError::Database(e).to_string())
    }
}

/// Body of every deletion failure
#[derive(Debug, Serialize, Deserialize)]
pub struct DeletionErrorBody {
    pub error: String,
}

impl IntoResponse for DeletionError {
    fn into_response(self) -> Response {
        let body = Json(DeletionErrorBody {
            error: self.to_string(),
        });
        (StatusCode::BAD_REQUEST, body).into_response()
    }
}

/// Deletion request body
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteAccountRequest {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
}

/// What a completed deletion removed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeletionReceipt {
    pub user_id: String,
    pub dependent_rows: u64,
    pub posts: u64,
    pub profile_rows: u64,
    pub role_rows: u64,
    pub banned_email: Option<String>,
}

/// Account deletion service
pub struct AccountDeletion {
    db: SqlitePool,
    config: Arc<ServerConfig>,
    accounts: Arc<AccountManager>,
    roles: Arc<RoleManager>,
    profiles: Arc<ProfileManager>,
    ban_ledger: Arc<BanLedger>,
    events: EventBus,
}

impl AccountDeletion {
    pub fn new(
        db: SqlitePool,
        config: Arc<ServerConfig>,
        accounts: Arc<AccountManager>,
        roles: Arc<RoleManager>,
        profiles: Arc<ProfileManager>,
        ban_ledger: Arc<BanLedger>,
        events: EventBus,
    ) -> Self {
        Self {
            db,
            config,
            accounts,
            roles,
            profiles,
            ban_ledger,
            events,
        }
    }

    /// Run the full workflow for a raw request: authorization header and body bytes.
    pub async fn run(
        &self,
        authorization: Option<&str>,
        body: &[u8],
    ) -> Result<DeletionReceipt, DeletionError> {
        // 1. Caller credential
        let header = authorization
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .ok_or(DeletionError::MissingAuthHeader)?;
        let token = header
            .strip_prefix("Bearer")
            .filter(|rest| rest.is_empty() || rest.starts_with(' '))
            .unwrap_or(header)
            .trim();
        if token.is_empty() {
            return Err(DeletionError::MissingAuthHeader);
        }
        let session = match self.accounts.validate_access_token(token).await {
            Ok(session) => session,
            Err(HubError::Authentication(reason)) => {
                tracing::warn!("Account deletion refused: {}", reason);
                return Err(DeletionError::Unauthorized);
            }
            Err(e) => return Err(e.into()),
        };

        // 2. Caller must be an admin
        let caller_roles = self.roles.roles_for(&session.user_id).await?;
        let caller = Caller::from_roles(
            &session.user_id,
            session.email.as_deref(),
            &caller_roles,
            self.config.authentication.principal_email.as_deref(),
        );
        if !caller.has_admin_access() {
            tracing::warn!("Account deletion refused: {} is not an admin", caller.user_id);
            return Err(DeletionError::AdminOnly);
        }

        // 3. Request validation
        let request: DeleteAccountRequest = serde_json::from_slice(body)
            .map_err(|e| DeletionError::InvalidBody(e.to_string()))?;
        let target_id = request
            .user_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or(DeletionError::MissingUserId)?;

        // 4. Target must still exist
        let target = self
            .accounts
            .get_user(target_id)
            .await?
            .ok_or(DeletionError::UserNotFound)?;

        let target_roles = self.roles.roles_for(&target.id).await?;
        let target_is_admin = target_roles
            .iter()
            .any(|r| matches!(r, Role::Admin | Role::SuperAdmin));
        if !policy::can_moderate(&caller, &target.id, target_is_admin) {
            tracing::warn!(
                "Account deletion refused: {} may not delete {}",
                caller.user_id,
                target.id
            );
            return Err(DeletionError::NotPermitted);
        }

        let reason = request
            .reason
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .unwrap_or(self.config.moderation.default_deletion_reason.as_str())
            .to_string();

        self.erase(&caller, &target, &reason).await
    }

    /// Steps 5-10. The caller has already been authorized for `target`.
    pub async fn erase(
        &self,
        caller: &Caller,
        target: &AuthUser,
        reason: &str,
    ) -> Result<DeletionReceipt, DeletionError> {
        let user_id = target.id.as_str();
        tracing::info!("Deleting account {} (requested by {})", user_id, caller.user_id);

        // 5. Fan out over independent dependents
        let removed = try_join_all(
            DEPENDENT_RECORDS
                .iter()
                .map(|(table, column)| delete_owned_rows(&self.db, table, column, user_id)),
        )
        .await?;
        let dependent_rows: u64 = removed.iter().sum();
        tracing::debug!("Removed {} dependent rows for {}", dependent_rows, user_id);

        // 6. Posts, after everything that references them
        let posts = delete_owned_rows(&self.db, "posts", "user_id", user_id).await?;
        tracing::debug!("Removed {} posts for {}", posts, user_id);

        // 7. Profile
        let profile_rows = self.profiles.delete_profile(user_id).await?;

        // 8. Role assignments
        let role_rows = self.roles.delete_all_for(user_id).await?;

        // 9. Ban ledger
        let banned_email = match target.email.as_deref().filter(|e| !e.trim().is_empty()) {
            Some(email) => {
                let entry = self.ban_ledger.ban_email(email, &caller.user_id, reason).await?;
                self.events.publish(ModerationEvent::EmailBanned {
                    email: entry.email.clone(),
                    banned_by: caller.user_id.clone(),
                });
                Some(entry.email)
            }
            None => None,
        };

        // 10. Auth record, strictly last
        self.accounts.delete_user(user_id).await?;

        tracing::info!(
            "Account {} deleted: {} dependent rows, {} posts, {} profile, {} roles",
            user_id,
            dependent_rows,
            posts,
            profile_rows,
            role_rows
        );

        self.events.publish(ModerationEvent::AccountDeleted {
            user_id: user_id.to_string(),
            deleted_by: caller.user_id.clone(),
        });

        if let Err(e) = self
            .roles
            .log_action(&caller.user_id, "account.delete", Some(user_id), Some(reason))
            .await
        {
            tracing::warn!("Failed to write audit log for deletion of {}: {}", user_id, e);
        }

        Ok(DeletionReceipt {
            user_id: user_id.to_string(),
            dependent_rows,
            posts,
            profile_rows,
            role_rows,
            banned_email,
        })
    }
}

/// Delete every row of `table` whose `column` references `user_id`
pub(crate) async fn delete_owned_rows(
    db: &SqlitePool,
    table: &str,
    column: &str,
    user_id: &str,
) -> Result<u64, sqlx::Error> {
    let sql = format!("DELETE FROM {} WHERE {} = ?", table, column);
    let result = sqlx::query(&sql).bind(user_id).execute(db).await?;
    Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_are_verbatim() {
        assert_eq!(DeletionError::MissingAuthHeader.to_string(), "No auth header");
        assert_eq!(DeletionError::Unauthorized.to_string(), "Unauthorized");
        assert_eq!(DeletionError::AdminOnly.to_string(), "Admin only");
        assert_eq!(DeletionError::MissingUserId.to_string(), "userId required");
        assert_eq!(DeletionError::UserNotFound.to_string(), "User not found");
    }

    #[test]
    fn test_every_error_is_a_bad_request() {
        for err in [
            DeletionError::Unauthorized,
            DeletionError::AdminOnly,
            DeletionError::Storage("disk full".to_string()),
        ] {
            assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
        }
    }

    #[test]
    fn test_fan_out_never_touches_posts() {
        assert!(DEPENDENT_RECORDS.iter().all(|(table, _)| *table != "posts"));
        assert_eq!(PRIMARY_RECORDS[0].0, "posts");
    }

    #[test]
    fn test_request_accepts_missing_fields() {
        let req: DeleteAccountRequest = serde_json::from_str("{}").unwrap();
        assert!(req.user_id.is_none());

        let req: DeleteAccountRequest =
            serde_json::from_str(r#"{"userId":"u1","reason":"spam"}"#).unwrap();
        assert_eq!(req.user_id.as_deref(), Some("u1"));
        assert_eq!(req.reason.as_deref(), Some("spam"));
    }
}
