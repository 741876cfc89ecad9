/// Account manager implementation using runtime queries
use crate::{
    account::{AccessClaims, SignupRequest, SignupResponse, ValidatedSession},
    admin::BanLedger,
    config::ServerConfig,
    db::account::AuthUser,
    error::{HubError, HubResult},
};
use chrono::Utc;
use jsonwebtoken::{decode, errors::ErrorKind, Algorithm, DecodingKey, Validation};
use sqlx::SqlitePool;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

/// Account manager service
pub struct AccountManager {
    db: SqlitePool,
    config: Arc<ServerConfig>,
    ban_ledger: BanLedger,
}

impl AccountManager {
    /// Create a new account manager
    pub fn new(db: SqlitePool, config: Arc<ServerConfig>) -> Self {
        let ban_ledger = BanLedger::new(db.clone());
        Self {
            db,
            config,
            ban_ledger,
        }
    }

    /// Register a new account: auth record plus profile row.
    ///
    /// Emails on the ban ledger are refused before anything is written.
    pub async fn create_account(&self, req: SignupRequest) -> HubResult<SignupResponse> {
        req.validate()
            .map_err(|e| HubError::Validation(e.to_string()))?;

        let email = req.email.trim().to_lowercase();
        let username = req.username.trim().to_string();

        if self.ban_ledger.is_banned(&email).await? {
            tracing::warn!("Signup refused for banned email {}", email);
            return Err(HubError::EmailBanned(
                "This email address cannot be used to register".to_string(),
            ));
        }

        let email_taken: Option<String> =
            sqlx::query_scalar("SELECT id FROM auth_users WHERE email = ?1")
                .bind(&email)
                .fetch_optional(&self.db)
                .await?;
        if email_taken.is_some() {
            return Err(HubError::Conflict("Email already registered".to_string()));
        }

        let username_taken: Option<String> =
            sqlx::query_scalar("SELECT user_id FROM profiles WHERE LOWER(username) = LOWER(?1)")
                .bind(&username)
                .fetch_optional(&self.db)
                .await?;
        if username_taken.is_some() {
            return Err(HubError::Conflict("Username already taken".to_string()));
        }

        let user_id = Uuid::new_v4().to_string();
        let now = Utc::now();

        let mut tx = self.db.begin().await?;

        sqlx::query("INSERT INTO auth_users (id, email, created_at) VALUES (?1, ?2, ?3)")
            .bind(&user_id)
            .bind(&email)
            .bind(now)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            "INSERT INTO profiles (user_id, username, display_name, created_at) VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(&user_id)
        .bind(&username)
        .bind(&req.display_name)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!("Account created: {} ({})", username, user_id);

        Ok(SignupResponse {
            user_id,
            email,
            username,
        })
    }

    /// Look up an auth record by id
    pub async fn get_user(&self, user_id: &str) -> HubResult<Option<AuthUser>> {
        let user = sqlx::query_as::<_, AuthUser>(
            "SELECT id, email, created_at FROM auth_users WHERE id = ?1",
        )
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?;

        Ok(user)
    }

    /// Delete the auth record itself. Returns whether a record was removed.
    pub async fn delete_user(&self, user_id: &str) -> HubResult<bool> {
        let result = sqlx::query("DELETE FROM auth_users WHERE id = ?1")
            .bind(user_id)
            .execute(&self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Validate a bearer token and resolve it to a live account
    pub async fn validate_access_token(&self, token: &str) -> HubResult<ValidatedSession> {
        let claims = verify_access_token(
            token,
            &self.config.authentication.jwt_secret,
            self.config.authentication.jwt_audience.as_deref(),
        )?;

        let user = self
            .get_user(&claims.sub)
            .await?
            .ok_or_else(|| HubError::Authentication("Unauthorized".to_string()))?;

        Ok(ValidatedSession {
            user_id: user.id,
            email: user.email,
        })
    }
}

/// Verify an HS256 access token's signature, expiry and (optionally) audience
pub fn verify_access_token(
    token: &str,
    jwt_secret: &str,
    audience: Option<&str>,
) -> HubResult<AccessClaims> {
    let decoding_key = DecodingKey::from_secret(jwt_secret.as_bytes());
    let mut validation = Validation::new(Algorithm::HS256);
    // Allow some clock skew (1 minute)
    validation.leeway = 60;
    match audience {
        Some(aud) => validation.set_audience(&[aud]),
        None => validation.validate_aud = false,
    }

    decode::<AccessClaims>(token, &decoding_key, &validation)
        .map(|data| data.claims)
        .map_err(|e| {
            tracing::warn!("Access token verification failed: {}", e);
            match e.kind() {
                ErrorKind::ExpiredSignature => {
                    HubError::Authentication("Token has expired".to_string())
                }
                ErrorKind::InvalidSignature => {
                    HubError::Authentication("Invalid token signature".to_string())
                }
                _ => HubError::Authentication(format!("Invalid token: {}", e)),
            }
        })
}
