/// Ban ledger: emails barred from registering again
use crate::error::{HubError, HubResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

/// Ban ledger entry
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BannedEmail {
    pub id: String,
    pub email: String,
    pub banned_by: Option<String>,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Ban ledger manager
#[derive(Clone)]
pub struct BanLedger {
    db: SqlitePool,
}

impl BanLedger {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Record an email. Unique on email; a repeat overwrites banner and reason.
    pub async fn ban_email(&self, email: &str, banned_by: &str, reason: &str) -> HubResult<BannedEmail> {
        let email = normalize_email(email)?;

        sqlx::query(
            r#"
            INSERT INTO banned_emails (id, email, banned_by, reason, created_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT (email) DO UPDATE SET
                banned_by = excluded.banned_by,
                reason = excluded.reason
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&email)
        .bind(banned_by)
        .bind(reason)
        .bind(Utc::now())
        .execute(&self.db)
        .await?;

        self.find(&email)
            .await?
            .ok_or_else(|| HubError::Internal(format!("Ban ledger entry for {} vanished", email)))
    }

    pub async fn find(&self, email: &str) -> HubResult<Option<BannedEmail>> {
        let entry = sqlx::query_as::<_, BannedEmail>(
            "SELECT id, email, banned_by, reason, created_at FROM banned_emails WHERE email = ?",
        )
        .bind(email.trim().to_lowercase())
        .fetch_optional(&self.db)
        .await?;

        Ok(entry)
    }

    pub async fn is_banned(&self, email: &str) -> HubResult<bool> {
        Ok(self.find(email).await?.is_some())
    }

    /// Newest first
    pub async fn list(&self) -> HubResult<Vec<BannedEmail>> {
        let entries = sqlx::query_as::<_, BannedEmail>(
            "SELECT id, email, banned_by, reason, created_at FROM banned_emails ORDER BY created_at DESC",
        )
        .fetch_all(&self.db)
        .await?;

        Ok(entries)
    }

    /// Unban by entry id. Returns whether an entry was removed.
    pub async fn remove(&self, id: &str) -> HubResult<bool> {
        let result = sqlx::query("DELETE FROM banned_emails WHERE id = ?")
            .bind(id)
            .execute(&self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn count(&self) -> HubResult<i64> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM banned_emails")
            .fetch_one(&self.db)
            .await?;

        Ok(count)
    }
}

fn normalize_email(email: &str) -> HubResult<String> {
    let email = email.trim().to_lowercase();
    if email.is_empty() || !email.contains('@') {
        return Err(HubError::Validation(format!("Invalid email: {}", email)));
    }
    Ok(email)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    #[tokio::test]
    async fn test_upsert_keeps_one_row_with_latest_reason() {
        let db = db::create_memory_pool().await.unwrap();
        let ledger = BanLedger::new(db);

        let first = ledger.ban_email("Troll@Example.com", "admin-1", "spam").await.unwrap();
        let second = ledger.ban_email("troll@example.com", "admin-2", "deleted").await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.email, "troll@example.com");
        assert_eq!(second.reason.as_deref(), Some("deleted"));
        assert_eq!(second.banned_by.as_deref(), Some("admin-2"));
        assert_eq!(ledger.count().await.unwrap(), 1);
        assert!(ledger.is_banned("TROLL@example.com").await.unwrap());
    }

    #[tokio::test]
    async fn test_remove_entry() {
        let db = db::create_memory_pool().await.unwrap();
        let ledger = BanLedger::new(db);

        let entry = ledger.ban_email("x@example.com", "admin", "abuse").await.unwrap();
        assert_eq!(ledger.list().await.unwrap().len(), 1);

        assert!(ledger.remove(&entry.id).await.unwrap());
        assert!(!ledger.remove(&entry.id).await.unwrap());
        assert!(!ledger.is_banned("x@example.com").await.unwrap());
    }

    #[tokio::test]
    async fn test_rejects_malformed_email() {
        let db = db::create_memory_pool().await.unwrap();
        let ledger = BanLedger::new(db);
        assert!(matches!(
            ledger.ban_email("   ", "admin", "x").await,
            Err(HubError::Validation(_))
        ));
    }
}
