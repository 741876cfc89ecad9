/// Admin Role Management
use crate::admin::AuditLogEntry;
use crate::error::{HubError, HubResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

/// Named capability grants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Can moderate non-admin accounts and reports
    Admin,
    /// Principal: can promote/demote admins and act on admin accounts
    SuperAdmin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::SuperAdmin => "super_admin",
        }
    }

    pub fn from_str(s: &str) -> HubResult<Self> {
        match s.to_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "super_admin" => Ok(Role::SuperAdmin),
            _ => Err(HubError::Validation(format!("Invalid role: {}", s))),
        }
    }
}

/// Role assignment record
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleAssignment {
    pub id: String,
    pub user_id: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

/// Result of a grant; a duplicate grant is informational, not an error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GrantOutcome {
    Granted,
    AlreadyHeld,
}

/// Result of a revoke; revoking an absent role is a silent success
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RevokeOutcome {
    Revoked,
    NotHeld,
}

/// Role store
#[derive(Clone)]
pub struct RoleManager {
    db: SqlitePool,
}

impl RoleManager {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Grant a role. At most one row exists per (user, role).
    pub async fn grant_role(&self, user_id: &str, role: Role) -> HubResult<GrantOutcome> {
        let result = sqlx::query(
            r#"
            INSERT INTO user_roles (id, user_id, role, created_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT (user_id, role) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(user_id)
        .bind(role.as_str())
        .bind(Utc::now())
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            Ok(GrantOutcome::AlreadyHeld)
        } else {
            Ok(GrantOutcome::Granted)
        }
    }

    /// Revoke a role
    pub async fn revoke_role(&self, user_id: &str, role: Role) -> HubResult<RevokeOutcome> {
        let result = sqlx::query("DELETE FROM user_roles WHERE user_id = ? AND role = ?")
            .bind(user_id)
            .bind(role.as_str())
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            Ok(RevokeOutcome::NotHeld)
        } else {
            Ok(RevokeOutcome::Revoked)
        }
    }

    /// Check role membership
    pub async fn has_role(&self, user_id: &str, role: Role) -> HubResult<bool> {
        let found: Option<String> =
            sqlx::query_scalar("SELECT id FROM user_roles WHERE user_id = ? AND role = ?")
                .bind(user_id)
                .bind(role.as_str())
                .fetch_optional(&self.db)
                .await?;

        Ok(found.is_some())
    }

    /// All roles held by an account
    pub async fn roles_for(&self, user_id: &str) -> HubResult<Vec<Role>> {
        let rows = sqlx::query("SELECT role FROM user_roles WHERE user_id = ?")
            .bind(user_id)
            .fetch_all(&self.db)
            .await?;

        let mut roles = Vec::with_capacity(rows.len());
        for row in rows {
            let role_str: String = row.get("role");
            roles.push(Role::from_str(&role_str)?);
        }

        Ok(roles)
    }

    /// Account ids holding a role
    pub async fn holders(&self, role: Role) -> HubResult<Vec<String>> {
        let ids = sqlx::query_scalar("SELECT user_id FROM user_roles WHERE role = ?")
            .bind(role.as_str())
            .fetch_all(&self.db)
            .await?;

        Ok(ids)
    }

    /// List all role assignments, newest first
    pub async fn list_assignments(&self) -> HubResult<Vec<RoleAssignment>> {
        let rows = sqlx::query(
            "SELECT id, user_id, role, created_at FROM user_roles ORDER BY created_at DESC",
        )
        .fetch_all(&self.db)
        .await?;

        let mut assignments = Vec::with_capacity(rows.len());
        for row in rows {
            let role_str: String = row.get("role");
            assignments.push(RoleAssignment {
                id: row.get("id"),
                user_id: row.get("user_id"),
                role: Role::from_str(&role_str)?,
                created_at: row.try_get("created_at")?,
            });
        }

        Ok(assignments)
    }

    /// Remove every role an account holds
    pub async fn delete_all_for(&self, user_id: &str) -> HubResult<u64> {
        let result = sqlx::query("DELETE FROM user_roles WHERE user_id = ?")
            .bind(user_id)
            .execute(&self.db)
            .await?;

        Ok(result.rows_affected())
    }

    /// Log admin action to audit log
    pub async fn log_action(
        &self,
        admin_id: &str,
        action: &str,
        subject_id: Option<&str>,
        details: Option<&str>,
    ) -> HubResult<()> {
        sqlx::query(
            r#"
            INSERT INTO admin_audit_log (admin_id, action, subject_id, details, timestamp)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(admin_id)
        .bind(action)
        .bind(subject_id)
        .bind(details)
        .bind(Utc::now())
        .execute(&self.db)
        .await?;

        Ok(())
    }

    /// Most recent audit entries, newest first
    pub async fn recent_actions(&self, limit: i64) -> HubResult<Vec<AuditLogEntry>> {
        let entries = sqlx::query_as::<_, AuditLogEntry>(
            r#"
            SELECT id, admin_id, action, subject_id, details, timestamp
            FROM admin_audit_log
            ORDER BY id DESC
            LIMIT ?
            "#,
        )
        .bind(limit)
        .fetch_all(&self.db)
        .await?;

        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    #[test]
    fn test_role_from_str() {
        assert_eq!(Role::from_str("admin").unwrap(), Role::Admin);
        assert_eq!(Role::from_str("SUPER_ADMIN").unwrap(), Role::SuperAdmin);
        assert!(Role::from_str("moderator").is_err());
    }

    #[tokio::test]
    async fn test_grant_is_idempotent() {
        let db = db::create_memory_pool().await.unwrap();
        let manager = RoleManager::new(db.clone());

        assert_eq!(
            manager.grant_role("alice", Role::Admin).await.unwrap(),
            GrantOutcome::Granted
        );
        assert_eq!(
            manager.grant_role("alice", Role::Admin).await.unwrap(),
            GrantOutcome::AlreadyHeld
        );

        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM user_roles WHERE user_id = 'alice'")
                .fetch_one(&db)
                .await
                .unwrap();
        assert_eq!(count, 1);
        assert!(manager.has_role("alice", Role::Admin).await.unwrap());
        assert!(!manager.has_role("alice", Role::SuperAdmin).await.unwrap());
    }

    #[tokio::test]
    async fn test_revoke_missing_role_is_not_an_error() {
        let db = db::create_memory_pool().await.unwrap();
        let manager = RoleManager::new(db);

        assert_eq!(
            manager.revoke_role("bob", Role::Admin).await.unwrap(),
            RevokeOutcome::NotHeld
        );

        manager.grant_role("bob", Role::Admin).await.unwrap();
        assert_eq!(
            manager.revoke_role("bob", Role::Admin).await.unwrap(),
            RevokeOutcome::Revoked
        );
        assert!(!manager.has_role("bob", Role::Admin).await.unwrap());
    }

    #[tokio::test]
    async fn test_roles_for_and_holders() {
        let db = db::create_memory_pool().await.unwrap();
        let manager = RoleManager::new(db);

        manager.grant_role("p", Role::SuperAdmin).await.unwrap();
        manager.grant_role("p", Role::Admin).await.unwrap();
        manager.grant_role("a", Role::Admin).await.unwrap();

        let mut roles = manager.roles_for("p").await.unwrap();
        roles.sort_by_key(|r| r.as_str());
        assert_eq!(roles, vec![Role::Admin, Role::SuperAdmin]);

        let mut admins = manager.holders(Role::Admin).await.unwrap();
        admins.sort();
        assert_eq!(admins, vec!["a".to_string(), "p".to_string()]);

        assert_eq!(manager.list_assignments().await.unwrap().len(), 3);
        assert_eq!(manager.delete_all_for("p").await.unwrap(), 2);
        assert!(manager.roles_for("p").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_audit_log_newest_first() {
        let db = db::create_memory_pool().await.unwrap();
        let manager = RoleManager::new(db);

        manager.log_action("admin", "account.ban", Some("u1"), Some("spam")).await.unwrap();
        manager.log_action("admin", "email.unban", None, None).await.unwrap();

        let entries = manager.recent_actions(10).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].action, "email.unban");
        assert_eq!(entries[1].subject_id.as_deref(), Some("u1"));
        assert_eq!(manager.recent_actions(1).await.unwrap().len(), 1);
    }
}
