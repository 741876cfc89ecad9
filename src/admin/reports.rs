/// Report queue
use crate::error::{HubError, HubResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use uuid::Uuid;

/// Report lifecycle. `Pending` may move to either terminal state, never back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportStatus {
    Pending,
    Resolved,
    Dismissed,
}

impl ReportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportStatus::Pending => "pending",
            ReportStatus::Resolved => "resolved",
            ReportStatus::Dismissed => "dismissed",
        }
    }

    pub fn from_str(s: &str) -> HubResult<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(ReportStatus::Pending),
            "resolved" => Ok(ReportStatus::Resolved),
            "dismissed" => Ok(ReportStatus::Dismissed),
            _ => Err(HubError::Validation(format!("Invalid report status: {}", s))),
        }
    }

    /// Re-applying the current terminal state counts as allowed.
    pub fn can_transition_to(&self, next: ReportStatus) -> bool {
        match (self, next) {
            (_, ReportStatus::Pending) => false,
            (ReportStatus::Pending, _) => true,
            (current, next) => *current == next,
        }
    }
}

/// Report record
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub id: String,
    pub reason: String,
    pub status: ReportStatus,
    pub reporter_id: String,
    pub reported_user_id: Option<String>,
    pub reported_post_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Report manager
#[derive(Clone)]
pub struct ReportManager {
    db: SqlitePool,
}

impl ReportManager {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// File a report against an account and/or a post
    pub async fn submit_report(
        &self,
        reporter_id: &str,
        reason: &str,
        reported_user_id: Option<&str>,
        reported_post_id: Option<&str>,
    ) -> HubResult<Report> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(HubError::Validation("Report reason is required".to_string()));
        }

        if reported_user_id.is_none() && reported_post_id.is_none() {
            return Err(HubError::Validation(
                "Must provide either reportedUserId or reportedPostId".to_string(),
            ));
        }

        if reported_user_id == Some(reporter_id) {
            return Err(HubError::Validation("You cannot report yourself".to_string()));
        }

        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO reports (id, reason, status, reporter_id, reported_user_id, reported_post_id, created_at)
            VALUES (?, ?, 'pending', ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(reason)
        .bind(reporter_id)
        .bind(reported_user_id)
        .bind(reported_post_id)
        .bind(now)
        .execute(&self.db)
        .await?;

        Ok(Report {
            id,
            reason: reason.to_string(),
            status: ReportStatus::Pending,
            reporter_id: reporter_id.to_string(),
            reported_user_id: reported_user_id.map(String::from),
            reported_post_id: reported_post_id.map(String::from),
            created_at: now,
        })
    }

    /// Move a report to a terminal status
    pub async fn transition(&self, report_id: &str, next: ReportStatus) -> HubResult<Report> {
        if next == ReportStatus::Pending {
            return Err(HubError::Validation(
                "Reports cannot be returned to pending".to_string(),
            ));
        }

        // The status guard keeps concurrent reviewers from flipping a
        // resolved report to dismissed or vice versa.
        let result = sqlx::query(
            "UPDATE reports SET status = ?1 WHERE id = ?2 AND status IN ('pending', ?1)",
        )
        .bind(next.as_str())
        .bind(report_id)
        .execute(&self.db)
        .await?;

        let report = self
            .get_report(report_id)
            .await?
            .ok_or_else(|| HubError::NotFound(format!("Report {} not found", report_id)))?;

        if result.rows_affected() == 0 && !report.status.can_transition_to(next) {
            return Err(HubError::Conflict(format!(
                "Report {} is already {}",
                report_id,
                report.status.as_str()
            )));
        }

        Ok(report)
    }

    /// Get report by ID
    pub async fn get_report(&self, report_id: &str) -> HubResult<Option<Report>> {
        let row = sqlx::query(
            r#"
            SELECT id, reason, status, reporter_id, reported_user_id, reported_post_id, created_at
            FROM reports
            WHERE id = ?
            "#,
        )
        .bind(report_id)
        .fetch_optional(&self.db)
        .await?;

        row.map(parse_report).transpose()
    }

    /// List reports newest first, optionally filtered by status
    pub async fn list_reports(&self, status: Option<ReportStatus>) -> HubResult<Vec<Report>> {
        let rows = if let Some(status) = status {
            sqlx::query(
                r#"
                SELECT id, reason, status, reporter_id, reported_user_id, reported_post_id, created_at
                FROM reports
                WHERE status = ?
                ORDER BY created_at DESC
                "#,
            )
            .bind(status.as_str())
            .fetch_all(&self.db)
            .await?
        } else {
            sqlx::query(
                r#"
                SELECT id, reason, status, reporter_id, reported_user_id, reported_post_id, created_at
                FROM reports
                ORDER BY created_at DESC
                "#,
            )
            .fetch_all(&self.db)
            .await?
        };

        rows.into_iter().map(parse_report).collect()
    }

    pub async fn count_pending(&self) -> HubResult<i64> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM reports WHERE status = 'pending'")
            .fetch_one(&self.db)
            .await?;

        Ok(count)
    }
}

fn parse_report(row: SqliteRow) -> HubResult<Report> {
    let status_str: String = row.get("status");

    Ok(Report {
        id: row.get("id"),
        reason: row.get("reason"),
        status: ReportStatus::from_str(&status_str)?,
        reporter_id: row.get("reporter_id"),
        reported_user_id: row.get("reported_user_id"),
        reported_post_id: row.get("reported_post_id"),
        created_at: row.try_get("created_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    #[test]
    fn test_transition_table() {
        use ReportStatus::*;
        assert!(Pending.can_transition_to(Resolved));
        assert!(Pending.can_transition_to(Dismissed));
        assert!(Resolved.can_transition_to(Resolved));
        assert!(!Resolved.can_transition_to(Dismissed));
        assert!(!Dismissed.can_transition_to(Resolved));
        assert!(!Resolved.can_transition_to(Pending));
        assert!(!Pending.can_transition_to(Pending));
    }

    #[tokio::test]
    async fn test_submit_validation() {
        let db = db::create_memory_pool().await.unwrap();
        let manager = ReportManager::new(db);

        assert!(manager.submit_report("r", "  ", Some("t"), None).await.is_err());
        assert!(manager.submit_report("r", "spam", None, None).await.is_err());
        assert!(manager.submit_report("r", "spam", Some("r"), None).await.is_err());

        let report = manager
            .submit_report("r", " spam ", None, Some("post-1"))
            .await
            .unwrap();
        assert_eq!(report.status, ReportStatus::Pending);
        assert_eq!(report.reason, "spam");
        assert_eq!(manager.count_pending().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_status_never_returns_to_pending() {
        let db = db::create_memory_pool().await.unwrap();
        let manager = ReportManager::new(db);

        let report = manager
            .submit_report("reporter", "harassment", Some("target"), None)
            .await
            .unwrap();

        let resolved = manager.transition(&report.id, ReportStatus::Resolved).await.unwrap();
        assert_eq!(resolved.status, ReportStatus::Resolved);

        // Same transition again is a harmless overwrite
        let again = manager.transition(&report.id, ReportStatus::Resolved).await.unwrap();
        assert_eq!(again.status, ReportStatus::Resolved);

        let flip = manager.transition(&report.id, ReportStatus::Dismissed).await;
        assert!(matches!(flip, Err(HubError::Conflict(_))));

        let back = manager.transition(&report.id, ReportStatus::Pending).await;
        assert!(matches!(back, Err(HubError::Validation(_))));

        let stored = manager.get_report(&report.id).await.unwrap().unwrap();
        assert_eq!(stored.status, ReportStatus::Resolved);
        assert_eq!(manager.count_pending().await.unwrap(), 0);

        let missing = manager.transition("nope", ReportStatus::Dismissed).await;
        assert!(matches!(missing, Err(HubError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_list_reports_by_status() {
        let db = db::create_memory_pool().await.unwrap();
        let manager = ReportManager::new(db);

        let first = manager.submit_report("a", "one", Some("x"), None).await.unwrap();
        manager.submit_report("b", "two", Some("y"), None).await.unwrap();
        manager.transition(&first.id, ReportStatus::Dismissed).await.unwrap();

        assert_eq!(manager.list_reports(None).await.unwrap().len(), 2);
        let pending = manager.list_reports(Some(ReportStatus::Pending)).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].reason, "two");
        let dismissed = manager.list_reports(Some(ReportStatus::Dismissed)).await.unwrap();
        assert_eq!(dismissed[0].id, first.id);
    }
}
