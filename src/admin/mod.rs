/// Admin and Moderation System
///
/// Role grants, the target-mutability policy, account bans, the report
/// queue, the email ban ledger and the account deletion workflow.

pub mod banned_emails;
pub mod console;
pub mod deletion;
pub mod policy;
pub mod profiles;
pub mod reports;
pub mod roles;

pub use banned_emails::{BanLedger, BannedEmail};
pub use console::{AdminConsole, ConsoleStats, ReportView, UserSummary};
pub use deletion::{AccountDeletion, DeleteAccountRequest, DeletionError, DeletionReceipt};
pub use policy::{can_moderate, AuthorizationFlags, Caller};
pub use profiles::ProfileManager;
pub use reports::{Report, ReportManager, ReportStatus};
pub use roles::{GrantOutcome, RevokeOutcome, Role, RoleAssignment, RoleManager};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Admin action audit log entry
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditLogEntry {
    pub id: i64,
    pub admin_id: String,
    pub action: String,
    pub subject_id: Option<String>,
    pub details: Option<String>,
    pub timestamp: DateTime<Utc>,
}
