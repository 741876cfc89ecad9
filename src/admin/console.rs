/// Admin console operations
///
/// Every operation re-checks the caller's privileges here, on the server,
/// even though the console UI hides actions it expects to be refused.
use crate::{
    account::AccountManager,
    admin::{
        policy::{self, AuthorizationFlags, Caller},
        BanLedger, BannedEmail, GrantOutcome, ProfileManager, Report, ReportManager,
        ReportStatus, RevokeOutcome, Role, RoleAssignment, RoleManager,
    },
    config::ServerConfig,
    db::account::Profile,
    error::{HubError, HubResult},
    events::{EventBus, ModerationEvent},
};
use serde::Serialize;
use sqlx::SqlitePool;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Overview counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsoleStats {
    pub users: i64,
    pub posts: i64,
    pub pending_reports: i64,
    pub banned_emails: i64,
}

/// Profile row decorated with the caller-relative advisory flags
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    #[serde(flatten)]
    pub profile: Profile,
    pub is_admin: bool,
    pub can_moderate: bool,
}

/// Report joined with the profiles it mentions
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportView {
    #[serde(flatten)]
    pub report: Report,
    pub reporter: Option<Profile>,
    pub reported_user: Option<Profile>,
}

/// Admin console service
pub struct AdminConsole {
    db: SqlitePool,
    config: Arc<ServerConfig>,
    accounts: Arc<AccountManager>,
    roles: Arc<RoleManager>,
    profiles: Arc<ProfileManager>,
    reports: Arc<ReportManager>,
    ban_ledger: Arc<BanLedger>,
    events: EventBus,
}

impl AdminConsole {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        db: SqlitePool,
        config: Arc<ServerConfig>,
        accounts: Arc<AccountManager>,
        roles: Arc<RoleManager>,
        profiles: Arc<ProfileManager>,
        reports: Arc<ReportManager>,
        ban_ledger: Arc<BanLedger>,
        events: EventBus,
    ) -> Self {
        Self {
            db,
            config,
            accounts,
            roles,
            profiles,
            reports,
            ban_ledger,
            events,
        }
    }

    /// Authorization check for an authenticated identity
    pub async fn authorize(&self, user_id: &str, email: Option<&str>) -> HubResult<Caller> {
        let roles = self.roles.roles_for(user_id).await?;
        Ok(Caller::from_roles(
            user_id,
            email,
            &roles,
            self.config.authentication.principal_email.as_deref(),
        ))
    }

    /// Advisory flags; an absent caller is simply not an admin
    pub async fn flags(&self, identity: Option<(&str, Option<&str>)>) -> HubResult<AuthorizationFlags> {
        match identity {
            Some((user_id, email)) => Ok(self.authorize(user_id, email).await?.flags()),
            None => Ok(AuthorizationFlags::default()),
        }
    }

    pub async fn stats(&self, caller: &Caller) -> HubResult<ConsoleStats> {
        policy::ensure_admin(caller)?;

        let (users, posts, pending_reports, banned_emails) = tokio::try_join!(
            self.profiles.count(),
            self.count_posts(),
            self.reports.count_pending(),
            self.ban_ledger.count(),
        )?;

        Ok(ConsoleStats {
            users,
            posts,
            pending_reports,
            banned_emails,
        })
    }

    /// Newest profiles or a search, each with caller-relative flags
    pub async fn list_users(&self, caller: &Caller, search: Option<&str>) -> HubResult<Vec<UserSummary>> {
        policy::ensure_admin(caller)?;

        let (profiles, admin_ids) = tokio::try_join!(
            self.profiles.list_profiles(search),
            self.privileged_ids(),
        )?;

        Ok(profiles
            .into_iter()
            .map(|profile| {
                let is_admin = admin_ids.contains(&profile.user_id);
                let can_moderate = policy::can_moderate(caller, &profile.user_id, is_admin);
                UserSummary {
                    profile,
                    is_admin,
                    can_moderate,
                }
            })
            .collect())
    }

    /// Flag an account as banned, optionally adding its email to the ban ledger
    pub async fn ban_user(
        &self,
        caller: &Caller,
        target_id: &str,
        reason: Option<&str>,
        ban_email: bool,
    ) -> HubResult<Profile> {
        policy::ensure_admin(caller)?;
        let target_is_admin = self.is_privileged(target_id).await?;
        policy::ensure_can_moderate(caller, target_id, target_is_admin)?;

        let reason = reason
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .unwrap_or(self.config.moderation.default_ban_reason.as_str())
            .to_string();

        // Resolve the email first so a missing auth record leaves no partial ban
        let email = if ban_email {
            let email = self
                .accounts
                .get_user(target_id)
                .await?
                .and_then(|user| user.email)
                .ok_or_else(|| HubError::NotFound(format!("No email on record for {}", target_id)))?;
            Some(email)
        } else {
            None
        };

        self.profiles.set_banned(target_id, &reason).await?;
        tracing::info!("{} banned {}: {}", caller.user_id, target_id, reason);

        self.events.publish(ModerationEvent::AccountBanned {
            user_id: target_id.to_string(),
            reason: reason.clone(),
            banned_by: caller.user_id.clone(),
        });
        self.audit(caller, "account.ban", Some(target_id), Some(reason.as_str())).await;

        if let Some(email) = email {
            self.ban_email(caller, &email, Some(reason.as_str())).await?;
        }

        self.profiles
            .get_profile(target_id)
            .await?
            .ok_or_else(|| HubError::NotFound(format!("Profile {} not found", target_id)))
    }

    pub async fn unban_user(&self, caller: &Caller, target_id: &str) -> HubResult<Profile> {
        policy::ensure_admin(caller)?;
        let target_is_admin = self.is_privileged(target_id).await?;
        policy::ensure_can_moderate(caller, target_id, target_is_admin)?;

        self.profiles.clear_ban(target_id).await?;
        tracing::info!("{} unbanned {}", caller.user_id, target_id);

        self.events.publish(ModerationEvent::AccountUnbanned {
            user_id: target_id.to_string(),
            unbanned_by: caller.user_id.clone(),
        });
        self.audit(caller, "account.unban", Some(target_id), None).await;

        self.profiles
            .get_profile(target_id)
            .await?
            .ok_or_else(|| HubError::NotFound(format!("Profile {} not found", target_id)))
    }

    /// Principal only. Promoting an existing admin reports `AlreadyHeld`.
    pub async fn promote(&self, caller: &Caller, target_id: &str) -> HubResult<GrantOutcome> {
        policy::ensure_principal(caller)?;

        if self.accounts.get_user(target_id).await?.is_none() {
            return Err(HubError::NotFound(format!("User {} not found", target_id)));
        }

        let outcome = self.roles.grant_role(target_id, Role::Admin).await?;
        match outcome {
            GrantOutcome::Granted => {
                tracing::info!("{} promoted {} to admin", caller.user_id, target_id);
                self.events.publish(ModerationEvent::RoleGranted {
                    user_id: target_id.to_string(),
                    role: Role::Admin,
                    granted_by: caller.user_id.clone(),
                });
                self.audit(caller, "role.grant", Some(target_id), Some(Role::Admin.as_str()))
                    .await;
            }
            GrantOutcome::AlreadyHeld => {
                tracing::debug!("{} is already an admin", target_id);
            }
        }

        Ok(outcome)
    }

    /// Principal only, never on itself. Demoting a non-admin reports `NotHeld`.
    pub async fn demote(&self, caller: &Caller, target_id: &str) -> HubResult<RevokeOutcome> {
        policy::ensure_can_demote(caller, target_id)?;

        let outcome = self.roles.revoke_role(target_id, Role::Admin).await?;
        if outcome == RevokeOutcome::Revoked {
            tracing::info!("{} demoted {}", caller.user_id, target_id);
            self.events.publish(ModerationEvent::RoleRevoked {
                user_id: target_id.to_string(),
                role: Role::Admin,
                revoked_by: caller.user_id.clone(),
            });
            self.audit(caller, "role.revoke", Some(target_id), Some(Role::Admin.as_str()))
                .await;
        }

        Ok(outcome)
    }

    /// Every role row, newest first
    pub async fn list_role_assignments(&self, caller: &Caller) -> HubResult<Vec<RoleAssignment>> {
        policy::ensure_admin(caller)?;
        self.roles.list_assignments().await
    }

    /// Reports newest first, with reporter and reported profiles attached
    pub async fn list_reports(
        &self,
        caller: &Caller,
        status: Option<ReportStatus>,
    ) -> HubResult<Vec<ReportView>> {
        policy::ensure_admin(caller)?;

        let reports = self.reports.list_reports(status).await?;

        let ids: Vec<String> = reports
            .iter()
            .flat_map(|r| std::iter::once(r.reporter_id.clone()).chain(r.reported_user_id.clone()))
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        let profiles: HashMap<String, Profile> = self
            .profiles
            .get_profiles(&ids)
            .await?
            .into_iter()
            .map(|p| (p.user_id.clone(), p))
            .collect();

        Ok(reports
            .into_iter()
            .map(|report| ReportView {
                reporter: profiles.get(&report.reporter_id).cloned(),
                reported_user: report
                    .reported_user_id
                    .as_ref()
                    .and_then(|id| profiles.get(id).cloned()),
                report,
            })
            .collect())
    }

    pub async fn resolve_report(&self, caller: &Caller, report_id: &str) -> HubResult<Report> {
        self.review_report(caller, report_id, ReportStatus::Resolved).await
    }

    pub async fn dismiss_report(&self, caller: &Caller, report_id: &str) -> HubResult<Report> {
        self.review_report(caller, report_id, ReportStatus::Dismissed).await
    }

    async fn review_report(
        &self,
        caller: &Caller,
        report_id: &str,
        status: ReportStatus,
    ) -> HubResult<Report> {
        policy::ensure_admin(caller)?;

        let report = self.reports.transition(report_id, status).await?;
        tracing::info!("{} marked report {} {}", caller.user_id, report_id, status.as_str());

        self.events.publish(ModerationEvent::ReportStatusChanged {
            report_id: report_id.to_string(),
            status,
            reviewed_by: caller.user_id.clone(),
        });
        self.audit(caller, "report.update", None, Some(status.as_str())).await;

        Ok(report)
    }

    pub async fn list_banned_emails(&self, caller: &Caller) -> HubResult<Vec<BannedEmail>> {
        policy::ensure_admin(caller)?;
        self.ban_ledger.list().await
    }

    pub async fn ban_email(
        &self,
        caller: &Caller,
        email: &str,
        reason: Option<&str>,
    ) -> HubResult<BannedEmail> {
        policy::ensure_admin(caller)?;

        let reason = reason
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .unwrap_or(self.config.moderation.default_ban_reason.as_str());

        let entry = self.ban_ledger.ban_email(email, &caller.user_id, reason).await?;
        tracing::info!("{} banned email {}", caller.user_id, entry.email);

        self.events.publish(ModerationEvent::EmailBanned {
            email: entry.email.clone(),
            banned_by: caller.user_id.clone(),
        });
        self.audit(caller, "email.ban", None, Some(entry.email.as_str())).await;

        Ok(entry)
    }

    pub async fn unban_email(&self, caller: &Caller, id: &str) -> HubResult<()> {
        policy::ensure_admin(caller)?;

        if !self.ban_ledger.remove(id).await? {
            return Err(HubError::NotFound(format!("Banned email {} not found", id)));
        }
        tracing::info!("{} removed ban ledger entry {}", caller.user_id, id);

        self.events.publish(ModerationEvent::EmailUnbanned {
            id: id.to_string(),
            unbanned_by: caller.user_id.clone(),
        });
        self.audit(caller, "email.unban", None, Some(id)).await;

        Ok(())
    }

    /// Accounts shielded from non-principal moderation
    async fn privileged_ids(&self) -> HubResult<HashSet<String>> {
        let (admins, principals) = tokio::try_join!(
            self.roles.holders(Role::Admin),
            self.roles.holders(Role::SuperAdmin),
        )?;
        Ok(admins.into_iter().chain(principals).collect())
    }

    async fn is_privileged(&self, user_id: &str) -> HubResult<bool> {
        Ok(!self.roles.roles_for(user_id).await?.is_empty())
    }

    async fn count_posts(&self) -> HubResult<i64> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM posts")
            .fetch_one(&self.db)
            .await?;
        Ok(count)
    }

    async fn audit(&self, caller: &Caller, action: &str, subject: Option<&str>, details: Option<&str>) {
        if let Err(e) = self.roles.log_action(&caller.user_id, action, subject, details).await {
            tracing::warn!("Failed to write audit log for {}: {}", action, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{account::SignupRequest, config::test_config, db};

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    struct Fixture {
        db: SqlitePool,
        console: AdminConsole,
        roles: Arc<RoleManager>,
        accounts: Arc<AccountManager>,
        events: EventBus,
    }

    async fn fixture() -> Fixture {
        let db = db::create_memory_pool().await.unwrap();
        let config = Arc::new(test_config(SECRET));
        let accounts = Arc::new(AccountManager::new(db.clone(), config.clone()));
        let roles = Arc::new(RoleManager::new(db.clone()));
        let events = EventBus::default();
        let console = AdminConsole::new(
            db.clone(),
            config,
            accounts.clone(),
            roles.clone(),
            Arc::new(ProfileManager::new(db.clone())),
            Arc::new(ReportManager::new(db.clone())),
            Arc::new(BanLedger::new(db.clone())),
            events.clone(),
        );
        Fixture {
            db,
            console,
            roles,
            accounts,
            events,
        }
    }

    impl Fixture {
        async fn user(&self, name: &str) -> String {
            self.accounts
                .create_account(SignupRequest {
                    email: format!("{}@example.com", name),
                    username: name.to_string(),
                    display_name: None,
                })
                .await
                .unwrap()
                .user_id
        }

        async fn caller(&self, user_id: &str) -> Caller {
            self.console.authorize(user_id, None).await.unwrap()
        }
    }

    #[tokio::test]
    async fn test_admin_cannot_ban_other_admin_but_principal_can() {
        let f = fixture().await;
        let principal = f.user("principal").await;
        let admin_a = f.user("admina").await;
        let admin_b = f.user("adminb").await;
        f.roles.grant_role(&principal, Role::SuperAdmin).await.unwrap();
        f.roles.grant_role(&principal, Role::Admin).await.unwrap();
        f.roles.grant_role(&admin_a, Role::Admin).await.unwrap();
        f.roles.grant_role(&admin_b, Role::Admin).await.unwrap();

        let a = f.caller(&admin_a).await;
        let result = f.console.ban_user(&a, &admin_b, None, false).await;
        assert!(matches!(result, Err(HubError::Authorization(_))));

        let p = f.caller(&principal).await;
        let banned = f.console.ban_user(&p, &admin_b, Some("  "), false).await.unwrap();
        assert!(banned.is_banned);
        assert_eq!(banned.ban_reason.as_deref(), Some("Banned by admin"));

        let self_ban = f.console.ban_user(&p, &principal, None, false).await;
        assert!(matches!(self_ban, Err(HubError::Authorization(_))));
    }

    #[tokio::test]
    async fn test_ban_with_email_and_unban() {
        let f = fixture().await;
        let admin = f.user("admin").await;
        let troll = f.user("troll").await;
        f.roles.grant_role(&admin, Role::Admin).await.unwrap();
        let mut rx = f.events.subscribe();

        let caller = f.caller(&admin).await;
        f.console.ban_user(&caller, &troll, Some("spam"), true).await.unwrap();

        let ledger = f.console.list_banned_emails(&caller).await.unwrap();
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger[0].email, "troll@example.com");
        assert_eq!(ledger[0].reason.as_deref(), Some("spam"));

        assert!(matches!(rx.recv().await.unwrap(), ModerationEvent::AccountBanned { .. }));
        assert!(matches!(rx.recv().await.unwrap(), ModerationEvent::EmailBanned { .. }));

        let profile = f.console.unban_user(&caller, &troll).await.unwrap();
        assert!(!profile.is_banned);
        assert!(profile.ban_reason.is_none());

        f.console.unban_email(&caller, &ledger[0].id).await.unwrap();
        assert!(matches!(
            f.console.unban_email(&caller, &ledger[0].id).await,
            Err(HubError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_email_ban_without_auth_record_writes_nothing() {
        let f = fixture().await;
        let admin = f.user("admin").await;
        f.roles.grant_role(&admin, Role::Admin).await.unwrap();
        sqlx::query("INSERT INTO profiles (user_id, username, created_at) VALUES ('ghost', 'ghost', ?)")
            .bind(chrono::Utc::now())
            .execute(&f.db)
            .await
            .unwrap();
        let mut rx = f.events.subscribe();

        let caller = f.caller(&admin).await;
        let result = f.console.ban_user(&caller, "ghost", Some("spam"), true).await;
        assert!(matches!(result, Err(HubError::NotFound(_))));

        assert!(!ProfileManager::new(f.db.clone()).is_banned("ghost").await.unwrap());
        assert!(f.roles.recent_actions(10).await.unwrap().is_empty());
        assert!(rx.try_recv().is_err());

        // Without the email step the same account can still be flagged
        let profile = f.console.ban_user(&caller, "ghost", Some("spam"), false).await.unwrap();
        assert!(profile.is_banned);
    }

    #[tokio::test]
    async fn test_principal_role_alone_opens_the_console() {
        let f = fixture().await;
        let principal = f.user("principal").await;
        let member = f.user("member").await;
        f.roles.grant_role(&principal, Role::SuperAdmin).await.unwrap();

        let p = f.caller(&principal).await;
        assert!(!p.is_admin);
        assert_eq!(f.console.stats(&p).await.unwrap().users, 2);
        assert_eq!(f.console.promote(&p, &member).await.unwrap(), GrantOutcome::Granted);

        let assignments = f.console.list_role_assignments(&p).await.unwrap();
        assert_eq!(assignments.len(), 2);
        assert!(assignments
            .iter()
            .any(|a| a.user_id == member && a.role == Role::Admin));

        let m = f.caller(&member).await;
        assert!(f.console.list_role_assignments(&m).await.is_ok());
        let outsider = f.caller("nobody").await;
        assert!(matches!(
            f.console.list_role_assignments(&outsider).await,
            Err(HubError::Authorization(_))
        ));
    }

    #[tokio::test]
    async fn test_promotion_and_demotion_are_principal_gated_and_idempotent() {
        let f = fixture().await;
        let principal = f.user("principal").await;
        let admin = f.user("admin").await;
        let member = f.user("member").await;
        f.roles.grant_role(&principal, Role::SuperAdmin).await.unwrap();
        f.roles.grant_role(&admin, Role::Admin).await.unwrap();

        let a = f.caller(&admin).await;
        assert!(f.console.promote(&a, &member).await.is_err());
        assert!(f.console.demote(&a, &member).await.is_err());

        let p = f.caller(&principal).await;
        assert_eq!(f.console.promote(&p, &member).await.unwrap(), GrantOutcome::Granted);
        assert_eq!(f.console.promote(&p, &member).await.unwrap(), GrantOutcome::AlreadyHeld);

        let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM user_roles WHERE user_id = ? AND role = 'admin'")
            .bind(&member)
            .fetch_one(&f.db)
            .await
            .unwrap();
        assert_eq!(rows, 1);

        assert_eq!(f.console.demote(&p, &member).await.unwrap(), RevokeOutcome::Revoked);
        assert_eq!(f.console.demote(&p, &member).await.unwrap(), RevokeOutcome::NotHeld);
        assert!(f.console.demote(&p, &principal).await.is_err());

        assert!(matches!(
            f.console.promote(&p, "ghost").await,
            Err(HubError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_list_users_flags() {
        let f = fixture().await;
        let admin = f.user("admin").await;
        let other_admin = f.user("otheradmin").await;
        let member = f.user("member").await;
        f.roles.grant_role(&admin, Role::Admin).await.unwrap();
        f.roles.grant_role(&other_admin, Role::Admin).await.unwrap();

        let caller = f.caller(&admin).await;
        let users = f.console.list_users(&caller, None).await.unwrap();
        assert_eq!(users.len(), 3);

        let by_id: HashMap<_, _> = users.iter().map(|u| (u.profile.user_id.clone(), u)).collect();
        assert!(!by_id[&admin].can_moderate);
        assert!(by_id[&other_admin].is_admin);
        assert!(!by_id[&other_admin].can_moderate);
        assert!(by_id[&member].can_moderate);

        let found = f.console.list_users(&caller, Some("MEM")).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].profile.user_id, member);
    }

    #[tokio::test]
    async fn test_reports_and_stats() {
        let f = fixture().await;
        let admin = f.user("admin").await;
        let reporter = f.user("reporter").await;
        let target = f.user("target").await;
        f.roles.grant_role(&admin, Role::Admin).await.unwrap();

        let reports = ReportManager::new(f.db.clone());
        let report = reports
            .submit_report(&reporter, "harassment", Some(target.as_str()), None)
            .await
            .unwrap();

        let caller = f.caller(&admin).await;
        let stats = f.console.stats(&caller).await.unwrap();
        assert_eq!(
            stats,
            ConsoleStats {
                users: 3,
                posts: 0,
                pending_reports: 1,
                banned_emails: 0
            }
        );

        let views = f.console.list_reports(&caller, None).await.unwrap();
        assert_eq!(views.len(), 1);
        assert_eq!(views[0].reporter.as_ref().unwrap().username, "reporter");
        assert_eq!(views[0].reported_user.as_ref().unwrap().username, "target");

        f.console.dismiss_report(&caller, &report.id).await.unwrap();
        assert!(matches!(
            f.console.resolve_report(&caller, &report.id).await,
            Err(HubError::Conflict(_))
        ));
        assert_eq!(f.console.stats(&caller).await.unwrap().pending_reports, 0);
    }

    #[tokio::test]
    async fn test_non_admin_caller_is_refused() {
        let f = fixture().await;
        let member = f.user("member").await;
        let caller = f.caller(&member).await;

        assert!(matches!(f.console.stats(&caller).await, Err(HubError::Authorization(_))));
        assert!(f.console.list_banned_emails(&caller).await.is_err());
        assert_eq!(
            f.console.flags(None).await.unwrap(),
            AuthorizationFlags::default()
        );
    }
}
