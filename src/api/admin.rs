/// Admin console API endpoints
///
/// Every route except `/admin/authorization` requires `AdminAuthContext`.
/// The console service re-checks the target-mutability policy on each write.
use crate::{
    admin::{
        AuditLogEntry, AuthorizationFlags, BannedEmail, ConsoleStats, GrantOutcome, Report,
        ReportStatus, ReportView, RevokeOutcome, RoleAssignment, UserSummary,
    },
    auth::{AdminAuthContext, OptionalAuthContext},
    context::AppContext,
    db::account::Profile,
    error::HubResult,
};
use axum::{
    extract::{Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

const AUDIT_LOG_LIMIT: i64 = 100;

/// Build admin API routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/admin/authorization", get(get_authorization))
        .route("/admin/stats", get(get_stats))
        .route("/admin/audit-log", get(get_audit_log))
        // Accounts
        .route("/admin/users", get(list_users))
        .route("/admin/users/ban", post(ban_user))
        .route("/admin/users/unban", post(unban_user))
        // Roles
        .route("/admin/roles", get(list_role_assignments))
        .route("/admin/roles/promote", post(promote))
        .route("/admin/roles/demote", post(demote))
        // Reports
        .route("/admin/reports", get(list_reports))
        .route("/admin/reports/resolve", post(resolve_report))
        .route("/admin/reports/dismiss", post(dismiss_report))
        // Ban ledger
        .route("/admin/banned-emails", get(list_banned_emails).post(add_banned_email))
        .route("/admin/banned-emails/remove", post(remove_banned_email))
}

/// Advisory flags for the current caller; anonymous callers get all-false
async fn get_authorization(
    State(ctx): State<AppContext>,
    auth: OptionalAuthContext,
) -> HubResult<Json<AuthorizationFlags>> {
    let identity = auth
        .auth
        .as_ref()
        .map(|a| (a.user_id.as_str(), a.session.email.as_deref()));

    Ok(Json(ctx.admin_console.flags(identity).await?))
}

async fn get_stats(
    State(ctx): State<AppContext>,
    auth: AdminAuthContext,
) -> HubResult<Json<ConsoleStats>> {
    Ok(Json(ctx.admin_console.stats(&auth.caller).await?))
}

#[derive(Debug, Serialize)]
struct AuditLogResponse {
    entries: Vec<AuditLogEntry>,
}

async fn get_audit_log(
    State(ctx): State<AppContext>,
    _auth: AdminAuthContext,
) -> HubResult<Json<AuditLogResponse>> {
    let entries = ctx.role_manager.recent_actions(AUDIT_LOG_LIMIT).await?;
    Ok(Json(AuditLogResponse { entries }))
}

#[derive(Debug, Deserialize)]
struct ListUsersQuery {
    q: Option<String>,
}

#[derive(Debug, Serialize)]
struct ListUsersResponse {
    users: Vec<UserSummary>,
}

async fn list_users(
    State(ctx): State<AppContext>,
    auth: AdminAuthContext,
    Query(query): Query<ListUsersQuery>,
) -> HubResult<Json<ListUsersResponse>> {
    let users = ctx
        .admin_console
        .list_users(&auth.caller, query.q.as_deref())
        .await?;

    Ok(Json(ListUsersResponse { users }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BanUserRequest {
    user_id: String,
    reason: Option<String>,
    #[serde(default)]
    ban_email: bool,
}

async fn ban_user(
    State(ctx): State<AppContext>,
    auth: AdminAuthContext,
    Json(req): Json<BanUserRequest>,
) -> HubResult<Json<Profile>> {
    let profile = ctx
        .admin_console
        .ban_user(&auth.caller, &req.user_id, req.reason.as_deref(), req.ban_email)
        .await?;

    Ok(Json(profile))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserIdRequest {
    user_id: String,
}

async fn unban_user(
    State(ctx): State<AppContext>,
    auth: AdminAuthContext,
    Json(req): Json<UserIdRequest>,
) -> HubResult<Json<Profile>> {
    Ok(Json(ctx.admin_console.unban_user(&auth.caller, &req.user_id).await?))
}

#[derive(Debug, Serialize)]
struct RoleAssignmentsResponse {
    assignments: Vec<RoleAssignment>,
}

async fn list_role_assignments(
    State(ctx): State<AppContext>,
    auth: AdminAuthContext,
) -> HubResult<Json<RoleAssignmentsResponse>> {
    let assignments = ctx.admin_console.list_role_assignments(&auth.caller).await?;
    Ok(Json(RoleAssignmentsResponse { assignments }))
}

#[derive(Debug, Serialize)]
struct RoleChangeResponse {
    outcome: &'static str,
}

async fn promote(
    State(ctx): State<AppContext>,
    auth: AdminAuthContext,
    Json(req): Json<UserIdRequest>,
) -> HubResult<Json<RoleChangeResponse>> {
    let outcome = match ctx.admin_console.promote(&auth.caller, &req.user_id).await? {
        GrantOutcome::Granted => "promoted",
        GrantOutcome::AlreadyHeld => "alreadyAdmin",
    };

    Ok(Json(RoleChangeResponse { outcome }))
}

async fn demote(
    State(ctx): State<AppContext>,
    auth: AdminAuthContext,
    Json(req): Json<UserIdRequest>,
) -> HubResult<Json<RoleChangeResponse>> {
    let outcome = match ctx.admin_console.demote(&auth.caller, &req.user_id).await? {
        RevokeOutcome::Revoked => "demoted",
        RevokeOutcome::NotHeld => "notAdmin",
    };

    Ok(Json(RoleChangeResponse { outcome }))
}

#[derive(Debug, Deserialize)]
struct ListReportsQuery {
    status: Option<String>,
}

#[derive(Debug, Serialize)]
struct ListReportsResponse {
    reports: Vec<ReportView>,
}

async fn list_reports(
    State(ctx): State<AppContext>,
    auth: AdminAuthContext,
    Query(query): Query<ListReportsQuery>,
) -> HubResult<Json<ListReportsResponse>> {
    let status = query
        .status
        .as_deref()
        .filter(|s| !s.is_empty())
        .map(ReportStatus::from_str)
        .transpose()?;

    let reports = ctx.admin_console.list_reports(&auth.caller, status).await?;

    Ok(Json(ListReportsResponse { reports }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReportIdRequest {
    report_id: String,
}

async fn resolve_report(
    State(ctx): State<AppContext>,
    auth: AdminAuthContext,
    Json(req): Json<ReportIdRequest>,
) -> HubResult<Json<Report>> {
    Ok(Json(ctx.admin_console.resolve_report(&auth.caller, &req.report_id).await?))
}

async fn dismiss_report(
    State(ctx): State<AppContext>,
    auth: AdminAuthContext,
    Json(req): Json<ReportIdRequest>,
) -> HubResult<Json<Report>> {
    Ok(Json(ctx.admin_console.dismiss_report(&auth.caller, &req.report_id).await?))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BannedEmailsResponse {
    banned_emails: Vec<BannedEmail>,
}

async fn list_banned_emails(
    State(ctx): State<AppContext>,
    auth: AdminAuthContext,
) -> HubResult<Json<BannedEmailsResponse>> {
    let banned_emails = ctx.admin_console.list_banned_emails(&auth.caller).await?;
    Ok(Json(BannedEmailsResponse { banned_emails }))
}

#[derive(Debug, Deserialize)]
struct AddBannedEmailRequest {
    email: String,
    reason: Option<String>,
}

async fn add_banned_email(
    State(ctx): State<AppContext>,
    auth: AdminAuthContext,
    Json(req): Json<AddBannedEmailRequest>,
) -> HubResult<Json<BannedEmail>> {
    let entry = ctx
        .admin_console
        .ban_email(&auth.caller, &req.email, req.reason.as_deref())
        .await?;

    Ok(Json(entry))
}

#[derive(Debug, Deserialize)]
struct RemoveBannedEmailRequest {
    id: String,
}

async fn remove_banned_email(
    State(ctx): State<AppContext>,
    auth: AdminAuthContext,
    Json(req): Json<RemoveBannedEmailRequest>,
) -> HubResult<Json<serde_json::Value>> {
    ctx.admin_console.unban_email(&auth.caller, &req.id).await?;
    Ok(Json(serde_json::json!({ "success": true })))
}
