/// User-facing report submission
use crate::{
    admin::Report,
    api::middleware::check_account_ban,
    auth::AuthContext,
    context::AppContext,
    error::HubResult,
};
use axum::{extract::State, http::StatusCode, middleware, routing::post, Json, Router};
use serde::Deserialize;

/// Build report routes. Banned accounts are turned away before the handler runs.
pub fn routes(ctx: AppContext) -> Router<AppContext> {
    Router::new()
        .route("/rest/v1/reports", post(submit_report))
        .route_layer(middleware::from_fn_with_state(ctx, check_account_ban))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubmitReportRequest {
    reason: String,
    reported_user_id: Option<String>,
    reported_post_id: Option<String>,
}

async fn submit_report(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Json(req): Json<SubmitReportRequest>,
) -> HubResult<(StatusCode, Json<Report>)> {
    let report = ctx
        .report_manager
        .submit_report(
            &auth.user_id,
            &req.reason,
            req.reported_user_id.as_deref(),
            req.reported_post_id.as_deref(),
        )
        .await?;

    tracing::info!("Report {} filed by {}", report.id, auth.user_id);

    Ok((StatusCode::CREATED, Json(report)))
}
