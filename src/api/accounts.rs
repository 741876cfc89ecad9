/// Account registration endpoint
use crate::{
    account::{SignupRequest, SignupResponse},
    context::AppContext,
    error::HubResult,
};
use axum::{extract::State, http::StatusCode, routing::post, Json, Router};

/// Build account routes
pub fn routes() -> Router<AppContext> {
    Router::new().route("/auth/v1/signup", post(signup))
}

/// Register a new account. Emails on the ban ledger are refused.
async fn signup(
    State(ctx): State<AppContext>,
    Json(req): Json<SignupRequest>,
) -> HubResult<(StatusCode, Json<SignupResponse>)> {
    tracing::info!("signup: registering username {}", req.username);

    let account = ctx.account_manager.create_account(req).await?;

    Ok((StatusCode::CREATED, Json(account)))
}
