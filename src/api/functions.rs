/// Privileged function endpoints
use crate::{admin::DeletionError, context::AppContext};
use axum::{
    body::Bytes,
    extract::State,
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    routing::post,
    Json, Router,
};
use serde_json::{json, Value};

/// Build function routes
pub fn routes() -> Router<AppContext> {
    Router::new().route(
        "/functions/v1/admin-delete-account",
        post(admin_delete_account).options(preflight),
    )
}

/// CORS pre-flight: empty 200
async fn preflight() -> StatusCode {
    StatusCode::OK
}

/// Delete an account and everything it owns.
///
/// The body is read raw so that credential checks run before it is parsed.
async fn admin_delete_account(
    State(ctx): State<AppContext>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, DeletionError> {
    let authorization = headers.get(AUTHORIZATION).and_then(|h| h.to_str().ok());

    let receipt = ctx.account_deletion.run(authorization, &body).await?;
    tracing::debug!("admin-delete-account completed for {}", receipt.user_id);

    Ok(Json(json!({ "success": true })))
}
