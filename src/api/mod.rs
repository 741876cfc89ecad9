/// API routes and handlers
pub mod accounts;
pub mod admin;
pub mod functions;
pub mod health;
pub mod middleware;
pub mod reports;

use crate::context::AppContext;
use axum::Router;

/// Build API routes
pub fn routes(ctx: AppContext) -> Router<AppContext> {
    Router::new()
        .merge(health::routes())
        .merge(accounts::routes())
        .merge(reports::routes(ctx))
        .merge(admin::routes())
        .merge(functions::routes())
}
