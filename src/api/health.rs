/// Health check endpoints for liveness and readiness probes
use crate::{context::AppContext, jobs::tasks};
use axum::{extract::State, http::StatusCode, response::Json, routing::get, Router};
use serde::Serialize;
use std::time::Instant;

/// Health status of one component
#[derive(Debug, Clone, Serialize)]
pub struct ComponentHealth {
    pub name: String,
    /// "healthy" or "unhealthy"
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_time_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Build health check routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/health", get(health_basic))
        .route("/health/live", get(liveness_probe))
        .route("/health/ready", get(readiness_probe))
}

/// Basic health check
pub async fn health_basic() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Liveness probe. If we can respond, we're alive.
pub async fn liveness_probe() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "alive",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Readiness probe: 200 with component status, 503 when storage is unreachable
pub async fn readiness_probe(
    State(ctx): State<AppContext>,
) -> (StatusCode, Json<serde_json::Value>) {
    let database = check_database_detailed(&ctx).await;

    let status = if database.status == "healthy" {
        StatusCode::OK
    } else {
        tracing::warn!("readiness probe failed: {:?}", database.error);
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(serde_json::json!({
            "status": if status == StatusCode::OK { "ready" } else { "unavailable" },
            "version": env!("CARGO_PKG_VERSION"),
            "checks": [database],
        })),
    )
}

async fn check_database_detailed(ctx: &AppContext) -> ComponentHealth {
    let start = Instant::now();
    let result = tasks::health_check(ctx).await;
    let response_time_ms = Some(start.elapsed().as_millis() as u64);

    match result {
        Ok(()) => ComponentHealth {
            name: "database".to_string(),
            status: "healthy".to_string(),
            response_time_ms,
            error: None,
        },
        Err(e) => ComponentHealth {
            name: "database".to_string(),
            status: "unhealthy".to_string(),
            response_time_ms,
            error: Some(e.to_string()),
        },
    }
}
