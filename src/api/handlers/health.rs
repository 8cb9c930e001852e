//! Health, readiness, and liveness handlers. None require authentication.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use serde_json::json;

use crate::api::AppContext;
use crate::health::{HealthSnapshot, OverallStatus};

/// `GET /health` — detailed component health. Always 200; the body carries
/// the status.
pub async fn detailed_health(State(ctx): State<Arc<AppContext>>) -> Json<HealthSnapshot> {
    Json(ctx.health.detailed())
}

/// `GET /health/simple` — 200 when healthy, 503 otherwise.
pub async fn simple_health(State(ctx): State<Arc<AppContext>>) -> impl IntoResponse {
    let snapshot = ctx.health.detailed();
    let status = match snapshot.status {
        OverallStatus::Healthy | OverallStatus::Degraded => StatusCode::OK,
        OverallStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };
    (
        status,
        Json(json!({
            "status": snapshot.status,
            "timestamp": Utc::now().to_rfc3339(),
        })),
    )
}

/// `GET /readiness` — 200 once the default model artifact is loaded.
pub async fn readiness(State(ctx): State<Arc<AppContext>>) -> impl IntoResponse {
    if ctx.health.ready() {
        (StatusCode::OK, Json(json!({ "ready": true })))
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, Json(json!({ "ready": false })))
    }
}

/// `GET /liveness` — 200 while the process serves requests.
pub async fn liveness(State(ctx): State<Arc<AppContext>>) -> impl IntoResponse {
    let alive = ctx.health.alive();
    (StatusCode::OK, Json(json!({ "alive": alive })))
}
