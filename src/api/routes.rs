//! API route definitions.
//!
//! Authenticated scoring surface under `/api/v1`:
//! - `/predict`, `/predict_batch`, `/predict_batch_async` — scoring
//! - `/batch_status/{job_id}`, `/batch_results/{job_id}`, `/batch_job/{job_id}`, `/batch_jobs` — job management
//! - `/generate_random`, `/generate_ramp_up`, `/generate_ramp_down` — fixtures
//!
//! Unauthenticated probes at the root: `/health`, `/health/simple`,
//! `/readiness`, `/liveness`.

use std::sync::Arc;

use axum::routing::{delete, get, post};
use axum::Router;

use super::handlers;
use super::AppContext;

/// Authenticated v1 API routes.
pub fn api_routes(ctx: Arc<AppContext>) -> Router {
    Router::new()
        .route("/predict", post(handlers::predict))
        .route("/predict_batch", post(handlers::predict_batch))
        .route("/predict_batch_async", post(handlers::submit_async_batch))
        .route("/batch_status/:job_id", get(handlers::batch_status))
        .route("/batch_results/:job_id", get(handlers::batch_results))
        .route("/batch_job/:job_id", delete(handlers::cancel_batch_job))
        .route("/batch_jobs", get(handlers::list_batch_jobs))
        .route("/generate_random", get(handlers::generate_random))
        .route("/generate_ramp_up", get(handlers::generate_ramp_up))
        .route("/generate_ramp_down", get(handlers::generate_ramp_down))
        .with_state(ctx)
}

/// Unauthenticated health and probe routes.
pub fn probe_routes(ctx: Arc<AppContext>) -> Router {
    Router::new()
        .route("/health", get(handlers::detailed_health))
        .route("/health/simple", get(handlers::simple_health))
        .route("/readiness", get(handlers::readiness))
        .route("/liveness", get(handlers::liveness))
        .with_state(ctx)
}
