//! HTTP surface: application context, router assembly, auth extractors,
//! and the uniform response envelope.

pub mod auth;
pub mod envelope;
mod handlers;
mod routes;

use std::sync::Arc;

use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::admission::AdmissionController;
use crate::config::Settings;
use crate::generator::DataGenerator;
use crate::health::HealthCollector;
use crate::model::ModelHost;
use crate::scheduler::BatchScheduler;
use crate::service::ScoringService;

/// Shared application context injected into every handler. Constructed once
/// at bootstrap; nothing prevents two instances coexisting in tests.
pub struct AppContext {
    pub settings: Settings,
    pub admission: Arc<AdmissionController>,
    pub scoring: Arc<ScoringService>,
    pub scheduler: Arc<BatchScheduler>,
    pub model_host: Arc<ModelHost>,
    pub generator: Arc<DataGenerator>,
    pub health: Arc<HealthCollector>,
}

/// Assemble the full application router.
pub fn create_app(ctx: Arc<AppContext>) -> Router {
    Router::new()
        .nest("/api/v1", routes::api_routes(Arc::clone(&ctx)))
        .merge(routes::probe_routes(ctx))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
