//! Shared test harness: builds a full application context in-process with
//! the synthetic model, demo credentials, and a disabled journal.
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use heatguard::admission::rate_limit::FallbackLimiter;
use heatguard::admission::{AdmissionController, CredentialStore};
use heatguard::api::{create_app, AppContext};
use heatguard::compliance::{ComplianceJournal, JournalConfig};
use heatguard::config::Settings;
use heatguard::generator::DataGenerator;
use heatguard::health::HealthCollector;
use heatguard::model::{HeuristicModel, ModelHost};
use heatguard::preprocessing::Preprocessor;
use heatguard::scheduler::{BatchScheduler, SchedulerConfig};
use heatguard::scoring::Scorer;
use heatguard::service::ScoringService;

pub const DEMO_KEY: &str = "heatguard-api-key-demo-12345";
pub const READONLY_KEY: &str = "heatguard-readonly-key-67890";

pub struct TestHarness {
    pub ctx: Arc<AppContext>,
    pub shutdown: CancellationToken,
}

impl TestHarness {
    pub fn app(&self) -> axum::Router {
        create_app(Arc::clone(&self.ctx))
    }
}

/// Build a harness with the synthetic model loaded (unless `with_model` is
/// false) and scheduler background tasks running.
pub fn harness(with_model: bool, scheduler_config: SchedulerConfig) -> TestHarness {
    let settings = Settings::default();

    let store = CredentialStore::load(None, true).expect("demo credentials");
    let admission =
        Arc::new(AdmissionController::new(store, FallbackLimiter::in_memory(), 100));

    let model_host = Arc::new(ModelHost::new("/nonexistent", settings.model_cache_size));
    if with_model {
        model_host.insert("default", Arc::new(HeuristicModel::new()));
    }

    let shutdown = CancellationToken::new();
    let (journal, _) = ComplianceJournal::spawn(JournalConfig::disabled(), shutdown.clone());

    let scoring = Arc::new(ScoringService::new(
        Scorer::new(settings.conservative_bias, settings.heat_index_threshold_danger),
        Preprocessor::new(true),
        Arc::clone(&model_host),
        journal.clone(),
        8,
        settings.batch_size_limit,
        Duration::from_secs(30),
    ));

    let scheduler = BatchScheduler::new(Arc::clone(&scoring), scheduler_config);
    scheduler.spawn_background(&shutdown);

    let health = Arc::new(HealthCollector::new(
        Arc::clone(&model_host),
        scoring.counters(),
        Arc::clone(&scheduler),
        journal,
        Arc::clone(&admission),
        scoring.validation_summary(),
    ));

    let ctx = Arc::new(AppContext {
        settings,
        admission,
        scoring,
        scheduler,
        model_host,
        generator: Arc::new(DataGenerator::new(Some(42))),
        health,
    });

    TestHarness { ctx, shutdown }
}

/// A complete, valid worker sample as a JSON value.
pub fn worker_sample(
    age: f64,
    gender: f64,
    temperature_c: f64,
    humidity_pct: f64,
    mean_hr: f64,
) -> serde_json::Value {
    serde_json::json!({
        "worker_id": "test-worker",
        "age": age,
        "gender": gender,
        "temperature_c": temperature_c,
        "humidity_pct": humidity_pct,
        "hrv_mean_hr": mean_hr,
        "hrv_mean_nni": 60000.0 / mean_hr,
    })
}
