//! HeatGuard — heat-exposure risk scoring service.
//!
//! # Usage
//!
//! ```bash
//! # Development with the synthetic model
//! cargo run --release -- --synthetic-model
//!
//! # Production with a trained artifact
//! MODEL_DIR=/opt/heatguard/model ENVIRONMENT=production \
//! SECRET_KEY=... cargo run --release
//! ```
//!
//! # Environment Variables
//!
//! See `config::Settings::from_env` for the full list. The important ones:
//! `HOST`/`PORT`, `ENVIRONMENT`, `MODEL_DIR`, `REDIS_URL` (distributed rate
//! limiting), `HEATGUARD_API_KEYS` (credential TOML), `ENABLE_OSHA_LOGGING`,
//! `OSHA_LOG_FILE`, `RUST_LOG`.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use heatguard::admission::rate_limit::{FallbackLimiter, SharedStoreRateLimiter};
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

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "heatguard")]
#[command(about = "HeatGuard heat-exposure risk scoring service")]
#[command(version)]
struct CliArgs {
    /// Override the bind address (default from HOST/PORT, "0.0.0.0:8000")
    #[arg(short, long)]
    addr: Option<String>,

    /// Override the model artifact directory
    #[arg(long)]
    model_dir: Option<String>,

    /// Serve the deterministic synthetic model instead of a trained
    /// artifact (development and demos)
    #[arg(long)]
    synthetic_model: bool,

    /// Path to a TOML file with API credential records
    #[arg(long)]
    api_keys: Option<String>,

    /// Seed for the fixture generator (reproducible demo data)
    #[arg(long)]
    seed: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = CliArgs::parse();
    let mut settings = Settings::from_env().context("loading configuration")?;
    if let Some(dir) = args.model_dir {
        settings.model_dir = dir;
    }
    if let Some(path) = args.api_keys {
        settings.api_keys_file = Some(path);
    }
    let bind_address = args.addr.unwrap_or_else(|| settings.bind_address());

    info!(
        environment = ?settings.environment,
        bind = %bind_address,
        model_dir = %settings.model_dir,
        "Starting HeatGuard"
    );

    // ── Admission ────────────────────────────────────────────────────────
    let store = CredentialStore::load(
        settings.api_keys_file.as_deref(),
        settings.environment.installs_demo_credentials(),
    )
    .context("loading credential table")?;
    if store.is_empty() {
        warn!("No API credentials loaded; every authenticated request will be rejected");
    }

    let limiter = match &settings.shared_store_url {
        Some(url) => match SharedStoreRateLimiter::connect(url).await {
            Ok(shared) => {
                info!("Distributed rate limiting enabled via shared store");
                FallbackLimiter::new(Some(shared))
            }
            Err(err) => {
                warn!(error = %err, "Shared store unreachable, using in-memory rate limiting");
                FallbackLimiter::in_memory()
            }
        },
        None => FallbackLimiter::in_memory(),
    };
    let admission =
        Arc::new(AdmissionController::new(store, limiter, settings.rate_limit_per_minute));

    // ── Model host ───────────────────────────────────────────────────────
    let model_host = Arc::new(ModelHost::new(&settings.model_dir, settings.model_cache_size));
    if args.synthetic_model {
        model_host.insert("default", Arc::new(HeuristicModel::new()));
        info!("Synthetic model installed as the default artifact");
    } else {
        match model_host.load("default") {
            Ok(_) => info!("Default model artifact loaded"),
            Err(err) => warn!(
                error = %err,
                "Default artifact not loaded; service stays unready until it appears"
            ),
        }
    }

    // ── Background tasks ─────────────────────────────────────────────────
    let shutdown = CancellationToken::new();
    let mut background: Vec<(&str, JoinHandle<()>)> = Vec::new();

    let (journal, journal_handle) = ComplianceJournal::spawn(
        JournalConfig {
            enabled: settings.enable_osha_logging,
            path: settings.osha_log_file.clone().into(),
            max_bytes: settings.osha_log_max_bytes,
            generations: settings.osha_log_generations,
            heat_index_danger_f: settings.heat_index_threshold_danger,
            alert_fraction_threshold: 0.0,
        },
        shutdown.clone(),
    );

    let scoring = Arc::new(ScoringService::new(
        Scorer::new(settings.conservative_bias, settings.heat_index_threshold_danger),
        Preprocessor::new(settings.enable_scaling),
        Arc::clone(&model_host),
        journal.clone(),
        settings.max_concurrent_predictions,
        settings.batch_size_limit,
        Duration::from_secs(settings.prediction_timeout_secs),
    ));

    let scheduler = BatchScheduler::new(
        Arc::clone(&scoring),
        SchedulerConfig {
            max_batch_size: settings.async_batch_size_limit,
            queue_limit: settings.scheduler_queue_limit,
            max_concurrent_jobs: 4,
            retention_ttl: Duration::from_secs(settings.job_retention_secs),
            sweep_interval: Duration::from_secs(settings.job_sweep_interval_secs),
            max_completed: settings.max_completed_jobs,
        },
    );
    for handle in scheduler.spawn_background(&shutdown) {
        background.push(("scheduler", handle));
    }
    if let Some(handle) = journal_handle {
        background.push(("journal", handle));
    }

    // ── Application context ──────────────────────────────────────────────
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
        generator: Arc::new(DataGenerator::new(args.seed)),
        health,
    });

    let app = create_app(ctx);
    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("binding {bind_address}"))?;
    info!("HeatGuard listening on {bind_address}");

    let server_shutdown = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            wait_for_shutdown_signal().await;
            server_shutdown.cancel();
        })
        .await
        .context("serving HTTP")?;

    // Drain background tasks in reverse dependency order: the scheduler
    // stops producing records before the journal writer exits.
    shutdown.cancel();
    for (name, handle) in background {
        if let Err(err) = handle.await {
            warn!(task = name, error = %err, "Background task ended abnormally");
        }
    }
    info!("HeatGuard stopped");
    Ok(())
}

async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        if tokio::signal::ctrl_c().await.is_err() {
            warn!("Failed to listen for ctrl-c; shutting down on task end only");
        }
    };

    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(sigterm) => sigterm,
            Err(_) => {
                ctrl_c.await;
                return;
            }
        };
        tokio::select! {
            () = ctrl_c => {}
            _ = sigterm.recv() => {}
        }
    }

    #[cfg(not(unix))]
    ctrl_c.await;
}
