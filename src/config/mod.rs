//! Runtime configuration.
//!
//! Settings load from environment variables with CLI overrides applied by
//! `main`. Three environment profiles (development, production, testing)
//! select defaults for debug surfaces, demo credentials, and worker counts.
//!
//! Recognized keys are listed on [`Settings::from_env`].

pub mod model_config;

use anyhow::bail;
use tracing::warn;

/// Default secret key shipped for development. Production refuses to start
/// with this value.
const DEV_SECRET_KEY: &str = "heatguard-secret-key-change-in-production";

/// Deployment environment profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
    Testing,
}

impl Environment {
    fn parse(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            "testing" | "test" => Self::Testing,
            _ => Self::Development,
        }
    }

    /// Demo credentials are only installed outside production.
    pub fn installs_demo_credentials(self) -> bool {
        !matches!(self, Self::Production)
    }
}

/// Application settings.
#[derive(Debug, Clone)]
pub struct Settings {
    /// HTTP bind host.
    pub host: String,
    /// HTTP bind port.
    pub port: u16,
    /// Deployment profile.
    pub environment: Environment,
    /// Reserved for signed-token support.
    pub secret_key: String,
    /// Header name carrying the API credential.
    pub api_key_header: String,
    /// Fallback per-minute rate limit when a credential record omits one.
    pub rate_limit_per_minute: u32,
    /// Synchronous batch size cap.
    pub batch_size_limit: usize,
    /// Async batch size cap.
    pub async_batch_size_limit: usize,
    /// Worker-pool bound for parallel scoring.
    pub max_concurrent_predictions: usize,
    /// Per-item prediction deadline in seconds.
    pub prediction_timeout_secs: u64,
    /// Directory holding model artifacts.
    pub model_dir: String,
    /// Soft capacity of the model host cache.
    pub model_cache_size: usize,
    /// Default conservative bias added to risk scores.
    pub conservative_bias: f64,
    /// Whether min–max feature scaling is applied.
    pub enable_scaling: bool,
    /// Whether the compliance journal is enabled.
    pub enable_osha_logging: bool,
    /// Compliance journal file path.
    pub osha_log_file: String,
    /// Journal rotation threshold in bytes.
    pub osha_log_max_bytes: u64,
    /// Rotated journal generations retained.
    pub osha_log_generations: usize,
    /// Heat-index warning threshold (°F).
    pub heat_index_threshold_warning: f64,
    /// Heat-index danger threshold (°F).
    pub heat_index_threshold_danger: f64,
    /// Optional shared-store URL enabling distributed rate limiting.
    pub shared_store_url: Option<String>,
    /// Optional TOML file with credential records.
    pub api_keys_file: Option<String>,
    /// Scheduler: default chunk size for async batches.
    pub batch_chunk_size: usize,
    /// Scheduler: completed-job retention TTL in seconds.
    pub job_retention_secs: u64,
    /// Scheduler: sweeper interval in seconds.
    pub job_sweep_interval_secs: u64,
    /// Scheduler: completed-set capacity bound.
    pub max_completed_jobs: usize,
    /// Scheduler: pending-queue high-water mark.
    pub scheduler_queue_limit: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            environment: Environment::Development,
            secret_key: DEV_SECRET_KEY.to_string(),
            api_key_header: "X-API-Key".to_string(),
            rate_limit_per_minute: 100,
            batch_size_limit: 1000,
            async_batch_size_limit: 10_000,
            max_concurrent_predictions: 100,
            prediction_timeout_secs: 30,
            model_dir: "thermal_comfort_model".to_string(),
            model_cache_size: 10,
            conservative_bias: 0.15,
            enable_scaling: true,
            enable_osha_logging: true,
            osha_log_file: "logs/osha_compliance.log".to_string(),
            osha_log_max_bytes: 50 * 1024 * 1024,
            osha_log_generations: 5,
            heat_index_threshold_warning: 80.0,
            heat_index_threshold_danger: 90.0,
            shared_store_url: None,
            api_keys_file: None,
            batch_chunk_size: 100,
            job_retention_secs: 24 * 3600,
            job_sweep_interval_secs: 3600,
            max_completed_jobs: 100,
            scheduler_queue_limit: 100,
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, target: &mut T) {
    if let Ok(raw) = std::env::var(key) {
        match raw.parse() {
            Ok(v) => *target = v,
            Err(_) => warn!(key, value = %raw, "Unparseable environment override, keeping default"),
        }
    }
}

impl Settings {
    /// Load settings from environment variables.
    ///
    /// Recognized keys: `HOST`, `PORT`, `ENVIRONMENT`, `SECRET_KEY`,
    /// `API_KEY_HEADER`, `RATE_LIMIT_PER_MINUTE`, `BATCH_SIZE_LIMIT`,
    /// `ASYNC_BATCH_SIZE_LIMIT`, `MAX_CONCURRENT_PREDICTIONS`,
    /// `PREDICTION_TIMEOUT`, `MODEL_DIR`, `MODEL_CACHE_SIZE`,
    /// `CONSERVATIVE_BIAS`, `ENABLE_OSHA_LOGGING`, `OSHA_LOG_FILE`,
    /// `OSHA_LOG_MAX_BYTES`, `HEAT_INDEX_THRESHOLD_WARNING`,
    /// `HEAT_INDEX_THRESHOLD_DANGER`, `REDIS_URL`, `HEATGUARD_API_KEYS`,
    /// `BATCH_CHUNK_SIZE`, `JOB_RETENTION_SECS`, `JOB_SWEEP_INTERVAL_SECS`,
    /// `MAX_COMPLETED_JOBS`.
    ///
    /// Fails when the production profile is combined with the development
    /// secret key.
    pub fn from_env() -> anyhow::Result<Self> {
        let mut settings = Self::default();

        if let Ok(env) = std::env::var("ENVIRONMENT") {
            settings.environment = Environment::parse(&env);
        }

        if let Ok(host) = std::env::var("HOST") {
            settings.host = host;
        }
        env_parse("PORT", &mut settings.port);

        if let Ok(key) = std::env::var("SECRET_KEY") {
            settings.secret_key = key;
        }
        if settings.secret_key == DEV_SECRET_KEY {
            if settings.environment == Environment::Production {
                bail!(
                    "SECRET_KEY is still the development default. \
                     Set SECRET_KEY before starting in production."
                );
            }
            warn!("Using default secret key — do NOT use in production");
        }

        if let Ok(header) = std::env::var("API_KEY_HEADER") {
            settings.api_key_header = header;
        }
        env_parse("RATE_LIMIT_PER_MINUTE", &mut settings.rate_limit_per_minute);
        env_parse("BATCH_SIZE_LIMIT", &mut settings.batch_size_limit);
        env_parse("ASYNC_BATCH_SIZE_LIMIT", &mut settings.async_batch_size_limit);
        env_parse("MAX_CONCURRENT_PREDICTIONS", &mut settings.max_concurrent_predictions);
        env_parse("PREDICTION_TIMEOUT", &mut settings.prediction_timeout_secs);

        if let Ok(dir) = std::env::var("MODEL_DIR") {
            settings.model_dir = dir;
        }
        env_parse("MODEL_CACHE_SIZE", &mut settings.model_cache_size);
        env_parse("CONSERVATIVE_BIAS", &mut settings.conservative_bias);
        env_parse("ENABLE_OSHA_LOGGING", &mut settings.enable_osha_logging);

        if let Ok(path) = std::env::var("OSHA_LOG_FILE") {
            settings.osha_log_file = path;
        }
        env_parse("OSHA_LOG_MAX_BYTES", &mut settings.osha_log_max_bytes);
        env_parse("HEAT_INDEX_THRESHOLD_WARNING", &mut settings.heat_index_threshold_warning);
        env_parse("HEAT_INDEX_THRESHOLD_DANGER", &mut settings.heat_index_threshold_danger);

        settings.shared_store_url = std::env::var("REDIS_URL").ok().filter(|s| !s.is_empty());
        settings.api_keys_file =
            std::env::var("HEATGUARD_API_KEYS").ok().filter(|s| !s.is_empty());

        env_parse("BATCH_CHUNK_SIZE", &mut settings.batch_chunk_size);
        env_parse("JOB_RETENTION_SECS", &mut settings.job_retention_secs);
        env_parse("JOB_SWEEP_INTERVAL_SECS", &mut settings.job_sweep_interval_secs);
        env_parse("MAX_COMPLETED_JOBS", &mut settings.max_completed_jobs);

        Ok(settings)
    }

    /// Bind address for the HTTP server.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_contract() {
        let s = Settings::default();
        assert_eq!(s.port, 8000);
        assert_eq!(s.batch_size_limit, 1000);
        assert_eq!(s.async_batch_size_limit, 10_000);
        assert!((s.conservative_bias - 0.15).abs() < f64::EPSILON);
        assert!((s.heat_index_threshold_danger - 90.0).abs() < f64::EPSILON);
        assert_eq!(s.job_retention_secs, 86_400);
    }

    #[test]
    fn environment_parsing() {
        assert_eq!(Environment::parse("production"), Environment::Production);
        assert_eq!(Environment::parse("TEST"), Environment::Testing);
        assert_eq!(Environment::parse("anything"), Environment::Development);
        assert!(!Environment::Production.installs_demo_credentials());
        assert!(Environment::Testing.installs_demo_credentials());
    }

    #[test]
    fn bind_address_joins_host_and_port() {
        let s = Settings::default();
        assert_eq!(s.bind_address(), "0.0.0.0:8000");
    }
}
