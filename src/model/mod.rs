//! Model hosting: artifact loading, caching, and thread-safe inference.
//!
//! The scoring path is indifferent to the inference implementation — it only
//! needs ordered class probabilities for a schema-ordered feature vector.
//! Two implementations ship:
//!
//! - [`SoftmaxModel`]: the production artifact, a linear softmax classifier
//!   loaded from `model.json` in the model directory.
//! - [`HeuristicModel`]: a deterministic physiology-calibrated fallback used
//!   for tests and `--synthetic-model` bootstrap.
//!
//! [`ModelHost`] caches loaded artifacts by name with a per-artifact TTL and
//! LRU eviction at a soft capacity. `predict` never holds the cache lock
//! during inference.

mod artifact;
mod heuristic;

pub use artifact::SoftmaxModel;
pub use heuristic::HeuristicModel;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{ServiceError, ServiceResult};

/// Output of one inference call.
#[derive(Debug, Clone)]
pub struct Inference {
    /// Index of the most probable class.
    pub class_index: usize,
    /// Probability per class, in the artifact's class order. Sums to 1.
    pub probabilities: Vec<f64>,
}

/// Contract every inference backend satisfies. Implementations must be safe
/// to call concurrently and must not mutate themselves on `predict`.
pub trait InferenceModel: Send + Sync {
    /// Class probabilities for a schema-ordered feature vector.
    fn predict(&self, vector: &[f64]) -> ServiceResult<Inference>;

    /// Ordered class labels, most comfortable first.
    fn classes(&self) -> &[String];

    /// Expected feature vector width.
    fn feature_count(&self) -> usize;

    /// Implementation tag for info/health surfaces.
    fn kind(&self) -> &'static str;
}

/// Where a cached artifact came from; disk artifacts reload after TTL,
/// injected ones never expire.
#[derive(PartialEq, Eq)]
enum ModelSource {
    Disk,
    Injected,
}

struct CachedModel {
    model: Arc<dyn InferenceModel>,
    source: ModelSource,
    loaded_at: Instant,
    loaded_at_utc: DateTime<Utc>,
    last_access: Instant,
}

/// Metadata describing a loaded artifact.
#[derive(Debug, Clone, Serialize)]
pub struct ModelInfo {
    pub name: String,
    pub kind: &'static str,
    pub feature_count: usize,
    pub classes: Vec<String>,
    pub loaded_at: DateTime<Utc>,
}

/// Health report for the model host.
#[derive(Debug, Clone, Serialize)]
pub struct ModelHostHealth {
    pub loaded_models: usize,
    pub default_loaded: bool,
    pub capacity: usize,
}

/// Default per-artifact TTL before a disk artifact is reloaded.
const DEFAULT_TTL: Duration = Duration::from_secs(24 * 3600);

/// Thread-safe cache of named inference artifacts.
pub struct ModelHost {
    model_dir: PathBuf,
    capacity: usize,
    ttl: Duration,
    cache: Mutex<HashMap<String, CachedModel>>,
}

impl ModelHost {
    /// Host loading artifacts from `model_dir`, keeping at most `capacity`
    /// cached.
    pub fn new(model_dir: impl Into<PathBuf>, capacity: usize) -> Self {
        Self {
            model_dir: model_dir.into(),
            capacity: capacity.max(1),
            ttl: DEFAULT_TTL,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Override the reload TTL (tests).
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    fn artifact_path(&self, name: &str) -> PathBuf {
        if name == "default" {
            self.model_dir.clone()
        } else {
            self.model_dir.join(name)
        }
    }

    fn lock_cache(&self) -> ServiceResult<std::sync::MutexGuard<'_, HashMap<String, CachedModel>>> {
        self.cache
            .lock()
            .map_err(|_| ServiceError::Internal("model cache lock poisoned".into()))
    }

    /// Load an artifact by name, caching it. Idempotent: a fresh cached
    /// artifact is returned without touching disk.
    pub fn load(&self, name: &str) -> ServiceResult<Arc<dyn InferenceModel>> {
        let path = self.artifact_path(name);
        let mut cache = self.lock_cache()?;

        if let Some(entry) = cache.get_mut(name) {
            let expired =
                entry.source == ModelSource::Disk && entry.loaded_at.elapsed() > self.ttl;
            if !expired {
                entry.last_access = Instant::now();
                return Ok(Arc::clone(&entry.model));
            }
            debug!(model = name, "Cached artifact expired, reloading");
        }

        let model: Arc<dyn InferenceModel> = Arc::new(SoftmaxModel::load(&path)?);
        info!(
            model = name,
            path = %path.display(),
            classes = model.classes().len(),
            "Loaded model artifact"
        );
        let now = Instant::now();
        cache.insert(
            name.to_string(),
            CachedModel {
                model: Arc::clone(&model),
                source: ModelSource::Disk,
                loaded_at: now,
                loaded_at_utc: Utc::now(),
                last_access: now,
            },
        );
        Self::evict_over_capacity(&mut cache, self.capacity);
        Ok(model)
    }

    /// Install an already-constructed model under a name (synthetic
    /// bootstrap, tests). Injected models never TTL-expire.
    pub fn insert(&self, name: &str, model: Arc<dyn InferenceModel>) {
        let now = Instant::now();
        match self.lock_cache() {
            Ok(mut cache) => {
                cache.insert(
                    name.to_string(),
                    CachedModel {
                        model,
                        source: ModelSource::Injected,
                        loaded_at: now,
                        loaded_at_utc: Utc::now(),
                        last_access: now,
                    },
                );
                Self::evict_over_capacity(&mut cache, self.capacity);
            }
            Err(err) => warn!(error = %err, "Failed to insert model into poisoned cache"),
        }
    }

    /// Handle to a named artifact, loading it if necessary. Callers run
    /// inference without holding the cache lock.
    pub fn model(&self, name: &str) -> ServiceResult<Arc<dyn InferenceModel>> {
        self.get_or_load(name)
    }

    /// Run inference against a named artifact, loading it if necessary.
    pub fn predict(&self, name: &str, vector: &[f64]) -> ServiceResult<Inference> {
        let model = self.get_or_load(name)?;
        if vector.len() != model.feature_count() {
            return Err(ServiceError::Internal(format!(
                "feature vector width {} does not match model width {}",
                vector.len(),
                model.feature_count()
            )));
        }
        model.predict(vector)
    }

    fn get_or_load(&self, name: &str) -> ServiceResult<Arc<dyn InferenceModel>> {
        {
            let mut cache = self.lock_cache()?;
            if let Some(entry) = cache.get_mut(name) {
                let expired = entry.source == ModelSource::Disk
                    && entry.loaded_at.elapsed() > self.ttl;
                if !expired {
                    entry.last_access = Instant::now();
                    return Ok(Arc::clone(&entry.model));
                }
            }
        }
        self.load(name)
    }

    /// Whether a usable artifact is cached under `name`.
    pub fn is_loaded(&self, name: &str) -> bool {
        self.lock_cache().map(|cache| cache.contains_key(name)).unwrap_or(false)
    }

    /// Metadata for a cached artifact.
    pub fn info(&self, name: &str) -> ServiceResult<ModelInfo> {
        let cache = self.lock_cache()?;
        let entry = cache
            .get(name)
            .ok_or_else(|| ServiceError::ModelUnavailable(format!("model '{name}' not loaded")))?;
        Ok(ModelInfo {
            name: name.to_string(),
            kind: entry.model.kind(),
            feature_count: entry.model.feature_count(),
            classes: entry.model.classes().to_vec(),
            loaded_at: entry.loaded_at_utc,
        })
    }

    /// Aggregate host health.
    pub fn health(&self) -> ModelHostHealth {
        let (loaded, default_loaded) = self
            .lock_cache()
            .map(|cache| (cache.len(), cache.contains_key("default")))
            .unwrap_or((0, false));
        ModelHostHealth { loaded_models: loaded, default_loaded, capacity: self.capacity }
    }

    /// Drop all cached artifacts.
    pub fn clear(&self) {
        if let Ok(mut cache) = self.lock_cache() {
            cache.clear();
        }
    }

    fn evict_over_capacity(cache: &mut HashMap<String, CachedModel>, capacity: usize) {
        while cache.len() > capacity {
            let oldest = cache
                .iter()
                .min_by_key(|(_, entry)| entry.last_access)
                .map(|(name, _)| name.clone());
            match oldest {
                Some(name) => {
                    debug!(model = %name, "Evicting least-recently-used artifact");
                    cache.remove(&name);
                }
                None => break,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_and_predict_roundtrip() {
        let host = ModelHost::new("/nonexistent", 10);
        host.insert("default", Arc::new(HeuristicModel::new()));
        assert!(host.is_loaded("default"));

        let vector = vec![0.5; crate::schema::FEATURE_COUNT];
        let inference = host.predict("default", &vector).expect("predict");
        assert_eq!(inference.probabilities.len(), 4);
        let total: f64 = inference.probabilities.iter().sum();
        assert!((total - 1.0).abs() < 1e-9);
    }

    #[test]
    fn missing_artifact_fails_with_model_unavailable() {
        let host = ModelHost::new("/nonexistent", 10);
        let vector = vec![0.5; crate::schema::FEATURE_COUNT];
        let err = host.predict("default", &vector).expect_err("must fail");
        assert_eq!(err.kind(), "model_unavailable");
    }

    #[test]
    fn wrong_vector_width_is_internal_error() {
        let host = ModelHost::new("/nonexistent", 10);
        host.insert("default", Arc::new(HeuristicModel::new()));
        let err = host.predict("default", &[0.5; 3]).expect_err("must fail");
        assert_eq!(err.kind(), "internal");
    }

    #[test]
    fn lru_eviction_respects_capacity() {
        let host = ModelHost::new("/nonexistent", 2);
        host.insert("a", Arc::new(HeuristicModel::new()));
        host.insert("b", Arc::new(HeuristicModel::new()));
        // Touch "a" so "b" becomes the eviction candidate.
        let vector = vec![0.5; crate::schema::FEATURE_COUNT];
        host.predict("a", &vector).expect("predict");
        host.insert("c", Arc::new(HeuristicModel::new()));
        assert!(host.is_loaded("a"));
        assert!(host.is_loaded("c"));
        assert!(!host.is_loaded("b"));
    }

    #[test]
    fn info_reports_classes() {
        let host = ModelHost::new("/nonexistent", 10);
        host.insert("default", Arc::new(HeuristicModel::new()));
        let info = host.info("default").expect("info");
        assert_eq!(info.feature_count, crate::schema::FEATURE_COUNT);
        assert_eq!(info.classes.len(), 4);
        assert_eq!(info.kind, "thermal_heuristic");
    }

    #[test]
    fn clear_unloads_everything() {
        let host = ModelHost::new("/nonexistent", 10);
        host.insert("default", Arc::new(HeuristicModel::new()));
        host.clear();
        assert!(!host.is_loaded("default"));
        assert!(!host.health().default_loaded);
    }
}
