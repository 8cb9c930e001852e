//! Scoring service: full-pipeline orchestration for one or many samples.
//!
//! Single path: validate → preprocess → infer → score → journal (async).
//! Multi path: one validation pass, then bounded-parallel scoring on a
//! semaphore sized to the configured concurrency. Results keep input order;
//! a per-item failure (including a panicking worker) becomes an error
//! record at the same index and never fails the batch. Per-request
//! deadlines abort at pipeline checkpoints.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use serde::Deserialize;
use statrs::statistics::{Data, Distribution, Max, Min, OrderStatistics};
use tokio::sync::Semaphore;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::compliance::ComplianceJournal;
use crate::config::model_config::risk_thresholds;
use crate::error::{ServiceError, ServiceResult};
use crate::model::ModelHost;
use crate::preprocessing::Preprocessor;
use crate::scoring::Scorer;
use crate::types::{
    BatchItem, BatchItemError, BatchResponse, BatchStatistics, PredictionResult, PreparedSample,
    RawSample, ValidatedSample,
};
use crate::validation::Validator;

/// Default artifact name used by the request path.
pub const DEFAULT_MODEL: &str = "default";

/// Options for a scoring request.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ScoreOptions {
    #[serde(default = "default_true")]
    pub use_conservative: bool,
    #[serde(default = "default_true")]
    pub log_compliance: bool,
    /// Multi-sample requests only: dispatch items to the worker pool.
    #[serde(default = "default_true")]
    pub parallel: bool,
}

fn default_true() -> bool {
    true
}

impl Default for ScoreOptions {
    fn default() -> Self {
        Self { use_conservative: true, log_compliance: true, parallel: true }
    }
}

/// Per-request context threaded through the pipeline stages.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: String,
    /// Absolute deadline; checked at pipeline checkpoints.
    pub deadline: Option<Instant>,
    /// Hash of the admitted credential, for audit correlation.
    pub credential_hash: Option<String>,
}

impl RequestContext {
    pub fn new(prefix: &str, timeout: Option<Duration>, credential_hash: Option<String>) -> Self {
        Self {
            request_id: format!("{prefix}_{}", Uuid::new_v4().simple()),
            deadline: timeout.map(|t| Instant::now() + t),
            credential_hash,
        }
    }

    /// Deadline checkpoint: errors once the request is out of time.
    fn checkpoint(&self, started: Instant) -> ServiceResult<()> {
        match self.deadline {
            Some(deadline) if Instant::now() > deadline => {
                Err(ServiceError::Timeout(started.elapsed().as_millis() as u64))
            }
            _ => Ok(()),
        }
    }
}

/// Monotone service counters for the health surface.
#[derive(Debug, Default)]
pub struct ServiceCounters {
    pub total_predictions: AtomicU64,
    pub failed_predictions: AtomicU64,
}

/// Orchestrates the scoring pipeline.
pub struct ScoringService {
    validator: Validator,
    preprocessor: Preprocessor,
    scorer: Scorer,
    model_host: Arc<ModelHost>,
    journal: ComplianceJournal,
    worker_pool: Arc<Semaphore>,
    max_concurrency: usize,
    batch_size_limit: usize,
    prediction_timeout: Duration,
    counters: Arc<ServiceCounters>,
}

impl ScoringService {
    pub fn new(
        scorer: Scorer,
        preprocessor: Preprocessor,
        model_host: Arc<ModelHost>,
        journal: ComplianceJournal,
        max_concurrency: usize,
        batch_size_limit: usize,
        prediction_timeout: Duration,
    ) -> Self {
        let max_concurrency = max_concurrency.max(1);
        Self {
            validator: Validator::new(),
            preprocessor,
            scorer,
            model_host,
            journal,
            worker_pool: Arc::new(Semaphore::new(max_concurrency)),
            max_concurrency,
            batch_size_limit,
            prediction_timeout,
            counters: Arc::new(ServiceCounters::default()),
        }
    }

    pub fn counters(&self) -> Arc<ServiceCounters> {
        Arc::clone(&self.counters)
    }

    pub fn default_timeout(&self) -> Duration {
        self.prediction_timeout
    }

    /// Bound of the worker pool.
    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    /// Validator summary for the health surface.
    pub fn validation_summary(&self) -> serde_json::Value {
        self.validator.summary(self.batch_size_limit)
    }

    /// Validate a batch against an explicit size bound (scheduler path,
    /// which carries its own async cap).
    pub fn validate_batch(
        &self,
        raw: &[RawSample],
        max_size: usize,
    ) -> ServiceResult<crate::validation::BatchValidation> {
        self.validator.validate_batch(raw, max_size)
    }

    /// Score one raw sample through the full pipeline.
    pub async fn predict_single(
        &self,
        ctx: &RequestContext,
        raw: &RawSample,
        options: ScoreOptions,
    ) -> ServiceResult<PredictionResult> {
        let started = Instant::now();

        let validated = self.validator.validate_single(raw)?;
        ctx.checkpoint(started)?;

        let prepared = self.preprocessor.prepare(&validated);
        ctx.checkpoint(started)?;

        let mut result = self.infer_and_score(ctx, &prepared, options.use_conservative)?;
        ctx.checkpoint(started)?;

        result.processing_time_ms = started.elapsed().as_secs_f64() * 1000.0;
        self.counters.total_predictions.fetch_add(1, Ordering::Relaxed);

        if options.log_compliance {
            self.journal.log_assessment(&result);
        }

        info!(
            request_id = %ctx.request_id,
            worker_id = %result.worker_id,
            risk_level = %result.risk_level,
            risk_score = result.risk_score,
            "Prediction completed"
        );
        Ok(result)
    }

    /// Score a batch of raw samples, preserving input order.
    pub async fn predict_many(
        &self,
        ctx: &RequestContext,
        raw: &[RawSample],
        options: ScoreOptions,
    ) -> ServiceResult<BatchResponse> {
        let started = Instant::now();
        let batch_size = raw.len();

        let validation = self.validator.validate_batch(raw, self.batch_size_limit)?;
        let warnings = validation.warnings.clone();
        let prepared = self.preprocessor.prepare_batch(&validation.valid);

        let mut slots: Vec<Option<BatchItem>> = vec![None; batch_size];
        for (index, reason) in &validation.failures {
            slots[*index] = Some(item_error(*index, "unknown", reason));
        }

        let scored = if options.parallel && prepared.len() > 1 {
            self.score_indexed_parallel(ctx, prepared, options.use_conservative).await
        } else {
            self.score_indexed_sequential(ctx, &prepared, options.use_conservative)
        };
        for (index, item) in scored {
            if index < slots.len() {
                slots[index] = Some(item);
            }
        }

        let predictions: Vec<BatchItem> = slots
            .into_iter()
            .enumerate()
            .map(|(index, slot)| {
                slot.unwrap_or_else(|| item_error(index, "unknown", "item was not processed"))
            })
            .collect();

        let successful = predictions.iter().filter(|p| p.is_ok()).count();
        let failed = batch_size - successful;
        self.counters.total_predictions.fetch_add(successful as u64, Ordering::Relaxed);
        self.counters.failed_predictions.fetch_add(failed as u64, Ordering::Relaxed);

        if options.log_compliance {
            self.journal.log_batch(&ctx.request_id, &predictions);
        }

        let response = BatchResponse {
            request_id: ctx.request_id.clone(),
            timestamp: Utc::now(),
            batch_size,
            successful_predictions: successful,
            failed_predictions: failed,
            processing_time_ms: started.elapsed().as_secs_f64() * 1000.0,
            validation_warnings: warnings,
            batch_statistics: batch_statistics(&predictions),
            predictions,
        };

        info!(
            request_id = %ctx.request_id,
            batch_size,
            successful,
            failed,
            "Batch prediction completed"
        );
        Ok(response)
    }

    /// Score already-validated samples (scheduler chunk path), returning
    /// items in the chunk's order with original batch indices attached.
    pub async fn score_validated_chunk(
        &self,
        ctx: &RequestContext,
        chunk: &[(usize, ValidatedSample)],
        use_conservative: bool,
        log_compliance: bool,
    ) -> Vec<BatchItem> {
        let prepared = self.preprocessor.prepare_batch(chunk);
        let items: Vec<BatchItem> = self
            .score_indexed_parallel(ctx, prepared, use_conservative)
            .await
            .into_iter()
            .map(|(_, item)| item)
            .collect();

        if log_compliance {
            self.journal.log_batch(&ctx.request_id, &items);
        }
        items
    }

    fn infer_and_score(
        &self,
        ctx: &RequestContext,
        prepared: &PreparedSample,
        use_conservative: bool,
    ) -> ServiceResult<PredictionResult> {
        let model = self.model_host.model(DEFAULT_MODEL)?;
        let inference = model.predict(&prepared.vector)?;
        Ok(self.scorer.assess(
            &ctx.request_id,
            prepared,
            &inference,
            model.classes(),
            use_conservative,
        ))
    }

    /// Fan samples out to the worker pool; returns `(original index, item)`
    /// pairs in submission order. Worker panics and per-item timeouts are
    /// converted to error records.
    async fn score_indexed_parallel(
        &self,
        ctx: &RequestContext,
        samples: Vec<(usize, PreparedSample)>,
        use_conservative: bool,
    ) -> Vec<(usize, BatchItem)> {
        let mut handles = Vec::with_capacity(samples.len());
        for (index, sample) in samples {
            let worker_id = sample.worker_id.clone();
            let pool = Arc::clone(&self.worker_pool);
            let model_host = Arc::clone(&self.model_host);
            let scorer = self.scorer.clone();
            let request_id = ctx.request_id.clone();
            let timeout = self.prediction_timeout;

            let handle = tokio::spawn(async move {
                let work = async {
                    let _permit = pool
                        .acquire()
                        .await
                        .map_err(|_| ServiceError::Internal("worker pool closed".into()))?;
                    let model = model_host.model(DEFAULT_MODEL)?;
                    let inference = model.predict(&sample.vector)?;
                    let mut result = scorer.assess(
                        &request_id,
                        &sample,
                        &inference,
                        model.classes(),
                        use_conservative,
                    );
                    result.batch_index = Some(index);
                    Ok::<PredictionResult, ServiceError>(result)
                };
                match tokio::time::timeout(timeout, work).await {
                    Ok(outcome) => outcome,
                    Err(_) => Err(ServiceError::Timeout(timeout.as_millis() as u64)),
                }
            });
            handles.push((index, worker_id, handle));
        }

        futures::future::join_all(handles.into_iter().map(|(index, worker_id, handle)| {
            async move {
                let item = match handle.await {
                    Ok(Ok(result)) => BatchItem::Ok(Box::new(result)),
                    Ok(Err(err)) => {
                        warn!(batch_index = index, error = %err, "Batch item failed");
                        item_error(index, &worker_id, &err.to_string())
                    }
                    Err(join_err) => {
                        // A panicking worker is isolated to its own slot.
                        error!(batch_index = index, error = %join_err, "Batch worker panicked");
                        item_error(index, &worker_id, "internal worker failure")
                    }
                };
                (index, item)
            }
        }))
        .await
    }

    fn score_indexed_sequential(
        &self,
        ctx: &RequestContext,
        samples: &[(usize, PreparedSample)],
        use_conservative: bool,
    ) -> Vec<(usize, BatchItem)> {
        samples
            .iter()
            .map(|(index, sample)| {
                let item = match self.infer_and_score(ctx, sample, use_conservative) {
                    Ok(mut result) => {
                        result.batch_index = Some(*index);
                        BatchItem::Ok(Box::new(result))
                    }
                    Err(err) => item_error(*index, &sample.worker_id, &err.to_string()),
                };
                (*index, item)
            })
            .collect()
    }
}

fn item_error(index: usize, worker_id: &str, reason: &str) -> BatchItem {
    BatchItem::Err(BatchItemError {
        batch_index: index,
        worker_id: worker_id.to_string(),
        error: reason.to_string(),
        timestamp: Utc::now(),
        prediction_successful: false,
    })
}

/// Summary statistics over the successful slice of a batch.
pub fn batch_statistics(items: &[BatchItem]) -> BatchStatistics {
    let successful: Vec<&PredictionResult> = items.iter().filter_map(BatchItem::as_ok).collect();
    if successful.is_empty() {
        return BatchStatistics::default();
    }

    let scores: Vec<f64> = successful.iter().map(|r| r.risk_score).collect();
    let mut data = Data::new(scores);
    let mut distribution = std::collections::HashMap::new();
    for result in &successful {
        *distribution.entry(result.risk_level.to_string()).or_insert(0) += 1;
    }

    BatchStatistics {
        average_risk_score: data.mean().unwrap_or(0.0),
        median_risk_score: data.median(),
        max_risk_score: data.max(),
        min_risk_score: data.min(),
        risk_level_distribution: distribution,
        high_risk_count: successful
            .iter()
            .filter(|r| r.risk_score > risk_thresholds::WARNING)
            .count(),
        requires_attention_count: successful
            .iter()
            .filter(|r| r.requires_immediate_attention)
            .count(),
    }
}
