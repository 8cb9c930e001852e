//! Batch scheduler: durable-in-process, priority-aware job manager.
//!
//! Jobs are submitted with a unique id and queued by priority; a dispatcher
//! task drains the queue as job-level capacity frees and spawns one
//! execution task per job. Execution chunks the input, scores each chunk
//! through the scoring service, and updates progress between chunks, where
//! cancellation is also observed. Terminal jobs move from the active map to
//! the completed map and are evicted by a periodic sweeper (retention TTL
//! plus an LRU capacity bound on completion time).
//!
//! Concurrency discipline: one mutex guards both maps and the queue. The
//! executor takes short locks at chunk boundaries to publish progress;
//! status and result queries clone snapshots under the same lock. No two
//! execution tasks ever own the same job.

use std::collections::{BinaryHeap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{Notify, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::error::{ServiceError, ServiceResult};
use crate::service::{RequestContext, ScoringService};
use crate::types::{
    BatchItem, BatchStatistics, JobOptions, JobPriority, JobProgress, JobSnapshot, JobStatus,
    RawSample,
};

/// Scheduler tuning knobs.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Async batch size cap.
    pub max_batch_size: usize,
    /// Pending-queue high-water mark; submissions beyond it are rejected.
    pub queue_limit: usize,
    /// How many jobs execute concurrently.
    pub max_concurrent_jobs: usize,
    /// Completed jobs older than this are evicted.
    pub retention_ttl: Duration,
    /// Sweeper period.
    pub sweep_interval: Duration,
    /// Completed-set capacity bound (LRU by completion time).
    pub max_completed: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_batch_size: 10_000,
            queue_limit: 100,
            max_concurrent_jobs: 4,
            retention_ttl: Duration::from_secs(24 * 3600),
            sweep_interval: Duration::from_secs(3600),
            max_completed: 100,
        }
    }
}

/// Full job record; lives inside the scheduler maps.
struct JobRecord {
    job_id: String,
    status: JobStatus,
    progress: JobProgress,
    options: JobOptions,
    created_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    errors: Vec<String>,
    /// Input samples; taken by the execution task when the job starts.
    input: Vec<RawSample>,
    /// Result slots by input index; filled as chunks finish.
    results: Vec<Option<BatchItem>>,
}

impl JobRecord {
    fn snapshot(&self) -> JobSnapshot {
        JobSnapshot {
            job_id: self.job_id.clone(),
            status: self.status,
            progress: self.progress,
            priority: self.options.priority,
            created_at: self.created_at,
            started_at: self.started_at,
            completed_at: self.completed_at,
            errors: self.errors.clone(),
        }
    }

    /// Filled result slots in input order (complete for terminal jobs,
    /// partial for cancelled ones).
    fn collected_results(&self) -> Vec<BatchItem> {
        self.results.iter().flatten().cloned().collect()
    }
}

/// Terminal results payload.
#[derive(Debug, Clone, Serialize)]
pub struct JobResults {
    #[serde(flatten)]
    pub snapshot: JobSnapshot,
    pub results: Vec<BatchItem>,
    pub statistics: BatchStatistics,
}

/// Queue entry ordered by priority, then FIFO within a priority.
#[derive(PartialEq, Eq)]
struct QueuedJob {
    priority: JobPriority,
    seq: u64,
    job_id: String,
}

impl Ord for QueuedJob {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for QueuedJob {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

struct SchedulerState {
    active: HashMap<String, JobRecord>,
    completed: HashMap<String, JobRecord>,
    queue: BinaryHeap<QueuedJob>,
    next_seq: u64,
}

/// Scheduler counts for the health surface.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct SchedulerCounts {
    pub active: usize,
    pub queued: usize,
    pub completed: usize,
}

/// The batch scheduler. Construct once at bootstrap, share via `Arc`.
pub struct BatchScheduler {
    state: Mutex<SchedulerState>,
    queue_signal: Notify,
    job_capacity: Arc<Semaphore>,
    service: Arc<ScoringService>,
    config: SchedulerConfig,
}

impl BatchScheduler {
    pub fn new(service: Arc<ScoringService>, config: SchedulerConfig) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(SchedulerState {
                active: HashMap::new(),
                completed: HashMap::new(),
                queue: BinaryHeap::new(),
                next_seq: 0,
            }),
            queue_signal: Notify::new(),
            job_capacity: Arc::new(Semaphore::new(config.max_concurrent_jobs.max(1))),
            service,
            config,
        })
    }

    /// Spawn the dispatcher and retention sweeper. Both stop when the token
    /// cancels.
    pub fn spawn_background(
        self: &Arc<Self>,
        shutdown: &CancellationToken,
    ) -> Vec<tokio::task::JoinHandle<()>> {
        let dispatcher = {
            let scheduler = Arc::clone(self);
            let token = shutdown.clone();
            tokio::spawn(async move { scheduler.dispatch_loop(token).await })
        };
        let sweeper = {
            let scheduler = Arc::clone(self);
            let token = shutdown.clone();
            tokio::spawn(async move { scheduler.sweep_loop(token).await })
        };
        vec![dispatcher, sweeper]
    }

    fn lock_state(&self) -> MutexGuard<'_, SchedulerState> {
        // A poisoned scheduler lock is unrecoverable; propagate the panic.
        #[allow(clippy::unwrap_used)]
        self.state.lock().unwrap()
    }

    /// Submit a batch job. Returns the job id immediately; execution starts
    /// when the dispatcher assigns capacity.
    pub fn submit(&self, data: Vec<RawSample>, options: JobOptions) -> ServiceResult<String> {
        if data.is_empty() {
            return Err(ServiceError::Validation("batch input cannot be empty".into()));
        }
        if data.len() > self.config.max_batch_size {
            return Err(ServiceError::Validation(format!(
                "batch size {} exceeds limit of {}",
                data.len(),
                self.config.max_batch_size
            )));
        }

        let job_id = format!("batch_{}", Uuid::new_v4().simple());
        let total = data.len();
        {
            let mut state = self.lock_state();
            if state.queue.len() >= self.config.queue_limit {
                return Err(ServiceError::Busy(format!(
                    "scheduler queue is at capacity ({})",
                    self.config.queue_limit
                )));
            }
            let seq = state.next_seq;
            state.next_seq += 1;
            state.active.insert(
                job_id.clone(),
                JobRecord {
                    job_id: job_id.clone(),
                    status: JobStatus::Pending,
                    progress: JobProgress { total, ..JobProgress::default() },
                    options: options.clone(),
                    created_at: Utc::now(),
                    started_at: None,
                    completed_at: None,
                    errors: Vec::new(),
                    results: vec![None; total],
                    input: data,
                },
            );
            state.queue.push(QueuedJob { priority: options.priority, seq, job_id: job_id.clone() });
        }
        self.queue_signal.notify_one();

        info!(job_id = %job_id, batch_size = total, priority = ?options.priority, "Batch job submitted");
        Ok(job_id)
    }

    /// Progress snapshot for a job.
    pub fn status(&self, job_id: &str) -> ServiceResult<JobSnapshot> {
        let state = self.lock_state();
        state
            .active
            .get(job_id)
            .or_else(|| state.completed.get(job_id))
            .map(JobRecord::snapshot)
            .ok_or_else(|| ServiceError::NotFound(format!("job {job_id}")))
    }

    /// Results for a job: complete for terminal jobs, partial otherwise.
    pub fn results(&self, job_id: &str) -> ServiceResult<JobResults> {
        let state = self.lock_state();
        let record = state
            .active
            .get(job_id)
            .or_else(|| state.completed.get(job_id))
            .ok_or_else(|| ServiceError::NotFound(format!("job {job_id}")))?;
        let results = record.collected_results();
        let statistics = crate::service::batch_statistics(&results);
        Ok(JobResults { snapshot: record.snapshot(), results, statistics })
    }

    /// Cooperatively cancel a job. Pending jobs terminate immediately;
    /// running jobs stop at the next chunk boundary.
    pub fn cancel(&self, job_id: &str) -> ServiceResult<JobSnapshot> {
        let mut state = self.lock_state();
        if state.completed.contains_key(job_id) {
            return Err(ServiceError::Conflict(format!("job {job_id} has already terminated")));
        }
        let Some(record) = state.active.get_mut(job_id) else {
            return Err(ServiceError::NotFound(format!("job {job_id}")));
        };

        match record.status {
            JobStatus::Pending => {
                record.status = JobStatus::Cancelled;
                record.completed_at = Some(Utc::now());
                record.input.clear();
                let snapshot = record.snapshot();
                Self::finalize_locked(&mut state, job_id);
                info!(job_id, "Pending job cancelled");
                Ok(snapshot)
            }
            JobStatus::Running => {
                record.status = JobStatus::Cancelled;
                let snapshot = record.snapshot();
                info!(job_id, "Running job cancelled, stopping at next chunk boundary");
                Ok(snapshot)
            }
            // Terminal but not yet moved by the executor.
            _ => Err(ServiceError::Conflict(format!("job {job_id} has already terminated"))),
        }
    }

    /// Snapshots of all jobs, newest first, optionally filtered by status.
    pub fn list(&self, status_filter: Option<JobStatus>, limit: usize) -> Vec<JobSnapshot> {
        let state = self.lock_state();
        let mut snapshots: Vec<JobSnapshot> = state
            .active
            .values()
            .chain(state.completed.values())
            .filter(|record| status_filter.map_or(true, |s| record.status == s))
            .map(JobRecord::snapshot)
            .collect();
        snapshots.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        snapshots.truncate(limit);
        snapshots
    }

    /// Job counts for the health surface.
    pub fn counts(&self) -> SchedulerCounts {
        let state = self.lock_state();
        SchedulerCounts {
            active: state.active.len(),
            queued: state.queue.len(),
            completed: state.completed.len(),
        }
    }

    // ── Dispatch ─────────────────────────────────────────────────────────

    async fn dispatch_loop(self: Arc<Self>, shutdown: CancellationToken) {
        debug!("Batch dispatcher started");
        loop {
            // Drain everything currently runnable.
            while let Some(job_id) = self.pop_runnable() {
                let permit = tokio::select! {
                    permit = Arc::clone(&self.job_capacity).acquire_owned() => match permit {
                        Ok(permit) => permit,
                        Err(_) => return,
                    },
                    () = shutdown.cancelled() => return,
                };
                let scheduler = Arc::clone(&self);
                tokio::spawn(async move {
                    scheduler.execute_job(&job_id).await;
                    drop(permit);
                });
            }

            tokio::select! {
                () = self.queue_signal.notified() => {}
                () = shutdown.cancelled() => break,
            }
        }
        debug!("Batch dispatcher stopped");
    }

    fn pop_runnable(&self) -> Option<String> {
        let mut state = self.lock_state();
        while let Some(entry) = state.queue.pop() {
            // Skip ids whose job was cancelled while pending.
            if state
                .active
                .get(&entry.job_id)
                .map_or(false, |r| r.status == JobStatus::Pending)
            {
                return Some(entry.job_id);
            }
        }
        None
    }

    // ── Execution ────────────────────────────────────────────────────────

    async fn execute_job(&self, job_id: &str) {
        // Claim the job: Pending → Running, take the input.
        let (input, options) = {
            let mut state = self.lock_state();
            let Some(record) = state.active.get_mut(job_id) else { return };
            if record.status != JobStatus::Pending {
                return;
            }
            record.status = JobStatus::Running;
            record.started_at = Some(Utc::now());
            (std::mem::take(&mut record.input), record.options.clone())
        };

        info!(job_id, total = input.len(), "Batch job started");
        let ctx = RequestContext::new("job", None, None);

        // One validation pass up front; per-item failures become error
        // records immediately, a fully-invalid batch fails the job.
        let validation = match self.service.validate_batch(&input, self.config.max_batch_size) {
            Ok(validation) => validation,
            Err(err) => {
                self.finish_job(job_id, JobStatus::Failed, Some(err.to_string()));
                return;
            }
        };
        drop(input);

        {
            let mut state = self.lock_state();
            if let Some(record) = state.active.get_mut(job_id) {
                for warning in &validation.warnings {
                    record.errors.push(warning.clone());
                }
                for (index, reason) in &validation.failures {
                    record.results[*index] = Some(BatchItem::Err(crate::types::BatchItemError {
                        batch_index: *index,
                        worker_id: "unknown".to_string(),
                        error: reason.clone(),
                        timestamp: Utc::now(),
                        prediction_successful: false,
                    }));
                    record.progress.processed += 1;
                    record.progress.failed += 1;
                }
            }
        }

        // Chunked execution; cancellation observed between chunks.
        let chunk_size = options.effective_chunk_size();
        for chunk in validation.valid.chunks(chunk_size) {
            if self.is_cancelled(job_id) {
                self.finish_job(job_id, JobStatus::Cancelled, None);
                return;
            }

            let items = self
                .service
                .score_validated_chunk(&ctx, chunk, options.use_conservative, options.log_compliance)
                .await;

            let mut state = self.lock_state();
            let Some(record) = state.active.get_mut(job_id) else { return };
            for item in items {
                let (index, ok) = match &item {
                    BatchItem::Ok(p) => (p.batch_index.unwrap_or(0), true),
                    BatchItem::Err(e) => (e.batch_index, false),
                };
                if index < record.results.len() && record.results[index].is_none() {
                    record.results[index] = Some(item);
                    record.progress.processed += 1;
                    if ok {
                        record.progress.succeeded += 1;
                    } else {
                        record.progress.failed += 1;
                    }
                }
            }
        }

        if self.is_cancelled(job_id) {
            self.finish_job(job_id, JobStatus::Cancelled, None);
        } else {
            self.finish_job(job_id, JobStatus::Completed, None);
        }
    }

    fn is_cancelled(&self, job_id: &str) -> bool {
        let state = self.lock_state();
        state
            .active
            .get(job_id)
            .map_or(true, |record| record.status == JobStatus::Cancelled)
    }

    /// Terminal transition: stamp, log, and move active → completed.
    fn finish_job(&self, job_id: &str, status: JobStatus, error: Option<String>) {
        let mut state = self.lock_state();
        let Some(record) = state.active.get_mut(job_id) else { return };

        // A cancel that already marked the record wins over Completed.
        if record.status == JobStatus::Cancelled && status == JobStatus::Completed {
            record.completed_at = Some(Utc::now());
        } else {
            record.status = status;
            record.completed_at = Some(Utc::now());
        }
        if let Some(error) = error {
            record.errors.push(error);
        }

        let final_status = record.status;
        let progress = record.progress;
        Self::finalize_locked(&mut state, job_id);
        match final_status {
            JobStatus::Failed => {
                error!(job_id, processed = progress.processed, "Batch job failed");
            }
            _ => {
                info!(
                    job_id,
                    status = %final_status,
                    processed = progress.processed,
                    succeeded = progress.succeeded,
                    failed = progress.failed,
                    "Batch job finished"
                );
            }
        }
    }

    fn finalize_locked(state: &mut SchedulerState, job_id: &str) {
        if let Some(record) = state.active.remove(job_id) {
            state.completed.insert(job_id.to_string(), record);
        }
    }

    // ── Retention ────────────────────────────────────────────────────────

    async fn sweep_loop(self: Arc<Self>, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval(self.config.sweep_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        // The first tick fires immediately; skip it.
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = ticker.tick() => self.sweep_once(),
                () = shutdown.cancelled() => break,
            }
        }
        debug!("Retention sweeper stopped");
    }

    /// One retention pass: evict completed jobs past the TTL, then trim the
    /// completed set to its capacity bound by completion time.
    pub fn sweep_once(&self) {
        let now = Utc::now();
        let ttl = chrono::Duration::from_std(self.config.retention_ttl)
            .unwrap_or_else(|_| chrono::Duration::hours(24));
        let mut state = self.lock_state();

        let expired: Vec<String> = state
            .completed
            .iter()
            .filter(|(_, record)| {
                record
                    .completed_at
                    .map_or(false, |completed_at| now - completed_at > ttl)
            })
            .map(|(id, _)| id.clone())
            .collect();
        for id in &expired {
            state.completed.remove(id);
        }

        if state.completed.len() > self.config.max_completed {
            let mut by_completion: Vec<(String, DateTime<Utc>)> = state
                .completed
                .iter()
                .map(|(id, record)| (id.clone(), record.completed_at.unwrap_or(record.created_at)))
                .collect();
            by_completion.sort_by_key(|(_, completed_at)| *completed_at);
            let excess = state.completed.len() - self.config.max_completed;
            for (id, _) in by_completion.into_iter().take(excess) {
                state.completed.remove(&id);
            }
        }

        if !expired.is_empty() {
            debug!(evicted = expired.len(), "Swept expired batch jobs");
        }
    }
}
