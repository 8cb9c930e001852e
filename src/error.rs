//! Service error kinds surfaced by the core.
//!
//! Every fallible path in the scoring pipeline, admission layer, and batch
//! scheduler resolves to one of these variants. HTTP status mapping lives at
//! the API edge (`api::envelope`), not here.

use thiserror::Error;

/// Errors surfaced by the HeatGuard core.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Missing, invalid, expired, or deactivated credential.
    #[error("unauthenticated: {0}")]
    Unauthenticated(String),

    /// Credential is valid but lacks the demanded permission.
    #[error("forbidden: permission '{0}' required")]
    Forbidden(String),

    /// Per-credential token bucket is exhausted.
    #[error("rate limit exceeded: limit {limit}/min, retry after {reset_epoch_secs}")]
    RateLimited {
        limit: u32,
        /// Unix timestamp at which the window frees up.
        reset_epoch_secs: i64,
    },

    /// Required field missing or uncoercible, or batch size out of bounds.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Unknown batch job id.
    #[error("not found: {0}")]
    NotFound(String),

    /// Operation conflicts with current state (e.g. cancelling a terminal job).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Scheduler queue is beyond its high-water mark.
    #[error("scheduler busy: {0}")]
    Busy(String),

    /// Default model artifact is not loaded.
    #[error("model unavailable: {0}")]
    ModelUnavailable(String),

    /// Per-request deadline elapsed mid-pipeline.
    #[error("prediction timed out after {0} ms")]
    Timeout(u64),

    /// Unclassified internal failure.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    /// Machine-readable kind tag used in error response bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Unauthenticated(_) => "unauthenticated",
            Self::Forbidden(_) => "forbidden",
            Self::RateLimited { .. } => "rate_limited",
            Self::Validation(_) => "validation_error",
            Self::NotFound(_) => "not_found",
            Self::Conflict(_) => "conflict",
            Self::Busy(_) => "busy",
            Self::ModelUnavailable(_) => "model_unavailable",
            Self::Timeout(_) => "timeout",
            Self::Internal(_) => "internal",
        }
    }
}

/// Convenience alias used throughout the core.
pub type ServiceResult<T> = Result<T, ServiceError>;
