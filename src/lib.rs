//! HeatGuard: heat-exposure risk scoring for industrial workforces.
//!
//! Wearable-device telemetry comes in over HTTP; a bounded risk score, a
//! discrete risk level, and OSHA-aligned safety recommendations come back,
//! while a tamper-evident compliance journal records every assessment.
//!
//! ## Architecture
//!
//! - **Scoring pipeline**: validation → imputation → feature engineering →
//!   normalization → model inference → score transformation → risk
//!   classification → recommendation synthesis → compliance emission
//! - **Batch scheduler**: priority-aware background jobs with chunked
//!   progress, cooperative cancellation, and TTL-driven retention
//! - **Admission layer**: cached credential validation and per-credential
//!   sliding-window rate limiting with shared-store/in-memory backends
//! - **Compliance journal**: append-only NDJSON audit log with rotation and
//!   a query/report surface

pub mod admission;
pub mod api;
pub mod compliance;
pub mod config;
pub mod error;
pub mod generator;
pub mod health;
pub mod heat_index;
pub mod model;
pub mod preprocessing;
pub mod scheduler;
pub mod schema;
pub mod scoring;
pub mod service;
pub mod types;
pub mod validation;

// Re-export the configuration root
pub use config::Settings;

// Re-export commonly used types
pub use error::{ServiceError, ServiceResult};
pub use types::{
    BatchItem, BatchResponse, JobOptions, JobPriority, JobSnapshot, JobStatus, PredictionResult,
    RawSample, RiskLevel,
};
