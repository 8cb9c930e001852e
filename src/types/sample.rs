//! Worker telemetry records as they move through the pipeline.

use std::collections::{HashMap, HashSet};

/// A raw, loosely-typed worker sample as submitted over the wire: feature
/// names mapped to arbitrary JSON values, plus an optional `worker_id`.
pub type RawSample = serde_json::Map<String, serde_json::Value>;

/// A sample that has passed validation: every schema feature resolved to a
/// finite numeric value, identifiers sanitized, warnings collected.
#[derive(Debug, Clone)]
pub struct ValidatedSample {
    /// Sanitized worker identifier (auto-generated when absent).
    pub worker_id: String,
    /// Feature values keyed by canonical schema name.
    pub values: HashMap<&'static str, f64>,
    /// Features that were filled from schema defaults rather than supplied.
    pub defaulted: HashSet<&'static str>,
    /// Non-fatal findings (clamps, defaults, unusual vitals).
    pub warnings: Vec<String>,
}

impl ValidatedSample {
    /// Value of a feature, falling back to 0.0 for names outside the schema.
    pub fn get(&self, name: &str) -> f64 {
        self.values.get(name).copied().unwrap_or(0.0)
    }

    /// Whether the feature was supplied by the caller (not defaulted).
    pub fn supplied(&self, name: &str) -> bool {
        self.values.contains_key(name) && !self.defaulted.contains(name)
    }
}

/// A fully preprocessed sample ready for model inference.
#[derive(Debug, Clone)]
pub struct PreparedSample {
    pub worker_id: String,
    /// Feature vector in canonical schema order, normalized when scaling is
    /// enabled.
    pub vector: Vec<f64>,
    /// Raw (pre-normalization) environmental echo for the response.
    pub temperature_c: f64,
    pub humidity_pct: f64,
    /// Raw physiological echo for compliance records.
    pub mean_hr: f64,
    pub rmssd: f64,
    /// Derived indicators, computed best-effort when their inputs are
    /// present.
    pub heat_stress_factor: f64,
    pub age_risk_factor: f64,
    pub stress_indicator: Option<f64>,
    /// Count of features the caller actually supplied (non-defaulted,
    /// non-zero) — drives the data-quality score.
    pub supplied_count: usize,
    /// Whether every required feature was supplied.
    pub has_all_required: bool,
    /// Warnings carried over from validation.
    pub warnings: Vec<String>,
}
