//! Scoring output types.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::model_config::risk_thresholds;

/// Discrete heat-exposure risk level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RiskLevel {
    Safe,
    Caution,
    Warning,
    Danger,
}

impl RiskLevel {
    /// Total classification of a [0, 1] risk score by the fixed thresholds.
    pub fn from_score(score: f64) -> Self {
        if score < risk_thresholds::SAFE {
            Self::Safe
        } else if score < risk_thresholds::CAUTION {
            Self::Caution
        } else if score < risk_thresholds::WARNING {
            Self::Warning
        } else {
            Self::Danger
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Safe => write!(f, "Safe"),
            Self::Caution => write!(f, "Caution"),
            Self::Warning => write!(f, "Warning"),
            Self::Danger => write!(f, "Danger"),
        }
    }
}

/// Complete heat-exposure assessment for one worker sample.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionResult {
    pub request_id: String,
    pub worker_id: String,
    pub timestamp: DateTime<Utc>,

    /// Final risk score in [0, 1] (post-bias when conservative mode is on).
    pub risk_score: f64,
    /// Pre-bias risk score in [0, 1].
    pub risk_score_standard: f64,
    pub risk_level: RiskLevel,
    /// Maximum class probability.
    pub confidence: f64,

    // Environmental echo
    pub temperature_c: f64,
    pub temperature_f: f64,
    pub humidity_pct: f64,
    pub heat_index_f: f64,

    pub osha_recommendations: Vec<String>,
    pub requires_immediate_attention: bool,

    pub conservative_bias_applied: bool,
    pub conservative_bias_value: f64,
    pub predicted_class: String,
    pub class_probabilities: HashMap<String, f64>,

    // Biometric echo
    pub heart_rate_avg: f64,
    pub hrv_rmssd: f64,

    pub processing_time_ms: f64,
    /// Fraction of schema features genuinely supplied, with a bonus for
    /// complete required coverage. In [0, 1].
    pub data_quality_score: f64,
    pub validation_warnings: Vec<String>,

    /// Position in the originating batch, when applicable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch_index: Option<usize>,
}

/// Per-item failure record inside a batch, preserving the input index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchItemError {
    pub batch_index: usize,
    pub worker_id: String,
    pub error: String,
    pub timestamp: DateTime<Utc>,
    pub prediction_successful: bool,
}

/// One slot of a batch result: a prediction or an error record, at the same
/// index the sample occupied in the input.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BatchItem {
    Ok(Box<PredictionResult>),
    Err(BatchItemError),
}

impl BatchItem {
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok(_))
    }

    pub fn as_ok(&self) -> Option<&PredictionResult> {
        match self {
            Self::Ok(p) => Some(p),
            Self::Err(_) => None,
        }
    }
}

/// Aggregate statistics over the successful predictions of a batch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchStatistics {
    pub average_risk_score: f64,
    pub median_risk_score: f64,
    pub max_risk_score: f64,
    pub min_risk_score: f64,
    /// Successful predictions per risk level.
    pub risk_level_distribution: HashMap<String, usize>,
    /// Predictions with risk score above the Danger threshold.
    pub high_risk_count: usize,
    pub requires_attention_count: usize,
}

/// Response envelope for a synchronous multi-worker scoring request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResponse {
    pub request_id: String,
    pub timestamp: DateTime<Utc>,
    pub batch_size: usize,
    pub successful_predictions: usize,
    pub failed_predictions: usize,
    pub processing_time_ms: f64,
    pub validation_warnings: Vec<String>,
    pub batch_statistics: BatchStatistics,
    pub predictions: Vec<BatchItem>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn risk_level_is_total_over_thresholds() {
        assert_eq!(RiskLevel::from_score(0.0), RiskLevel::Safe);
        assert_eq!(RiskLevel::from_score(0.249), RiskLevel::Safe);
        assert_eq!(RiskLevel::from_score(0.25), RiskLevel::Caution);
        assert_eq!(RiskLevel::from_score(0.499), RiskLevel::Caution);
        assert_eq!(RiskLevel::from_score(0.50), RiskLevel::Warning);
        assert_eq!(RiskLevel::from_score(0.749), RiskLevel::Warning);
        assert_eq!(RiskLevel::from_score(0.75), RiskLevel::Danger);
        assert_eq!(RiskLevel::from_score(1.0), RiskLevel::Danger);
    }

    #[test]
    fn risk_level_display_matches_wire_names() {
        assert_eq!(RiskLevel::Danger.to_string(), "Danger");
        assert_eq!(
            serde_json::to_string(&RiskLevel::Caution).ok().as_deref(),
            Some("\"Caution\"")
        );
    }
}
