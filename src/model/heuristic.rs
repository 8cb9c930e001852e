//! Deterministic physiology-calibrated fallback model.
//!
//! Stands in when no trained artifact is available (tests, demos,
//! `--synthetic-model`). Collapses the normalized feature vector into a
//! single thermal-strain index dominated by ambient temperature, humidity,
//! and cardiovascular load, then places Gaussian-shaped class logits along
//! that axis. Calibrated so that comfortable office conditions land firmly
//! in `neutral` and saturating heat with an elevated heart rate lands in
//! `hot`.

use crate::error::{ServiceError, ServiceResult};
use crate::model::artifact::softmax_inference;
use crate::model::{Inference, InferenceModel};
use crate::schema;

/// Strain-axis centers for the four comfort classes, in class order.
const CLASS_CENTERS: [f64; 4] = [0.44, 0.60, 0.72, 0.84];

/// Sharpness of the class logits along the strain axis.
const SHARPNESS: f64 = 160.0;

// Driver weights over normalized features. RMSSD enters inverted: low
// heart-rate variability indicates strain.
const W_TEMPERATURE: f64 = 0.55;
const W_HUMIDITY: f64 = 0.15;
const W_HEART_RATE: f64 = 0.25;
const W_RMSSD: f64 = 0.05;

/// Deterministic fallback inference model.
pub struct HeuristicModel {
    classes: Vec<String>,
    idx_temperature: usize,
    idx_humidity: usize,
    idx_heart_rate: usize,
    idx_rmssd: usize,
}

impl Default for HeuristicModel {
    fn default() -> Self {
        Self::new()
    }
}

impl HeuristicModel {
    pub fn new() -> Self {
        // Indices resolve against the canonical schema; the names are
        // compile-time constants so the lookups cannot fail.
        let lookup = |name: &str| schema::index_of(name).unwrap_or(0);
        Self {
            classes: vec![
                "neutral".to_string(),
                "slightly_warm".to_string(),
                "warm".to_string(),
                "hot".to_string(),
            ],
            idx_temperature: lookup("temperature_c"),
            idx_humidity: lookup("humidity_pct"),
            idx_heart_rate: lookup("hrv_mean_hr"),
            idx_rmssd: lookup("hrv_rmssd"),
        }
    }

    /// Thermal-strain index in roughly [0, 1] from a normalized vector.
    fn strain_index(&self, vector: &[f64]) -> f64 {
        W_TEMPERATURE * vector[self.idx_temperature]
            + W_HUMIDITY * vector[self.idx_humidity]
            + W_HEART_RATE * vector[self.idx_heart_rate]
            + W_RMSSD * (1.0 - vector[self.idx_rmssd])
    }
}

impl InferenceModel for HeuristicModel {
    fn predict(&self, vector: &[f64]) -> ServiceResult<Inference> {
        if vector.len() != schema::FEATURE_COUNT {
            return Err(ServiceError::Internal(format!(
                "heuristic model expects {} features, got {}",
                schema::FEATURE_COUNT,
                vector.len()
            )));
        }
        let strain = self.strain_index(vector);
        let logits: Vec<f64> = CLASS_CENTERS
            .iter()
            .map(|center| -SHARPNESS * (strain - center).powi(2))
            .collect();
        Ok(softmax_inference(&logits))
    }

    fn classes(&self) -> &[String] {
        &self.classes
    }

    fn feature_count(&self) -> usize {
        schema::FEATURE_COUNT
    }

    fn kind(&self) -> &'static str {
        "thermal_heuristic"
    }
}
