//! Risk scoring: class probabilities → bounded score, level, and advice.
//!
//! The scorer owns the mapping from the model's thermal-comfort classes to
//! the heat-exposure risk axis, the conservative safety bias, level
//! classification, recommendation synthesis, and data-quality scoring. It
//! is pure with respect to the model: inference results come in, a complete
//! [`PredictionResult`] comes out.

pub mod recommendations;

use std::collections::HashMap;

use chrono::Utc;

use crate::config::model_config::{class_risk, risk_thresholds};
use crate::heat_index;
use crate::model::Inference;
use crate::schema;
use crate::types::{PredictionResult, PreparedSample, RiskLevel};

/// Scoring policy knobs, fixed at bootstrap.
#[derive(Debug, Clone)]
pub struct Scorer {
    /// Additive safety bias applied when conservative mode is requested.
    conservative_bias: f64,
    /// Heat index (°F) above which attention is always required.
    heat_index_danger_f: f64,
}

impl Scorer {
    pub fn new(conservative_bias: f64, heat_index_danger_f: f64) -> Self {
        Self { conservative_bias, heat_index_danger_f }
    }

    /// Weighted risk score from a class probability distribution, before
    /// bias. Classes map to fixed points on [0, 1], interpolating for
    /// non-standard class counts.
    pub fn standard_score(&self, probabilities: &[f64]) -> f64 {
        let count = probabilities.len();
        probabilities
            .iter()
            .enumerate()
            .map(|(i, p)| p * class_risk::point(i, count))
            .sum::<f64>()
            .clamp(0.0, 1.0)
    }

    /// Assemble the full assessment for one prepared sample.
    pub fn assess(
        &self,
        request_id: &str,
        prepared: &PreparedSample,
        inference: &Inference,
        classes: &[String],
        use_conservative: bool,
    ) -> PredictionResult {
        let standard = self.standard_score(&inference.probabilities);
        let conservative = (standard + self.conservative_bias).min(1.0);
        let final_score = if use_conservative { conservative } else { standard };
        let risk_level = RiskLevel::from_score(final_score);

        let temperature_f = heat_index::celsius_to_fahrenheit(prepared.temperature_c);
        let heat_index_f = heat_index::heat_index_f(temperature_f, prepared.humidity_pct);

        let confidence = inference
            .probabilities
            .iter()
            .copied()
            .fold(0.0_f64, f64::max);

        let predicted_class = classes
            .get(inference.class_index)
            .cloned()
            .unwrap_or_else(|| format!("class_{}", inference.class_index));

        let class_probabilities: HashMap<String, f64> = classes
            .iter()
            .cloned()
            .zip(inference.probabilities.iter().copied())
            .collect();

        let requires_immediate_attention = final_score > risk_thresholds::WARNING
            || heat_index_f >= self.heat_index_danger_f
            || risk_level == RiskLevel::Danger;

        PredictionResult {
            request_id: request_id.to_string(),
            worker_id: prepared.worker_id.clone(),
            timestamp: Utc::now(),
            risk_score: final_score,
            risk_score_standard: standard,
            risk_level,
            confidence,
            temperature_c: prepared.temperature_c,
            temperature_f,
            humidity_pct: prepared.humidity_pct,
            heat_index_f,
            osha_recommendations: recommendations::synthesize(risk_level, heat_index_f),
            requires_immediate_attention,
            conservative_bias_applied: use_conservative,
            conservative_bias_value: self.conservative_bias,
            predicted_class,
            class_probabilities,
            heart_rate_avg: prepared.mean_hr,
            hrv_rmssd: prepared.rmssd,
            processing_time_ms: 0.0,
            data_quality_score: data_quality_score(prepared),
            validation_warnings: prepared.warnings.clone(),
            batch_index: None,
        }
    }
}

/// Ratio of genuinely supplied features to schema width, with a bonus of up
/// to 0.2 for complete required coverage. Bounded to [0, 1].
pub fn data_quality_score(prepared: &PreparedSample) -> f64 {
    let base = prepared.supplied_count as f64 / schema::FEATURE_COUNT as f64;
    let bonus = if prepared.has_all_required { 0.2 } else { 0.0 };
    (base + bonus).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prepared(temperature_c: f64, humidity_pct: f64) -> PreparedSample {
        PreparedSample {
            worker_id: "w1".into(),
            vector: vec![0.0; schema::FEATURE_COUNT],
            temperature_c,
            humidity_pct,
            mean_hr: 75.0,
            rmssd: 40.0,
            heat_stress_factor: 1.0,
            age_risk_factor: 1.0,
            stress_indicator: None,
            supplied_count: 6,
            has_all_required: true,
            warnings: vec![],
        }
    }

    fn scorer() -> Scorer {
        Scorer::new(0.15, 90.0)
    }

    #[test]
    fn standard_score_weights_class_points() {
        let s = scorer();
        assert!((s.standard_score(&[1.0, 0.0, 0.0, 0.0]) - 0.0).abs() < 1e-12);
        assert!((s.standard_score(&[0.0, 0.0, 0.0, 1.0]) - 0.9).abs() < 1e-12);
        assert!((s.standard_score(&[0.25, 0.25, 0.25, 0.25]) - 0.45).abs() < 1e-12);
    }

    #[test]
    fn conservative_score_dominates_standard() {
        let s = scorer();
        let inference = Inference { class_index: 1, probabilities: vec![0.2, 0.5, 0.2, 0.1] };
        let classes: Vec<String> =
            ["neutral", "slightly_warm", "warm", "hot"].map(String::from).to_vec();

        let biased = s.assess("r", &prepared(25.0, 50.0), &inference, &classes, true);
        let unbiased = s.assess("r", &prepared(25.0, 50.0), &inference, &classes, false);
        assert!(biased.risk_score >= biased.risk_score_standard);
        assert!((biased.risk_score - (unbiased.risk_score + 0.15)).abs() < 1e-12);
        assert!(biased.conservative_bias_applied);
        assert!(!unbiased.conservative_bias_applied);
    }

    #[test]
    fn conservative_score_caps_at_one() {
        let s = scorer();
        let inference = Inference { class_index: 3, probabilities: vec![0.0, 0.0, 0.05, 0.95] };
        let classes: Vec<String> =
            ["neutral", "slightly_warm", "warm", "hot"].map(String::from).to_vec();
        let result = s.assess("r", &prepared(43.0, 90.0), &inference, &classes, true);
        assert!(result.risk_score <= 1.0);
        assert_eq!(result.risk_level, RiskLevel::Danger);
    }

    #[test]
    fn attention_required_by_heat_index_alone() {
        let s = scorer();
        // Neutral prediction but brutal heat index.
        let inference = Inference { class_index: 0, probabilities: vec![1.0, 0.0, 0.0, 0.0] };
        let classes: Vec<String> =
            ["neutral", "slightly_warm", "warm", "hot"].map(String::from).to_vec();
        let result = s.assess("r", &prepared(40.0, 80.0), &inference, &classes, false);
        assert!(result.heat_index_f >= 90.0);
        assert!(result.requires_immediate_attention);
    }

    #[test]
    fn safe_conditions_do_not_require_attention() {
        let s = scorer();
        let inference = Inference { class_index: 0, probabilities: vec![0.95, 0.05, 0.0, 0.0] };
        let classes: Vec<String> =
            ["neutral", "slightly_warm", "warm", "hot"].map(String::from).to_vec();
        let result = s.assess("r", &prepared(25.0, 50.0), &inference, &classes, true);
        assert_eq!(result.risk_level, RiskLevel::Safe);
        assert!(!result.requires_immediate_attention);
        assert!(!result.osha_recommendations.is_empty());
        assert!((result.heat_index_f - 77.0).abs() < 0.01);
    }

    #[test]
    fn data_quality_rewards_supplied_features() {
        let mut p = prepared(25.0, 50.0);
        p.supplied_count = 50;
        p.has_all_required = true;
        assert!((data_quality_score(&p) - 1.0).abs() < 1e-12);

        p.supplied_count = 10;
        p.has_all_required = false;
        assert!((data_quality_score(&p) - 0.2).abs() < 1e-12);

        p.has_all_required = true;
        assert!((data_quality_score(&p) - 0.4).abs() < 1e-12);
    }

    #[test]
    fn probabilities_echoed_per_class() {
        let s = scorer();
        let inference = Inference { class_index: 2, probabilities: vec![0.1, 0.2, 0.6, 0.1] };
        let classes: Vec<String> =
            ["neutral", "slightly_warm", "warm", "hot"].map(String::from).to_vec();
        let result = s.assess("r", &prepared(30.0, 60.0), &inference, &classes, true);
        assert_eq!(result.predicted_class, "warm");
        assert!((result.class_probabilities["warm"] - 0.6).abs() < 1e-12);
        assert!((result.confidence - 0.6).abs() < 1e-12);
    }
}
