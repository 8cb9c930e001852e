//! Preprocessing: imputation, derived features, normalization.
//!
//! Pure functions over validated samples. Imputation replaces defaulted
//! physiological features with age/gender-adjusted baselines; derived
//! indicators are computed best-effort; normalization min–max scales every
//! feature into [0, 1] by its canonical schema range before the vector is
//! handed to the model.

use crate::schema;
use crate::types::{PreparedSample, ValidatedSample};

/// Preprocesses validated samples into model-ready feature vectors.
#[derive(Debug, Clone)]
pub struct Preprocessor {
    /// Whether min–max scaling is applied (on by default; the heuristic
    /// model is calibrated against scaled inputs).
    scaling_enabled: bool,
}

impl Default for Preprocessor {
    fn default() -> Self {
        Self { scaling_enabled: true }
    }
}

impl Preprocessor {
    pub fn new(scaling_enabled: bool) -> Self {
        Self { scaling_enabled }
    }

    /// Run the full preprocessing chain on one validated sample.
    pub fn prepare(&self, sample: &ValidatedSample) -> PreparedSample {
        let mut values = sample.values.clone();
        let age = sample.get("age");
        let gender = sample.get("gender");

        // Context-aware imputation for defaulted physiological features.
        if sample.defaulted.contains("hrv_mean_hr") {
            let baseline = if sample.supplied("hrv_mean_nni") && sample.get("hrv_mean_nni") > 0.0 {
                60_000.0 / sample.get("hrv_mean_nni")
            } else {
                age_adjusted_heart_rate(age)
            };
            values.insert("hrv_mean_hr", baseline);
        }
        if sample.defaulted.contains("hrv_mean_nni") {
            let hr = values.get("hrv_mean_hr").copied().unwrap_or(75.0);
            let baseline = if hr > 0.0 { 60_000.0 / hr } else { 800.0 };
            values.insert("hrv_mean_nni", baseline);
        }
        if sample.defaulted.contains("hrv_rmssd") {
            values.insert("hrv_rmssd", age_adjusted_rmssd(age, gender));
        }
        if sample.defaulted.contains("hrv_sdnn") {
            values.insert("hrv_sdnn", age_adjusted_sdnn(age));
        }

        // Derived indicators, best-effort.
        let temperature_c = values.get("temperature_c").copied().unwrap_or(25.0);
        let humidity_pct = values.get("humidity_pct").copied().unwrap_or(50.0);
        let heat_stress_factor = heat_stress_factor(temperature_c, humidity_pct);
        let age_risk_factor = 1.0 + ((age - 40.0) * 0.01).max(0.0);
        let rmssd = values.get("hrv_rmssd").copied().unwrap_or(0.0);
        let stress_indicator =
            (rmssd > 0.0).then(|| ((50.0 - rmssd) / 50.0).max(0.0));

        // Vector assembly in schema order, scaled when enabled.
        let vector: Vec<f64> = schema::FEATURES
            .iter()
            .map(|spec| {
                let value = values.get(spec.name).copied().unwrap_or(spec.default);
                if self.scaling_enabled {
                    schema::normalize(spec.name, value)
                } else {
                    schema::clamp(spec.name, value)
                }
            })
            .collect();

        let supplied_count = schema::FEATURES
            .iter()
            .filter(|spec| sample.supplied(spec.name) && sample.get(spec.name) != 0.0)
            .count();
        let has_all_required = schema::required().all(|name| sample.supplied(name));

        PreparedSample {
            worker_id: sample.worker_id.clone(),
            vector,
            temperature_c,
            humidity_pct,
            mean_hr: values.get("hrv_mean_hr").copied().unwrap_or(0.0),
            rmssd,
            heat_stress_factor,
            age_risk_factor,
            stress_indicator,
            supplied_count,
            has_all_required,
            warnings: sample.warnings.clone(),
        }
    }

    /// Row-wise batch variant, preserving input pairing.
    pub fn prepare_batch<'a, I>(&self, samples: I) -> Vec<(usize, PreparedSample)>
    where
        I: IntoIterator<Item = &'a (usize, ValidatedSample)>,
    {
        samples
            .into_iter()
            .map(|(index, sample)| (*index, self.prepare(sample)))
            .collect()
    }
}

/// Age-adjusted resting heart rate baseline, clamped to [50, 100] BPM.
fn age_adjusted_heart_rate(age: f64) -> f64 {
    (75.0 - (age - 30.0) * 0.5).clamp(50.0, 100.0)
}

/// Age- and gender-adjusted RMSSD baseline, floored at 10 ms. Gender 0 is
/// female, which carries a small positive offset.
fn age_adjusted_rmssd(age: f64, gender: f64) -> f64 {
    let mut base = 40.0 - (age - 30.0) * 0.5;
    if gender < 0.5 {
        base += 5.0;
    }
    base.max(10.0)
}

/// Age-adjusted SDNN baseline, floored at 20 ms.
fn age_adjusted_sdnn(age: f64) -> f64 {
    (50.0 - (age - 30.0) * 0.3).max(20.0)
}

/// Combined temperature/humidity stress factor, 1.0 in comfortable
/// conditions, capped at 2.0.
fn heat_stress_factor(temperature_c: f64, humidity_pct: f64) -> f64 {
    if temperature_c > 26.0 {
        (1.0 + (temperature_c - 26.0) * 0.05 + (humidity_pct - 50.0) * 0.01).min(2.0)
    } else {
        1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{HashMap, HashSet};

    fn sample_with(
        pairs: &[(&'static str, f64)],
        defaulted: &[&'static str],
    ) -> ValidatedSample {
        let mut values: HashMap<&'static str, f64> =
            schema::FEATURES.iter().map(|f| (f.name, f.default)).collect();
        for (name, value) in pairs {
            values.insert(name, *value);
        }
        ValidatedSample {
            worker_id: "w1".into(),
            values,
            defaulted: defaulted.iter().copied().collect::<HashSet<_>>(),
            warnings: vec![],
        }
    }

    #[test]
    fn vector_is_schema_ordered_and_unit_scaled() {
        let sample = sample_with(
            &[("age", 30.0), ("temperature_c", 25.0), ("humidity_pct", 50.0)],
            &[],
        );
        let prepared = Preprocessor::default().prepare(&sample);
        assert_eq!(prepared.vector.len(), schema::FEATURE_COUNT);
        assert!(prepared.vector.iter().all(|v| (0.0..=1.0).contains(v)));
        // humidity_pct is the last schema feature
        assert!((prepared.vector[schema::FEATURE_COUNT - 1] - 0.5).abs() < 1e-9);
    }

    #[test]
    fn heart_rate_imputation_is_age_adjusted() {
        assert!((age_adjusted_heart_rate(30.0) - 75.0).abs() < f64::EPSILON);
        assert!((age_adjusted_heart_rate(60.0) - 60.0).abs() < f64::EPSILON);
        assert!((age_adjusted_heart_rate(90.0) - 50.0).abs() < f64::EPSILON);
        assert!((age_adjusted_heart_rate(18.0) - 81.0).abs() < f64::EPSILON);
    }

    #[test]
    fn nni_imputed_from_heart_rate() {
        let sample = sample_with(&[("hrv_mean_hr", 80.0)], &["hrv_mean_nni"]);
        let prepared = Preprocessor::new(false).prepare(&sample);
        // 60000 / 80 = 750 ms, read back through the unscaled vector
        let idx = schema::index_of("hrv_mean_nni").unwrap();
        assert!((prepared.vector[idx] - 750.0).abs() < 1e-9);
    }

    #[test]
    fn rmssd_imputation_favors_female_workers() {
        assert!((age_adjusted_rmssd(30.0, 1.0) - 40.0).abs() < f64::EPSILON);
        assert!((age_adjusted_rmssd(30.0, 0.0) - 45.0).abs() < f64::EPSILON);
        assert!((age_adjusted_rmssd(95.0, 1.0) - 10.0).abs() < f64::EPSILON);
    }

    #[test]
    fn sdnn_imputation_floors_at_twenty() {
        assert!((age_adjusted_sdnn(30.0) - 50.0).abs() < f64::EPSILON);
        assert!((age_adjusted_sdnn(130.0) - 20.0).abs() < f64::EPSILON);
    }

    #[test]
    fn heat_stress_factor_bounds() {
        assert!((heat_stress_factor(20.0, 90.0) - 1.0).abs() < f64::EPSILON);
        assert!((heat_stress_factor(30.0, 60.0) - 1.3).abs() < 1e-9);
        assert!((heat_stress_factor(45.0, 95.0) - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn stress_indicator_inverts_rmssd() {
        let sample = sample_with(&[("hrv_rmssd", 20.0)], &[]);
        let prepared = Preprocessor::default().prepare(&sample);
        assert!((prepared.stress_indicator.unwrap() - 0.6).abs() < 1e-9);

        let relaxed = sample_with(&[("hrv_rmssd", 80.0)], &[]);
        let prepared = Preprocessor::default().prepare(&relaxed);
        assert!((prepared.stress_indicator.unwrap() - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn derived_age_risk_kicks_in_after_forty() {
        let young = sample_with(&[("age", 35.0)], &[]);
        let older = sample_with(&[("age", 55.0)], &[]);
        let p = Preprocessor::default();
        assert!((p.prepare(&young).age_risk_factor - 1.0).abs() < f64::EPSILON);
        assert!((p.prepare(&older).age_risk_factor - 1.15).abs() < 1e-9);
    }
}
