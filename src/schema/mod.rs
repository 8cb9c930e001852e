//! Canonical feature schema for the scoring pipeline.
//!
//! Single source of truth for the 50 input features the model consumes:
//! ordering, canonical ranges, static defaults, group membership, and the
//! required subset. Every producer (validator, preprocessor, generator) and
//! consumer (model host, scorer) agrees on this ordering; vectors handed to
//! the model are laid out in exactly this order.

use std::collections::HashMap;
use std::sync::OnceLock;

/// Number of features in the canonical schema.
pub const FEATURE_COUNT: usize = 50;

/// Functional grouping of a feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeatureGroup {
    Demographic,
    Environmental,
    /// Time-domain HRV metrics (NN-interval statistics).
    TimeDomain,
    /// Instantaneous heart-rate statistics.
    HeartRate,
    /// Spectral-power HRV metrics.
    FrequencyDomain,
    /// Poincaré / geometric HRV metrics.
    Geometric,
    /// Distribution statistics over the NN-interval series.
    Statistical,
    /// Entropy-based non-linear HRV metrics.
    NonLinear,
}

/// Static description of one schema feature.
#[derive(Debug, Clone, Copy)]
pub struct FeatureSpec {
    pub name: &'static str,
    /// Canonical range used for clamping and min–max normalization.
    pub min: f64,
    pub max: f64,
    /// Static default when no context-aware imputation applies.
    pub default: f64,
    pub group: FeatureGroup,
    /// Whether the validator demands this feature be present.
    pub required: bool,
}

/// The canonical, ordered schema. The model consumes features in this order.
pub const FEATURES: [FeatureSpec; FEATURE_COUNT] = [
    // Demographics
    FeatureSpec { name: "gender", min: 0.0, max: 1.0, default: 1.0, group: FeatureGroup::Demographic, required: true },
    FeatureSpec { name: "age", min: 18.0, max: 65.0, default: 30.0, group: FeatureGroup::Demographic, required: true },
    // HRV: time domain
    FeatureSpec { name: "hrv_mean_nni", min: 300.0, max: 1500.0, default: 800.0, group: FeatureGroup::TimeDomain, required: true },
    FeatureSpec { name: "hrv_median_nni", min: 600.0, max: 1200.0, default: 0.0, group: FeatureGroup::TimeDomain, required: false },
    FeatureSpec { name: "hrv_range_nni", min: 100.0, max: 800.0, default: 0.0, group: FeatureGroup::TimeDomain, required: false },
    FeatureSpec { name: "hrv_sdsd", min: 10.0, max: 100.0, default: 0.0, group: FeatureGroup::TimeDomain, required: false },
    FeatureSpec { name: "hrv_rmssd", min: 15.0, max: 120.0, default: 0.0, group: FeatureGroup::TimeDomain, required: false },
    FeatureSpec { name: "hrv_nni_50", min: 5.0, max: 300.0, default: 0.0, group: FeatureGroup::TimeDomain, required: false },
    FeatureSpec { name: "hrv_pnni_50", min: 2.0, max: 50.0, default: 0.0, group: FeatureGroup::TimeDomain, required: false },
    FeatureSpec { name: "hrv_nni_20", min: 10.0, max: 400.0, default: 0.0, group: FeatureGroup::TimeDomain, required: false },
    FeatureSpec { name: "hrv_pnni_20", min: 5.0, max: 80.0, default: 0.0, group: FeatureGroup::TimeDomain, required: false },
    FeatureSpec { name: "hrv_cvsd", min: 0.02, max: 0.15, default: 0.0, group: FeatureGroup::TimeDomain, required: false },
    FeatureSpec { name: "hrv_sdnn", min: 20.0, max: 150.0, default: 0.0, group: FeatureGroup::TimeDomain, required: false },
    FeatureSpec { name: "hrv_cvnni", min: 0.02, max: 0.12, default: 0.0, group: FeatureGroup::TimeDomain, required: false },
    // HRV: heart rate
    FeatureSpec { name: "hrv_mean_hr", min: 40.0, max: 200.0, default: 75.0, group: FeatureGroup::HeartRate, required: true },
    FeatureSpec { name: "hrv_min_hr", min: 45.0, max: 100.0, default: 0.0, group: FeatureGroup::HeartRate, required: false },
    FeatureSpec { name: "hrv_max_hr", min: 70.0, max: 180.0, default: 0.0, group: FeatureGroup::HeartRate, required: false },
    FeatureSpec { name: "hrv_std_hr", min: 5.0, max: 30.0, default: 0.0, group: FeatureGroup::HeartRate, required: false },
    // HRV: frequency domain
    FeatureSpec { name: "hrv_total_power", min: 500.0, max: 8000.0, default: 0.0, group: FeatureGroup::FrequencyDomain, required: false },
    FeatureSpec { name: "hrv_vlf", min: 100.0, max: 3000.0, default: 0.0, group: FeatureGroup::FrequencyDomain, required: false },
    FeatureSpec { name: "hrv_lf", min: 200.0, max: 2000.0, default: 0.0, group: FeatureGroup::FrequencyDomain, required: false },
    FeatureSpec { name: "hrv_hf", min: 150.0, max: 1500.0, default: 0.0, group: FeatureGroup::FrequencyDomain, required: false },
    FeatureSpec { name: "hrv_lf_hf_ratio", min: 0.5, max: 5.0, default: 0.0, group: FeatureGroup::FrequencyDomain, required: false },
    FeatureSpec { name: "hrv_lfnu", min: 20.0, max: 80.0, default: 0.0, group: FeatureGroup::FrequencyDomain, required: false },
    FeatureSpec { name: "hrv_hfnu", min: 20.0, max: 80.0, default: 0.0, group: FeatureGroup::FrequencyDomain, required: false },
    // HRV: geometric (Poincaré)
    FeatureSpec { name: "hrv_sd1", min: 10.0, max: 80.0, default: 0.0, group: FeatureGroup::Geometric, required: false },
    FeatureSpec { name: "hrv_sd2", min: 30.0, max: 200.0, default: 0.0, group: FeatureGroup::Geometric, required: false },
    FeatureSpec { name: "hrv_sd2_sd1", min: 1.2, max: 4.0, default: 0.0, group: FeatureGroup::Geometric, required: false },
    FeatureSpec { name: "hrv_csi", min: 2.0, max: 10.0, default: 0.0, group: FeatureGroup::Geometric, required: false },
    FeatureSpec { name: "hrv_cvi", min: 2.0, max: 8.0, default: 0.0, group: FeatureGroup::Geometric, required: false },
    // HRV: statistical
    FeatureSpec { name: "hrv_mean", min: 600.0, max: 1200.0, default: 0.0, group: FeatureGroup::Statistical, required: false },
    FeatureSpec { name: "hrv_std", min: 20.0, max: 150.0, default: 0.0, group: FeatureGroup::Statistical, required: false },
    FeatureSpec { name: "hrv_min", min: 400.0, max: 1000.0, default: 0.0, group: FeatureGroup::Statistical, required: false },
    FeatureSpec { name: "hrv_max", min: 700.0, max: 1400.0, default: 0.0, group: FeatureGroup::Statistical, required: false },
    FeatureSpec { name: "hrv_ptp", min: 100.0, max: 800.0, default: 0.0, group: FeatureGroup::Statistical, required: false },
    FeatureSpec { name: "hrv_sum", min: 30_000.0, max: 120_000.0, default: 0.0, group: FeatureGroup::Statistical, required: false },
    FeatureSpec { name: "hrv_energy", min: 1.0e8, max: 1.0e12, default: 0.0, group: FeatureGroup::Statistical, required: false },
    FeatureSpec { name: "hrv_skewness", min: -2.0, max: 2.0, default: 0.0, group: FeatureGroup::Statistical, required: false },
    FeatureSpec { name: "hrv_kurtosis", min: 0.0, max: 10.0, default: 0.0, group: FeatureGroup::Statistical, required: false },
    FeatureSpec { name: "hrv_peaks", min: 50.0, max: 200.0, default: 0.0, group: FeatureGroup::Statistical, required: false },
    FeatureSpec { name: "hrv_rms", min: 600.0, max: 1200.0, default: 0.0, group: FeatureGroup::Statistical, required: false },
    FeatureSpec { name: "hrv_n_above_mean", min: 25.0, max: 75.0, default: 0.0, group: FeatureGroup::Statistical, required: false },
    FeatureSpec { name: "hrv_n_below_mean", min: 25.0, max: 75.0, default: 0.0, group: FeatureGroup::Statistical, required: false },
    FeatureSpec { name: "hrv_n_sign_changes", min: 20.0, max: 80.0, default: 0.0, group: FeatureGroup::Statistical, required: false },
    FeatureSpec { name: "hrv_iqr", min: 50.0, max: 300.0, default: 0.0, group: FeatureGroup::Statistical, required: false },
    // HRV: non-linear
    FeatureSpec { name: "hrv_entropy", min: 0.5, max: 1.5, default: 0.0, group: FeatureGroup::NonLinear, required: false },
    FeatureSpec { name: "hrv_perm_entropy", min: 0.3, max: 1.0, default: 0.0, group: FeatureGroup::NonLinear, required: false },
    FeatureSpec { name: "hrv_svd_entropy", min: 0.4, max: 1.2, default: 0.0, group: FeatureGroup::NonLinear, required: false },
    // Environment
    FeatureSpec { name: "temperature_c", min: -10.0, max: 50.0, default: 25.0, group: FeatureGroup::Environmental, required: true },
    FeatureSpec { name: "humidity_pct", min: 0.0, max: 100.0, default: 50.0, group: FeatureGroup::Environmental, required: true },
];

/// Ordered feature names.
pub fn features() -> impl Iterator<Item = &'static str> {
    FEATURES.iter().map(|f| f.name)
}

/// Position of a feature in the canonical ordering.
pub fn index_of(name: &str) -> Option<usize> {
    static INDEX: OnceLock<HashMap<&'static str, usize>> = OnceLock::new();
    INDEX
        .get_or_init(|| FEATURES.iter().enumerate().map(|(i, f)| (f.name, i)).collect())
        .get(name)
        .copied()
}

/// Look up the full spec for a feature name.
pub fn spec(name: &str) -> Option<&'static FeatureSpec> {
    index_of(name).map(|i| &FEATURES[i])
}

/// Canonical (min, max) range for clamping and normalization.
pub fn range(name: &str) -> Option<(f64, f64)> {
    spec(name).map(|f| (f.min, f.max))
}

/// Static default value for a feature.
pub fn default_value(name: &str) -> f64 {
    spec(name).map_or(0.0, |f| f.default)
}

/// The subset of features the validator requires to be present.
pub fn required() -> impl Iterator<Item = &'static str> {
    FEATURES.iter().filter(|f| f.required).map(|f| f.name)
}

/// Clamp a value into a feature's canonical range.
pub fn clamp(name: &str, value: f64) -> f64 {
    match range(name) {
        Some((lo, hi)) => value.clamp(lo, hi),
        None => value,
    }
}

/// Min–max normalize a value into [0, 1] by the feature's canonical range.
/// Values outside the range clamp to the endpoints.
pub fn normalize(name: &str, value: f64) -> f64 {
    match range(name) {
        Some((lo, hi)) if hi > lo => ((value - lo) / (hi - lo)).clamp(0.0, 1.0),
        _ => value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_is_fifty_wide() {
        assert_eq!(FEATURES.len(), FEATURE_COUNT);
        assert_eq!(features().count(), 50);
    }

    #[test]
    fn names_are_unique_and_indexed() {
        for (i, f) in FEATURES.iter().enumerate() {
            assert_eq!(index_of(f.name), Some(i), "index mismatch for {}", f.name);
        }
        assert_eq!(index_of("not_a_feature"), None);
    }

    #[test]
    fn required_set_matches_contract() {
        let required: Vec<&str> = required().collect();
        assert_eq!(
            required,
            ["gender", "age", "hrv_mean_nni", "hrv_mean_hr", "temperature_c", "humidity_pct"]
        );
    }

    #[test]
    fn ranges_are_well_formed() {
        for f in &FEATURES {
            assert!(f.min < f.max, "degenerate range for {}", f.name);
        }
    }

    #[test]
    fn normalize_clamps_to_unit_interval() {
        assert!((normalize("temperature_c", 25.0) - 0.583_333).abs() < 1e-3);
        assert_eq!(normalize("temperature_c", -40.0), 0.0);
        assert_eq!(normalize("temperature_c", 90.0), 1.0);
        assert_eq!(normalize("humidity_pct", 50.0), 0.5);
    }

    #[test]
    fn clamp_respects_canonical_range() {
        assert_eq!(clamp("age", 90.0), 65.0);
        assert_eq!(clamp("age", 10.0), 18.0);
        assert_eq!(clamp("hrv_rmssd", 50.0), 50.0);
    }
}
