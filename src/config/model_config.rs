//! Model and safety-policy constants.
//!
//! Heat-index polynomial coefficients, risk-level thresholds, the thermal
//! comfort → heat exposure mapping, and the OSHA heat-safety tables. These
//! values are fixed by the published NOAA formula and OSHA guidance; runtime
//! knobs (bias, thresholds that operators tune) live in [`super::Settings`].

/// NOAA heat-index polynomial coefficients (Rothfusz regression, °F / %RH).
pub mod heat_index_coefficients {
    pub const C1: f64 = -42.379;
    pub const C2: f64 = 2.049_015_23;
    pub const C3: f64 = 10.143_331_27;
    pub const C4: f64 = -0.224_755_41;
    pub const C5: f64 = -6.837_83e-3;
    pub const C6: f64 = -5.481_717e-2;
    pub const C7: f64 = 1.228_74e-3;
    pub const C8: f64 = 8.528_2e-4;
    pub const C9: f64 = -1.99e-6;
}

/// Threshold structure of the four risk bands on the [0, 1] score axis.
pub mod risk_thresholds {
    /// Scores below this are Safe.
    pub const SAFE: f64 = 0.25;
    /// Scores in [SAFE, CAUTION) are Caution.
    pub const CAUTION: f64 = 0.50;
    /// Scores in [CAUTION, WARNING) are Warning; at or above, Danger.
    pub const WARNING: f64 = 0.75;
}

/// Mapping from the model's ordered comfort classes to points on the
/// heat-exposure risk axis. Classes beyond the four named ones interpolate
/// linearly by index.
pub mod class_risk {
    pub const NEUTRAL: f64 = 0.0;
    pub const SLIGHTLY_WARM: f64 = 0.3;
    pub const WARM: f64 = 0.6;
    pub const HOT: f64 = 0.9;

    /// Risk point for class `index` out of `count` ordered classes.
    pub fn point(index: usize, count: usize) -> f64 {
        const NAMED: [f64; 4] = [NEUTRAL, SLIGHTLY_WARM, WARM, HOT];
        if count == 4 {
            NAMED.get(index).copied().unwrap_or(HOT)
        } else if count <= 1 {
            0.0
        } else {
            index as f64 / (count - 1) as f64
        }
    }
}

/// OSHA heat-index bands (°F).
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeatIndexBand {
    Normal,
    Caution,
    ExtremeCaution,
    Danger,
    ExtremeDanger,
}

impl HeatIndexBand {
    /// Classify a heat index (°F) into its OSHA band.
    pub fn classify(heat_index_f: f64) -> Self {
        if heat_index_f >= 130.0 {
            Self::ExtremeDanger
        } else if heat_index_f >= 105.0 {
            Self::Danger
        } else if heat_index_f >= 90.0 {
            Self::ExtremeCaution
        } else if heat_index_f >= 80.0 {
            Self::Caution
        } else {
            Self::Normal
        }
    }

    /// Stable tag used in compliance records.
    pub fn tag(self) -> &'static str {
        match self {
            Self::Normal => "NORMAL",
            Self::Caution => "CAUTION",
            Self::ExtremeCaution => "EXTREME_CAUTION",
            Self::Danger => "DANGER",
            Self::ExtremeDanger => "EXTREME_DANGER",
        }
    }
}

/// Work intensity categories for the OSHA work/rest schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkIntensity {
    Light,
    Moderate,
    Heavy,
}

/// Recommended work/rest minutes per hour for a heat-index band and work
/// intensity, from the OSHA heat-stress guidance. `None` for the Normal band
/// (no schedule required).
pub fn work_rest_minutes(band: HeatIndexBand, intensity: WorkIntensity) -> Option<(u32, u32)> {
    use HeatIndexBand::{Caution, Danger, ExtremeCaution, ExtremeDanger, Normal};
    use WorkIntensity::{Heavy, Light, Moderate};
    match (band, intensity) {
        (Normal, _) => None,
        (Caution, Light) => Some((45, 15)),
        (Caution, Moderate) => Some((30, 30)),
        (Caution, Heavy) => Some((15, 45)),
        (ExtremeCaution, Light) => Some((30, 30)),
        (ExtremeCaution, Moderate) => Some((15, 45)),
        (Danger, Light) => Some((15, 45)),
        (ExtremeCaution | Danger, Heavy) | (Danger, Moderate) | (ExtremeDanger, _) => {
            Some((0, 60))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn class_points_for_four_classes() {
        assert!((class_risk::point(0, 4) - 0.0).abs() < f64::EPSILON);
        assert!((class_risk::point(1, 4) - 0.3).abs() < f64::EPSILON);
        assert!((class_risk::point(2, 4) - 0.6).abs() < f64::EPSILON);
        assert!((class_risk::point(3, 4) - 0.9).abs() < f64::EPSILON);
    }

    #[test]
    fn class_points_interpolate_for_other_counts() {
        assert!((class_risk::point(0, 3) - 0.0).abs() < f64::EPSILON);
        assert!((class_risk::point(1, 3) - 0.5).abs() < f64::EPSILON);
        assert!((class_risk::point(2, 3) - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn heat_index_bands() {
        assert_eq!(HeatIndexBand::classify(75.0), HeatIndexBand::Normal);
        assert_eq!(HeatIndexBand::classify(85.0), HeatIndexBand::Caution);
        assert_eq!(HeatIndexBand::classify(95.0), HeatIndexBand::ExtremeCaution);
        assert_eq!(HeatIndexBand::classify(110.0), HeatIndexBand::Danger);
        assert_eq!(HeatIndexBand::classify(131.0), HeatIndexBand::ExtremeDanger);
    }

    #[test]
    fn work_rest_schedule_tightens_with_heat() {
        assert_eq!(work_rest_minutes(HeatIndexBand::Normal, WorkIntensity::Heavy), None);
        assert_eq!(
            work_rest_minutes(HeatIndexBand::Caution, WorkIntensity::Light),
            Some((45, 15))
        );
        assert_eq!(
            work_rest_minutes(HeatIndexBand::ExtremeDanger, WorkIntensity::Light),
            Some((0, 60))
        );
    }
}
