//! OSHA-aligned recommendation policy.
//!
//! Baseline advice keyed by risk level, plus advice appended by heat-index
//! band. Every level carries at least one baseline entry, so a synthesized
//! recommendation list is never empty.

use crate::config::model_config::HeatIndexBand;
use crate::types::RiskLevel;

/// Baseline advice for a risk level.
pub fn baseline_advice(level: RiskLevel) -> &'static [&'static str] {
    match level {
        RiskLevel::Safe => &[
            "Continue current activity with normal precautions",
            "Maintain regular hydration schedule",
            "Monitor for any changes in conditions",
        ],
        RiskLevel::Caution => &[
            "Increase water intake to 8 oz every 15-20 minutes",
            "Take rest breaks in shade/cool area every hour",
            "Monitor workers for early heat stress symptoms",
            "Consider lighter colored, loose-fitting clothing",
        ],
        RiskLevel::Warning => &[
            "Implement work/rest cycles: 15 minutes work, 15 minutes rest",
            "Mandatory water intake: 8 oz every 15 minutes",
            "Move to air-conditioned area if possible",
            "Remove unnecessary clothing layers",
            "Assign heat stress buddy system",
        ],
        RiskLevel::Danger => &[
            "STOP strenuous outdoor work immediately",
            "Move to air-conditioned environment",
            "Continuous medical monitoring required",
            "Implement emergency cooling procedures",
            "Contact medical personnel if heat illness symptoms present",
        ],
    }
}

/// Advice appended for a heat-index band; the Normal band appends nothing.
pub fn heat_index_advice(band: HeatIndexBand) -> Option<&'static str> {
    match band {
        HeatIndexBand::Normal => None,
        HeatIndexBand::Caution => Some("Use caution during sustained outdoor work"),
        HeatIndexBand::ExtremeCaution => Some("Postpone non-essential outdoor work"),
        HeatIndexBand::Danger => Some("Suspend outdoor work where possible"),
        HeatIndexBand::ExtremeDanger => Some("EXTREME DANGER: Cease all outdoor work activities"),
    }
}

/// Full recommendation list for a level and heat index (°F).
pub fn synthesize(level: RiskLevel, heat_index_f: f64) -> Vec<String> {
    let mut recommendations: Vec<String> =
        baseline_advice(level).iter().map(ToString::to_string).collect();
    if let Some(advice) = heat_index_advice(HeatIndexBand::classify(heat_index_f)) {
        recommendations.push(advice.to_string());
    }
    recommendations
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_level_has_baseline_advice() {
        for level in [RiskLevel::Safe, RiskLevel::Caution, RiskLevel::Warning, RiskLevel::Danger] {
            assert!(!baseline_advice(level).is_empty());
        }
    }

    #[test]
    fn synthesized_list_is_never_empty() {
        assert!(!synthesize(RiskLevel::Safe, 70.0).is_empty());
        assert!(!synthesize(RiskLevel::Danger, 140.0).is_empty());
    }

    #[test]
    fn heat_index_advice_appends_by_band() {
        let cool = synthesize(RiskLevel::Safe, 75.0);
        let hot = synthesize(RiskLevel::Safe, 95.0);
        assert_eq!(hot.len(), cool.len() + 1);
        assert!(hot.last().map_or(false, |s| s.contains("Postpone")));
    }

    #[test]
    fn extreme_band_advises_stopping_work() {
        let recs = synthesize(RiskLevel::Danger, 135.0);
        assert!(recs.iter().any(|r| r.contains("Cease all outdoor work")));
        assert!(recs.iter().any(|r| r.contains("STOP strenuous outdoor work")));
    }

    #[test]
    fn caution_advises_more_hydration() {
        let recs = synthesize(RiskLevel::Caution, 75.0);
        assert!(recs.iter().any(|r| r.contains("water intake")));
    }
}
