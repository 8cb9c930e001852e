//! Synthetic worker-telemetry generator.
//!
//! Fixture source for demos and tests: archetype worker profiles, risk-
//! conditioned environmental sampling, and stress-driven HRV synthesis.
//! Ramp scenarios interpolate conditions from comfortable to dangerous (and
//! back) so a scoring sequence sweeps the full risk range. Samples come
//! back as raw wire records, ready to feed the scoring pipeline.

use std::sync::Mutex;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use serde_json::{json, Map, Value};

use crate::schema;
use crate::types::{RawSample, RiskLevel};

/// A worker archetype used to seed realistic physiology.
#[derive(Debug, Clone, Copy)]
pub struct WorkerProfile {
    pub age: f64,
    /// 0 = female, 1 = male.
    pub gender: f64,
    /// 0..1, higher is fitter.
    pub fitness_level: f64,
    /// 0..1, higher tolerates heat better.
    pub heat_tolerance: f64,
    pub base_heart_rate: f64,
    pub base_hrv: f64,
}

/// Archetype profiles spanning the workforce demographics.
const PROFILES: [WorkerProfile; 6] = [
    WorkerProfile { age: 25.0, gender: 1.0, fitness_level: 0.8, heat_tolerance: 0.7, base_heart_rate: 65.0, base_hrv: 45.0 },
    WorkerProfile { age: 40.0, gender: 0.0, fitness_level: 0.6, heat_tolerance: 0.6, base_heart_rate: 75.0, base_hrv: 35.0 },
    WorkerProfile { age: 55.0, gender: 1.0, fitness_level: 0.4, heat_tolerance: 0.4, base_heart_rate: 80.0, base_hrv: 25.0 },
    WorkerProfile { age: 22.0, gender: 0.0, fitness_level: 0.7, heat_tolerance: 0.6, base_heart_rate: 70.0, base_hrv: 40.0 },
    WorkerProfile { age: 35.0, gender: 1.0, fitness_level: 0.5, heat_tolerance: 0.5, base_heart_rate: 75.0, base_hrv: 35.0 },
    WorkerProfile { age: 50.0, gender: 0.0, fitness_level: 0.7, heat_tolerance: 0.6, base_heart_rate: 72.0, base_hrv: 38.0 },
];

/// Thread-safe synthetic data generator.
pub struct DataGenerator {
    rng: Mutex<StdRng>,
}

impl DataGenerator {
    /// Seeded generator for reproducible fixtures.
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self { rng: Mutex::new(rng) }
    }

    fn with_rng<T>(&self, f: impl FnOnce(&mut StdRng) -> T) -> T {
        match self.rng.lock() {
            Ok(mut rng) => f(&mut rng),
            // A poisoned RNG mutex only ever loses randomness quality.
            Err(poisoned) => f(&mut poisoned.into_inner()),
        }
    }

    /// One random sample, optionally conditioned on a target risk level.
    pub fn random_sample(&self, target: Option<RiskLevel>) -> RawSample {
        self.with_rng(|rng| {
            let profile = PROFILES[rng.gen_range(0..PROFILES.len())];
            let (temperature, humidity) = match target {
                Some(level) => environmental_conditions(rng, level),
                None => (rng.gen_range(15.0..45.0), rng.gen_range(20.0..95.0)),
            };
            let worker_id = format!("worker_{}", rng.gen_range(1000..10_000));
            build_sample(rng, &worker_id, &profile, temperature, humidity, 0.0)
        })
    }

    /// A batch of random samples following a fixed risk distribution
    /// (40 % safe, 30 % caution, 20 % warning, 10 % danger).
    pub fn random_batch(&self, count: usize) -> Vec<RawSample> {
        (0..count)
            .map(|i| {
                let target = self.with_rng(|rng| {
                    let roll: f64 = rng.gen();
                    if roll < 0.4 {
                        RiskLevel::Safe
                    } else if roll < 0.7 {
                        RiskLevel::Caution
                    } else if roll < 0.9 {
                        RiskLevel::Warning
                    } else {
                        RiskLevel::Danger
                    }
                });
                let mut sample = self.random_sample(Some(target));
                sample.insert("sample_index".into(), json!(i));
                sample
            })
            .collect()
    }

    /// Escalating scenario: conditions ramp from comfortable (22 °C, 45 %)
    /// to dangerous (42 °C, 85 %) over the duration.
    pub fn ramp_up(&self, duration_minutes: u32, interval_minutes: u32) -> Vec<RawSample> {
        self.ramp_scenario(duration_minutes, interval_minutes, false)
    }

    /// Recovery scenario: conditions ramp back down from dangerous to
    /// comfortable. Physiological recovery lags the environment.
    pub fn ramp_down(&self, duration_minutes: u32, interval_minutes: u32) -> Vec<RawSample> {
        self.ramp_scenario(duration_minutes, interval_minutes, true)
    }

    fn ramp_scenario(
        &self,
        duration_minutes: u32,
        interval_minutes: u32,
        descending: bool,
    ) -> Vec<RawSample> {
        let interval = interval_minutes.max(1);
        let steps = (duration_minutes / interval).max(2);
        let profile = self.with_rng(|rng| PROFILES[rng.gen_range(0..PROFILES.len())]);
        let scenario = if descending { "ramp_down" } else { "ramp_up" };

        (0..steps)
            .map(|step| {
                let progress = f64::from(step) / f64::from(steps - 1);
                let env_progress = if descending { 1.0 - progress } else { progress };
                let temperature = 22.0 + (42.0 - 22.0) * env_progress;
                let humidity = 45.0 + (85.0 - 45.0) * env_progress;
                // Recovery is slower than exposure.
                let strain_progress =
                    if descending { env_progress * 0.7 } else { env_progress };

                self.with_rng(|rng| {
                    let worker_id = format!(
                        "{scenario}_worker_{}_{}",
                        profile.age as u32, profile.gender as u32
                    );
                    let mut sample = build_sample(
                        rng,
                        &worker_id,
                        &profile,
                        temperature,
                        humidity,
                        strain_progress,
                    );
                    sample.insert("scenario_type".into(), json!(scenario));
                    sample.insert("time_minutes".into(), json!(step * interval));
                    sample.insert("scenario_progress".into(), json!(progress));
                    sample
                })
            })
            .collect()
    }
}

/// Environmental conditions for a target risk band.
fn environmental_conditions(rng: &mut StdRng, level: RiskLevel) -> (f64, f64) {
    match level {
        RiskLevel::Safe => (rng.gen_range(18.0..26.0), rng.gen_range(30.0..60.0)),
        RiskLevel::Caution => (rng.gen_range(26.0..32.0), rng.gen_range(50.0..75.0)),
        RiskLevel::Warning => (rng.gen_range(32.0..38.0), rng.gen_range(65.0..85.0)),
        RiskLevel::Danger => (rng.gen_range(38.0..45.0), rng.gen_range(70.0..95.0)),
    }
}

/// Physiological stress factor from conditions, profile, and accumulated
/// exposure. Clamped to [0.1, 2.0].
fn stress_factor(
    temperature: f64,
    humidity: f64,
    profile: &WorkerProfile,
    time_progress: f64,
) -> f64 {
    let temp_stress = ((temperature - 25.0) / 20.0).max(0.0);
    let humidity_multiplier = 1.0 + (humidity - 50.0) / 100.0;
    let env_stress = temp_stress * humidity_multiplier;

    let age_factor = 1.0 + (profile.age - 30.0) / 100.0;
    let fitness_factor = 1.0 - profile.fitness_level * 0.3;
    let tolerance_factor = 1.0 - profile.heat_tolerance * 0.4;
    let time_factor = 1.0 + time_progress * 0.5;

    (env_stress * age_factor * fitness_factor * tolerance_factor * time_factor).clamp(0.1, 2.0)
}

/// Build a full raw sample: demographics, environment, and an HRV block
/// responding to the stress factor.
fn build_sample(
    rng: &mut StdRng,
    worker_id: &str,
    profile: &WorkerProfile,
    temperature: f64,
    humidity: f64,
    time_progress: f64,
) -> RawSample {
    let stress = stress_factor(temperature, humidity, profile, time_progress);

    let mut sample = Map::new();
    sample.insert("worker_id".into(), json!(worker_id));
    sample.insert("age".into(), json!(profile.age));
    sample.insert("gender".into(), json!(profile.gender));
    sample.insert("temperature_c".into(), json!(round2(temperature)));
    sample.insert("humidity_pct".into(), json!(round2(humidity)));

    // Heart rate rises with stress, HRV falls.
    let heart_rate = (profile.base_heart_rate * (1.0 + stress * 0.4)).clamp(50.0, 180.0);
    let rmssd = (profile.base_hrv * (1.0 - stress * 0.6)).max(10.0);
    let mean_nni = 60_000.0 / heart_rate;

    let jitter = Normal::new(1.0, 0.03).map_or(1.0, |n| n.sample(rng));

    sample.insert("hrv_mean_hr".into(), json!(round2(heart_rate)));
    sample.insert("hrv_min_hr".into(), json!(round2((heart_rate * 0.85).clamp(45.0, 100.0))));
    sample.insert("hrv_max_hr".into(), json!(round2((heart_rate * 1.25).clamp(70.0, 180.0))));
    sample.insert("hrv_std_hr".into(), json!(round2((heart_rate * 0.15).clamp(5.0, 30.0))));
    sample.insert("hrv_mean_nni".into(), json!(round2(mean_nni)));
    sample.insert(
        "hrv_median_nni".into(),
        json!(round2((mean_nni * jitter).clamp(600.0, 1200.0))),
    );
    sample.insert("hrv_rmssd".into(), json!(round2(rmssd)));
    sample.insert("hrv_sdnn".into(), json!(round2((rmssd * rng.gen_range(1.5..2.5)).min(150.0))));
    sample.insert("hrv_sdsd".into(), json!(round2((rmssd * rng.gen_range(0.8..1.2)).min(100.0))));

    // Remaining HRV features: uniform in their canonical range, nudged by
    // stress the way real power/ratio metrics move.
    for spec in &schema::FEATURES {
        if !spec.name.starts_with("hrv_") || sample.contains_key(spec.name) {
            continue;
        }
        let base = rng.gen_range(spec.min..spec.max);
        let value = if spec.name.contains("power") || spec.name.contains("energy") {
            (base * (1.0 - stress * 0.3)).max(spec.min * 0.1)
        } else if spec.name.contains("ratio") {
            (base * (1.0 + stress * 0.2)).clamp(spec.min, spec.max)
        } else {
            let influence = rng.gen_range(-0.2..0.2) * stress;
            (base * (1.0 + influence)).clamp(spec.min, spec.max)
        };
        sample.insert(spec.name.into(), json!(round2(value)));
    }

    sample
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Number of schema features present in a generated sample (everything but
/// derived metadata keys).
pub fn schema_feature_count(sample: &Map<String, Value>) -> usize {
    sample.keys().filter(|k| schema::index_of(k).is_some()).count()
}
