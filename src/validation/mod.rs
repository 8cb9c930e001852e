//! Input validation for scoring requests.
//!
//! Turns loosely-typed wire records into [`ValidatedSample`]s: required
//! fields must be present and coercible to finite numbers, optional fields
//! fall back to schema defaults with a warning, out-of-range values are
//! clamped with a warning so the model always receives a usable vector.
//! Only two business rules fail outright: implausible worker age and
//! impossible humidity.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

use crate::error::{ServiceError, ServiceResult};
use crate::schema;
use crate::types::{RawSample, ValidatedSample};

/// Extended clamp bounds for the physiologically validated features. Other
/// features clamp to their canonical schema range.
fn validation_bounds(name: &str) -> Option<(f64, f64)> {
    match name {
        "gender" => Some((0.0, 1.0)),
        "age" => Some((16.0, 80.0)),
        "temperature_c" => Some((-50.0, 70.0)),
        "humidity_pct" => Some((0.0, 100.0)),
        "hrv_mean_hr" => Some((30.0, 220.0)),
        "hrv_mean_nni" => Some((200.0, 2000.0)),
        _ => schema::range(name),
    }
}

fn worker_id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        #[allow(clippy::unwrap_used)] // literal pattern, cannot fail
        Regex::new(r"[^A-Za-z0-9._-]").unwrap()
    })
}

/// Strictly increasing millisecond counter for generated worker ids.
fn next_worker_millis() -> i64 {
    static LAST: AtomicI64 = AtomicI64::new(0);
    let now = chrono::Utc::now().timestamp_millis();
    let mut prev = LAST.load(Ordering::Relaxed);
    loop {
        let next = now.max(prev + 1);
        match LAST.compare_exchange_weak(prev, next, Ordering::Relaxed, Ordering::Relaxed) {
            Ok(_) => return next,
            Err(observed) => prev = observed,
        }
    }
}

/// Outcome of validating a batch: the surviving samples with their original
/// indices, per-index failures, and accumulated warnings.
#[derive(Debug)]
pub struct BatchValidation {
    pub valid: Vec<(usize, ValidatedSample)>,
    pub failures: Vec<(usize, String)>,
    pub warnings: Vec<String>,
}

/// Validates raw worker samples against the feature schema.
#[derive(Debug, Clone, Default)]
pub struct Validator;

impl Validator {
    pub fn new() -> Self {
        Self
    }

    /// Validate a single raw sample.
    ///
    /// Returns the cleaned sample and its warnings, or a validation error
    /// when a required field is missing/uncoercible or a business rule
    /// fails.
    pub fn validate_single(&self, raw: &RawSample) -> ServiceResult<ValidatedSample> {
        let mut errors: Vec<String> = Vec::new();
        let mut warnings: Vec<String> = Vec::new();
        let mut values: HashMap<&'static str, f64> = HashMap::with_capacity(schema::FEATURE_COUNT);
        let mut defaulted: HashSet<&'static str> = HashSet::new();

        let worker_id = self.resolve_worker_id(raw, &mut warnings);

        // Coerce every schema feature, collecting raw values for the
        // business-rule pass before any clamping.
        let mut raw_coerced: HashMap<&'static str, f64> = HashMap::new();
        for spec in &schema::FEATURES {
            let name = spec.name;
            match raw.get(name) {
                Some(value) => match coerce_numeric(value) {
                    Coerced::Finite(v) => {
                        raw_coerced.insert(name, v);
                    }
                    Coerced::Empty => {
                        if spec.required {
                            errors.push(format!("required feature '{name}' is missing"));
                        } else {
                            defaulted.insert(name);
                            warnings.push(format!("using default value for optional feature '{name}'"));
                        }
                    }
                    Coerced::Invalid => {
                        if spec.required {
                            errors.push(format!("required feature '{name}' is not numeric"));
                        } else {
                            defaulted.insert(name);
                            warnings.push(format!(
                                "feature '{name}' is not a finite number, using default"
                            ));
                        }
                    }
                },
                None => {
                    if spec.required {
                        errors.push(format!("required feature '{name}' is missing"));
                    } else {
                        defaulted.insert(name);
                    }
                }
            }
        }

        // Business rules run on raw coerced values, before clamping.
        self.check_business_rules(&raw_coerced, &mut errors, &mut warnings);

        if !errors.is_empty() {
            return Err(ServiceError::Validation(errors.join("; ")));
        }

        // Clamp into validated bounds and assemble the final record.
        for spec in &schema::FEATURES {
            let name = spec.name;
            let value = match raw_coerced.get(name) {
                Some(&v) => {
                    if let Some((lo, hi)) = validation_bounds(name) {
                        if v < lo || v > hi {
                            warnings.push(format!(
                                "feature '{name}' value {v} outside expected range [{lo}, {hi}], clamped"
                            ));
                            v.clamp(lo, hi)
                        } else {
                            v
                        }
                    } else {
                        v
                    }
                }
                None => schema::default_value(name),
            };
            values.insert(name, value);
        }

        Ok(ValidatedSample { worker_id, values, defaulted, warnings })
    }

    /// Validate a batch of raw samples.
    ///
    /// Individual failures are recorded per index; the whole batch fails
    /// only when it is empty, exceeds `max_size`, or no item validates.
    pub fn validate_batch(
        &self,
        raw: &[RawSample],
        max_size: usize,
    ) -> ServiceResult<BatchValidation> {
        if raw.is_empty() {
            return Err(ServiceError::Validation("batch input cannot be empty".into()));
        }
        if raw.len() > max_size {
            return Err(ServiceError::Validation(format!(
                "batch size {} exceeds maximum limit of {max_size}",
                raw.len()
            )));
        }

        let mut valid = Vec::with_capacity(raw.len());
        let mut failures = Vec::new();
        let mut warnings = Vec::new();

        for (index, item) in raw.iter().enumerate() {
            match self.validate_single(item) {
                Ok(sample) => {
                    for w in &sample.warnings {
                        warnings.push(format!("item {index}: {w}"));
                    }
                    valid.push((index, sample));
                }
                Err(err) => {
                    warnings.push(format!("item {index} validation failed: {err}"));
                    failures.push((index, err.to_string()));
                }
            }
        }

        if valid.is_empty() {
            return Err(ServiceError::Validation("all items in batch failed validation".into()));
        }

        Ok(BatchValidation { valid, failures, warnings })
    }

    /// Sanitize a worker id: strip disallowed characters, bound the length.
    /// Idempotent by construction.
    pub fn sanitize_worker_id(&self, raw: &str) -> String {
        let trimmed = raw.trim();
        let mut sanitized = worker_id_pattern().replace_all(trimmed, "_").into_owned();
        sanitized.truncate(100);
        sanitized
    }

    fn resolve_worker_id(&self, raw: &RawSample, warnings: &mut Vec<String>) -> String {
        match raw.get("worker_id") {
            Some(Value::String(s)) if !s.trim().is_empty() => {
                let sanitized = self.sanitize_worker_id(s);
                if sanitized != s.trim() {
                    warnings.push("worker_id contained invalid characters and was sanitized".into());
                }
                if sanitized.is_empty() {
                    warnings.push("worker_id empty after sanitization, generated automatically".into());
                    format!("worker_{}", next_worker_millis())
                } else {
                    sanitized
                }
            }
            Some(Value::Number(n)) => format!("worker_{n}"),
            _ => {
                warnings.push("no worker_id provided, generated automatically".into());
                format!("worker_{}", next_worker_millis())
            }
        }
    }

    fn check_business_rules(
        &self,
        raw: &HashMap<&'static str, f64>,
        errors: &mut Vec<String>,
        warnings: &mut Vec<String>,
    ) {
        if let Some(&age) = raw.get("age") {
            if age < 16.0 {
                errors.push("worker age must be at least 16 years".into());
            } else if age > 80.0 {
                warnings.push(format!("unusual age value: {age} years"));
            }
        }
        if let Some(&humidity) = raw.get("humidity_pct") {
            if !(0.0..=100.0).contains(&humidity) {
                errors.push(format!("humidity must be between 0-100%, got {humidity}%"));
            }
        }
        if let Some(&temp) = raw.get("temperature_c") {
            if temp.abs() > 50.0 {
                warnings.push(format!("extreme temperature: {temp}°C"));
            }
        }
        if let Some(&hr) = raw.get("hrv_mean_hr") {
            if hr < 30.0 {
                warnings.push(format!("unusually low heart rate: {hr} BPM"));
            } else if hr > 220.0 {
                warnings.push(format!("unusually high heart rate: {hr} BPM"));
            }
        }
    }

    /// Summary of validation rules, surfaced by the detailed health endpoint.
    pub fn summary(&self, max_batch_size: usize) -> serde_json::Value {
        serde_json::json!({
            "required_features": schema::required().collect::<Vec<_>>(),
            "total_features": schema::FEATURE_COUNT,
            "max_batch_size": max_batch_size,
            "supported_formats": ["object", "list_of_objects"],
        })
    }
}

/// Result of coercing a JSON value to a finite float.
enum Coerced {
    Finite(f64),
    /// Null or blank string: treat as absent.
    Empty,
    /// Present but not a finite number.
    Invalid,
}

fn coerce_numeric(value: &Value) -> Coerced {
    match value {
        Value::Number(n) => match n.as_f64() {
            Some(v) if v.is_finite() => Coerced::Finite(v),
            _ => Coerced::Invalid,
        },
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                Coerced::Empty
            } else {
                match trimmed.parse::<f64>() {
                    Ok(v) if v.is_finite() => Coerced::Finite(v),
                    _ => Coerced::Invalid,
                }
            }
        }
        Value::Bool(b) => Coerced::Finite(f64::from(u8::from(*b))),
        Value::Null => Coerced::Empty,
        _ => Coerced::Invalid,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn base_sample() -> RawSample {
        let value = json!({
            "worker_id": "worker-001",
            "gender": 1,
            "age": 30,
            "temperature_c": 25.0,
            "humidity_pct": 50.0,
            "hrv_mean_hr": 75.0,
            "hrv_mean_nni": 800.0,
        });
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn accepts_complete_sample() {
        let validator = Validator::new();
        let sample = validator.validate_single(&base_sample()).expect("valid");
        assert_eq!(sample.worker_id, "worker-001");
        assert!((sample.get("age") - 30.0).abs() < f64::EPSILON);
        assert!(sample.supplied("hrv_mean_hr"));
        assert!(!sample.supplied("hrv_rmssd"));
    }

    #[test]
    fn missing_required_field_fails() {
        let validator = Validator::new();
        let mut raw = base_sample();
        raw.remove("temperature_c");
        let err = validator.validate_single(&raw).expect_err("must fail");
        assert!(err.to_string().contains("temperature_c"));
    }

    #[test]
    fn underage_worker_fails() {
        let validator = Validator::new();
        let mut raw = base_sample();
        raw.insert("age".into(), json!(15));
        assert!(validator.validate_single(&raw).is_err());
    }

    #[test]
    fn impossible_humidity_fails() {
        let validator = Validator::new();
        let mut raw = base_sample();
        raw.insert("humidity_pct".into(), json!(120.0));
        assert!(validator.validate_single(&raw).is_err());
    }

    #[test]
    fn out_of_range_value_clamps_with_warning() {
        let validator = Validator::new();
        let mut raw = base_sample();
        raw.insert("hrv_mean_hr".into(), json!(250.0));
        let sample = validator.validate_single(&raw).expect("valid");
        assert!((sample.get("hrv_mean_hr") - 220.0).abs() < f64::EPSILON);
        assert!(sample.warnings.iter().any(|w| w.contains("clamped")));
        assert!(sample.warnings.iter().any(|w| w.contains("unusually high heart rate")));
    }

    #[test]
    fn non_numeric_optional_defaults_with_warning() {
        let validator = Validator::new();
        let mut raw = base_sample();
        raw.insert("hrv_rmssd".into(), json!("not-a-number"));
        let sample = validator.validate_single(&raw).expect("valid");
        assert!(sample.defaulted.contains("hrv_rmssd"));
        assert!(sample.warnings.iter().any(|w| w.contains("hrv_rmssd")));
    }

    #[test]
    fn string_numbers_coerce() {
        let validator = Validator::new();
        let mut raw = base_sample();
        raw.insert("age".into(), json!("42"));
        let sample = validator.validate_single(&raw).expect("valid");
        assert!((sample.get("age") - 42.0).abs() < f64::EPSILON);
    }

    #[test]
    fn worker_id_sanitization_is_idempotent() {
        let validator = Validator::new();
        let once = validator.sanitize_worker_id("crew/7 alpha!");
        let twice = validator.sanitize_worker_id(&once);
        assert_eq!(once, twice);
        assert_eq!(once, "crew_7_alpha_");
    }

    #[test]
    fn missing_worker_id_generates_monotonic_ids() {
        let validator = Validator::new();
        let mut raw = base_sample();
        raw.remove("worker_id");
        let a = validator.validate_single(&raw).expect("valid").worker_id;
        let b = validator.validate_single(&raw).expect("valid").worker_id;
        assert!(a.starts_with("worker_"));
        assert_ne!(a, b);
    }

    #[test]
    fn empty_batch_rejected() {
        let validator = Validator::new();
        assert!(validator.validate_batch(&[], 1000).is_err());
    }

    #[test]
    fn oversize_batch_rejected() {
        let validator = Validator::new();
        let batch = vec![base_sample(); 3];
        assert!(validator.validate_batch(&batch, 2).is_err());
    }

    #[test]
    fn partial_batch_survives_item_failures() {
        let validator = Validator::new();
        let mut bad = base_sample();
        bad.insert("age".into(), json!(12));
        let batch = vec![base_sample(), bad, base_sample()];
        let outcome = validator.validate_batch(&batch, 1000).expect("batch ok");
        assert_eq!(outcome.valid.len(), 2);
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].0, 1);
        assert_eq!(outcome.valid[0].0, 0);
        assert_eq!(outcome.valid[1].0, 2);
    }

    #[test]
    fn all_items_failing_rejects_batch() {
        let validator = Validator::new();
        let mut bad = base_sample();
        bad.insert("humidity_pct".into(), json!(-5.0));
        let batch = vec![bad.clone(), bad];
        assert!(validator.validate_batch(&batch, 1000).is_err());
    }
}
