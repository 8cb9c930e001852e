//! The production inference artifact: a linear softmax classifier.
//!
//! On disk the artifact is a single `model.json` holding per-class weight
//! rows over the 50 schema features, a bias vector, and ordered class
//! labels. Shapes and feature ordering are verified at load time so a
//! mismatched artifact fails fast instead of silently mis-scoring.

use std::path::Path;

use serde::Deserialize;

use crate::error::{ServiceError, ServiceResult};
use crate::model::{Inference, InferenceModel};
use crate::schema;

/// Artifact file name inside a model directory.
const ARTIFACT_FILE: &str = "model.json";

#[derive(Debug, Deserialize)]
struct ArtifactFile {
    classes: Vec<String>,
    feature_names: Vec<String>,
    /// One weight row per class, each `feature_names.len()` wide.
    weights: Vec<Vec<f64>>,
    bias: Vec<f64>,
}

/// Linear softmax classifier over the canonical feature vector.
#[derive(Debug)]
pub struct SoftmaxModel {
    classes: Vec<String>,
    weights: Vec<Vec<f64>>,
    bias: Vec<f64>,
}

impl SoftmaxModel {
    /// Load and verify an artifact from `<dir>/model.json`.
    pub fn load(dir: &Path) -> ServiceResult<Self> {
        let path = dir.join(ARTIFACT_FILE);
        let raw = std::fs::read_to_string(&path).map_err(|err| {
            ServiceError::ModelUnavailable(format!(
                "cannot read artifact {}: {err}",
                path.display()
            ))
        })?;
        let file: ArtifactFile = serde_json::from_str(&raw).map_err(|err| {
            ServiceError::ModelUnavailable(format!(
                "malformed artifact {}: {err}",
                path.display()
            ))
        })?;
        Self::from_parts(file)
    }

    fn from_parts(file: ArtifactFile) -> ServiceResult<Self> {
        if file.classes.len() < 2 {
            return Err(ServiceError::ModelUnavailable(
                "artifact must define at least two classes".into(),
            ));
        }
        if file.feature_names.len() != schema::FEATURE_COUNT {
            return Err(ServiceError::ModelUnavailable(format!(
                "artifact has {} features, schema expects {}",
                file.feature_names.len(),
                schema::FEATURE_COUNT
            )));
        }
        for (i, name) in file.feature_names.iter().enumerate() {
            if schema::index_of(name) != Some(i) {
                return Err(ServiceError::ModelUnavailable(format!(
                    "artifact feature '{name}' at position {i} does not match schema ordering"
                )));
            }
        }
        if file.weights.len() != file.classes.len() || file.bias.len() != file.classes.len() {
            return Err(ServiceError::ModelUnavailable(
                "artifact weight/bias shape does not match class count".into(),
            ));
        }
        if file.weights.iter().any(|row| row.len() != schema::FEATURE_COUNT) {
            return Err(ServiceError::ModelUnavailable(
                "artifact weight rows must match schema width".into(),
            ));
        }
        Ok(Self { classes: file.classes, weights: file.weights, bias: file.bias })
    }
}

impl InferenceModel for SoftmaxModel {
    fn predict(&self, vector: &[f64]) -> ServiceResult<Inference> {
        let logits: Vec<f64> = self
            .weights
            .iter()
            .zip(&self.bias)
            .map(|(row, b)| row.iter().zip(vector).map(|(w, x)| w * x).sum::<f64>() + b)
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
        "softmax_artifact"
    }
}

/// Numerically stable softmax plus argmax.
pub(crate) fn softmax_inference(logits: &[f64]) -> Inference {
    let max_logit = logits.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = logits.iter().map(|l| (l - max_logit).exp()).collect();
    let total: f64 = exps.iter().sum();
    let probabilities: Vec<f64> = exps.iter().map(|e| e / total).collect();
    let class_index = probabilities
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
        .map_or(0, |(i, _)| i);
    Inference { class_index, probabilities }
}
