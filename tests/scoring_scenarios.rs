//! End-to-end scoring scenarios against the deterministic synthetic model.
//!
//! The concrete envelopes: a comfortable baseline stays Safe, moderate heat
//! with an elevated pulse lands in the caution band, and saturating heat
//! with cardiovascular strain is an unambiguous Danger.

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::{harness, DEMO_KEY};
use heatguard::scheduler::SchedulerConfig;
use tower::ServiceExt;

async fn predict(data: serde_json::Value) -> serde_json::Value {
    let harness = harness(true, SchedulerConfig::default());
    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/predict")
        .header("content-type", "application/json")
        .header("x-api-key", DEMO_KEY)
        .body(Body::from(serde_json::json!({ "data": data }).to_string()))
        .unwrap();
    let response = harness.app().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn safe_baseline() {
    let result = predict(serde_json::json!({
        "worker_id": "baseline",
        "age": 30, "gender": 1,
        "temperature_c": 25.0, "humidity_pct": 50.0,
        "hrv_mean_hr": 75.0, "hrv_mean_nni": 800.0,
    }))
    .await;

    assert!(result["risk_score"].as_f64().unwrap() <= 0.25);
    assert_eq!(result["risk_level"], "Safe");
    assert_eq!(result["requires_immediate_attention"], false);
    let heat_index = result["heat_index_f"].as_f64().unwrap();
    assert!((heat_index - 77.0).abs() < 0.1, "heat index {heat_index}");
}

#[tokio::test]
async fn caution_envelope() {
    let result = predict(serde_json::json!({
        "worker_id": "caution",
        "age": 40, "gender": 0,
        "temperature_c": 30.0, "humidity_pct": 65.0,
        "hrv_mean_hr": 90.0, "hrv_mean_nni": 666.7,
        "hrv_rmssd": 25.0,
    }))
    .await;

    let score = result["risk_score"].as_f64().unwrap();
    assert!((0.25..0.75).contains(&score), "score {score} outside the caution envelope");
    let level = result["risk_level"].as_str().unwrap();
    assert!(level == "Caution" || level == "Warning", "level {level}");

    let recommendations = result["osha_recommendations"].as_array().unwrap();
    assert!(
        recommendations.iter().any(|r| r.as_str().unwrap().contains("water intake")),
        "expected hydration advice in {recommendations:?}"
    );
}

#[tokio::test]
async fn danger_scenario() {
    let result = predict(serde_json::json!({
        "worker_id": "danger",
        "age": 55, "gender": 1,
        "temperature_c": 43.0, "humidity_pct": 90.0,
        "hrv_mean_hr": 150.0, "hrv_mean_nni": 400.0,
        "hrv_rmssd": 8.0,
    }))
    .await;

    assert!(result["risk_score"].as_f64().unwrap() >= 0.75);
    assert_eq!(result["risk_level"], "Danger");
    assert_eq!(result["requires_immediate_attention"], true);
    assert!(result["heat_index_f"].as_f64().unwrap() >= 130.0);

    let recommendations = result["osha_recommendations"].as_array().unwrap();
    let text = recommendations
        .iter()
        .map(|r| r.as_str().unwrap())
        .collect::<Vec<_>>()
        .join(" | ");
    assert!(text.contains("STOP strenuous outdoor work"), "{text}");
    assert!(text.contains("medical personnel"), "{text}");
}

#[tokio::test]
async fn conservative_bias_dominates_standard_score() {
    let data = serde_json::json!({
        "age": 35, "gender": 1,
        "temperature_c": 31.0, "humidity_pct": 60.0,
        "hrv_mean_hr": 95.0, "hrv_mean_nni": 632.0,
    });

    let harness = harness(true, SchedulerConfig::default());
    for (use_conservative, expect_applied) in [(true, true), (false, false)] {
        let request = Request::builder()
            .method("POST")
            .uri("/api/v1/predict")
            .header("content-type", "application/json")
            .header("x-api-key", DEMO_KEY)
            .body(Body::from(
                serde_json::json!({
                    "data": data,
                    "options": { "use_conservative": use_conservative }
                })
                .to_string(),
            ))
            .unwrap();
        let response = harness.app().oneshot(request).await.unwrap();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let result: serde_json::Value = serde_json::from_slice(&bytes).unwrap();

        assert_eq!(result["conservative_bias_applied"], expect_applied);
        let score = result["risk_score"].as_f64().unwrap();
        let standard = result["risk_score_standard"].as_f64().unwrap();
        if expect_applied {
            assert!(score >= standard);
            assert!((score - (standard + 0.15).min(1.0)).abs() < 1e-9);
        } else {
            assert!((score - standard).abs() < 1e-9);
        }
    }
}

#[tokio::test]
async fn identical_requests_are_deterministic() {
    let data = serde_json::json!({
        "worker_id": "repeat",
        "age": 45, "gender": 0,
        "temperature_c": 33.0, "humidity_pct": 70.0,
        "hrv_mean_hr": 100.0, "hrv_mean_nni": 600.0,
    });
    let a = predict(data.clone()).await;
    let b = predict(data).await;
    assert_eq!(a["risk_score"], b["risk_score"]);
    assert_eq!(a["risk_level"], b["risk_level"]);
    assert_eq!(a["class_probabilities"], b["class_probabilities"]);
}

#[tokio::test]
async fn defaulted_features_lower_data_quality() {
    // Minimal sample: only the required six features.
    let sparse = predict(serde_json::json!({
        "age": 30, "gender": 1,
        "temperature_c": 25.0, "humidity_pct": 50.0,
        "hrv_mean_hr": 75.0, "hrv_mean_nni": 800.0,
    }))
    .await;
    let sparse_quality = sparse["data_quality_score"].as_f64().unwrap();

    // The same sample with a handful of real HRV metrics supplied.
    let richer = predict(serde_json::json!({
        "age": 30, "gender": 1,
        "temperature_c": 25.0, "humidity_pct": 50.0,
        "hrv_mean_hr": 75.0, "hrv_mean_nni": 800.0,
        "hrv_rmssd": 42.0, "hrv_sdnn": 55.0, "hrv_sdsd": 38.0,
        "hrv_lf": 500.0, "hrv_hf": 400.0,
    }))
    .await;
    let richer_quality = richer["data_quality_score"].as_f64().unwrap();

    assert!(richer_quality > sparse_quality);
    assert!((0.0..=1.0).contains(&sparse_quality));
    assert!((0.0..=1.0).contains(&richer_quality));
}

#[tokio::test]
async fn out_of_range_vitals_clamp_with_warnings() {
    let result = predict(serde_json::json!({
        "age": 30, "gender": 1,
        "temperature_c": 25.0, "humidity_pct": 50.0,
        "hrv_mean_hr": 260.0, "hrv_mean_nni": 800.0,
    }))
    .await;
    let warnings = result["validation_warnings"].as_array().unwrap();
    assert!(
        warnings.iter().any(|w| w.as_str().unwrap().contains("clamped")),
        "expected clamp warning in {warnings:?}"
    );
}
