//! Async batch lifecycle over the HTTP surface: submission, progress,
//! terminal results, cancellation, and retention behavior.

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::{harness, worker_sample, DEMO_KEY};
use heatguard::scheduler::SchedulerConfig;
use std::time::Duration;
use tower::ServiceExt;

fn batch_body(count: usize, chunk_size: usize) -> serde_json::Value {
    let data: Vec<serde_json::Value> = (0..count)
        .map(|i| worker_sample(30.0, 1.0, 20.0 + (i % 20) as f64, 55.0, 80.0))
        .collect();
    serde_json::json!({
        "data": data,
        "options": { "chunk_size": chunk_size }
    })
}

fn post(uri: &str, body: &serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .header("x-api-key", DEMO_KEY)
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header("x-api-key", DEMO_KEY)
        .body(Body::empty())
        .unwrap()
}

fn delete(uri: &str) -> Request<Body> {
    Request::builder()
        .method("DELETE")
        .uri(uri)
        .header("x-api-key", DEMO_KEY)
        .body(Body::empty())
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn wait_for_terminal(
    harness: &common::TestHarness,
    job_id: &str,
) -> serde_json::Value {
    for _ in 0..600 {
        let response = harness
            .app()
            .oneshot(get(&format!("/api/v1/batch_status/{job_id}")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let status = body_json(response).await;
        let state = status["status"].as_str().unwrap().to_string();
        if state == "completed" || state == "failed" || state == "cancelled" {
            return status;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("job {job_id} never reached a terminal state");
}

#[tokio::test]
async fn async_batch_lifecycle_completes_in_order() {
    let harness = harness(true, SchedulerConfig::default());

    let response = harness
        .app()
        .oneshot(post("/api/v1/predict_batch_async", &batch_body(500, 50)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let accepted = body_json(response).await;
    assert_eq!(accepted["status"], "submitted");
    assert_eq!(accepted["batch_size"], 500);
    let job_id = accepted["job_id"].as_str().unwrap().to_string();

    let status = wait_for_terminal(&harness, &job_id).await;
    assert_eq!(status["status"], "completed");
    assert_eq!(status["progress"]["total"], 500);
    assert_eq!(status["progress"]["processed"], 500);

    // Results carry all 500 items in input order.
    let response = harness
        .app()
        .oneshot(get(&format!("/api/v1/batch_results/{job_id}")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let results = body_json(response).await;
    let items = results["results"].as_array().unwrap();
    assert_eq!(items.len(), 500);
    for (i, item) in items.iter().enumerate() {
        assert_eq!(item["batch_index"].as_u64().unwrap() as usize, i);
    }

    // A second status poll after completion still returns Completed.
    let status = wait_for_terminal(&harness, &job_id).await;
    assert_eq!(status["status"], "completed");
}

#[tokio::test]
async fn cancellation_keeps_chunk_aligned_partials() {
    let harness = harness(true, SchedulerConfig::default());

    let response = harness
        .app()
        .oneshot(post("/api/v1/predict_batch_async", &batch_body(1000, 10)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let accepted = body_json(response).await;
    let job_id = accepted["job_id"].as_str().unwrap().to_string();

    tokio::time::sleep(Duration::from_millis(100)).await;
    let response = harness
        .app()
        .oneshot(delete(&format!("/api/v1/batch_job/{job_id}")))
        .await
        .unwrap();

    // A fast machine may already have finished the job; only assert
    // cancellation semantics when the cancel landed.
    if response.status() == StatusCode::OK {
        let cancelled = body_json(response).await;
        assert_eq!(cancelled["status"], "cancelled");

        let status = wait_for_terminal(&harness, &job_id).await;
        assert_eq!(status["status"], "cancelled");
        let processed = status["progress"]["processed"].as_u64().unwrap();
        assert_eq!(processed % 10, 0, "processed {processed} not chunk-aligned");

        // Partial results stay retrievable.
        let response = harness
            .app()
            .oneshot(get(&format!("/api/v1/batch_results/{job_id}")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let results = body_json(response).await;
        assert_eq!(results["results"].as_array().unwrap().len() as u64, processed);
    } else {
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }
}

#[tokio::test]
async fn cancelling_completed_job_is_conflict() {
    let harness = harness(true, SchedulerConfig::default());

    let response = harness
        .app()
        .oneshot(post("/api/v1/predict_batch_async", &batch_body(5, 10)))
        .await
        .unwrap();
    let accepted = body_json(response).await;
    let job_id = accepted["job_id"].as_str().unwrap().to_string();
    wait_for_terminal(&harness, &job_id).await;

    let response = harness
        .app()
        .oneshot(delete(&format!("/api/v1/batch_job/{job_id}")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body = body_json(response).await;
    assert_eq!(body["error"], "conflict");
}

#[tokio::test]
async fn batch_at_configured_cap_is_accepted_and_completes() {
    let config = SchedulerConfig { max_batch_size: 300, ..SchedulerConfig::default() };
    let harness = harness(true, config);

    let response = harness
        .app()
        .oneshot(post("/api/v1/predict_batch_async", &batch_body(300, 100)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let accepted = body_json(response).await;
    let job_id = accepted["job_id"].as_str().unwrap().to_string();

    let status = wait_for_terminal(&harness, &job_id).await;
    assert_eq!(status["status"], "completed");
    assert_eq!(status["progress"]["processed"], 300);
}

#[tokio::test]
async fn batch_above_cap_is_422() {
    let config = SchedulerConfig { max_batch_size: 100, ..SchedulerConfig::default() };
    let harness = harness(true, config);

    let response = harness
        .app()
        .oneshot(post("/api/v1/predict_batch_async", &batch_body(101, 50)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn queue_overflow_is_503_busy() {
    // Dispatcher capacity 1 and a queue limit of 1: the second submission
    // overflows while the first is still queued or running.
    let config = SchedulerConfig {
        queue_limit: 1,
        max_concurrent_jobs: 1,
        ..SchedulerConfig::default()
    };
    let harness = harness(true, config);

    let mut saw_busy = false;
    for _ in 0..5 {
        let response = harness
            .app()
            .oneshot(post("/api/v1/predict_batch_async", &batch_body(200, 10)))
            .await
            .unwrap();
        if response.status() == StatusCode::SERVICE_UNAVAILABLE {
            let body = body_json(response).await;
            assert_eq!(body["error"], "busy");
            saw_busy = true;
            break;
        }
        assert_eq!(response.status(), StatusCode::ACCEPTED);
    }
    assert!(saw_busy, "queue never reported Busy");
}

#[tokio::test]
async fn job_listing_includes_submitted_jobs() {
    let harness = harness(true, SchedulerConfig::default());

    let response = harness
        .app()
        .oneshot(post("/api/v1/predict_batch_async", &batch_body(5, 10)))
        .await
        .unwrap();
    let accepted = body_json(response).await;
    let job_id = accepted["job_id"].as_str().unwrap().to_string();
    wait_for_terminal(&harness, &job_id).await;

    let response = harness
        .app()
        .oneshot(get("/api/v1/batch_jobs?status=completed"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let jobs = body["jobs"].as_array().unwrap();
    assert!(jobs.iter().any(|j| j["job_id"] == job_id.as_str()));

    let response = harness
        .app()
        .oneshot(get("/api/v1/batch_jobs?status=cancelled"))
        .await
        .unwrap();
    let body = body_json(response).await;
    assert!(body["jobs"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn progress_is_monotone_while_running() {
    let harness = harness(true, SchedulerConfig::default());

    let response = harness
        .app()
        .oneshot(post("/api/v1/predict_batch_async", &batch_body(400, 20)))
        .await
        .unwrap();
    let accepted = body_json(response).await;
    let job_id = accepted["job_id"].as_str().unwrap().to_string();

    let mut last_processed = 0u64;
    for _ in 0..200 {
        let response = harness
            .app()
            .oneshot(get(&format!("/api/v1/batch_status/{job_id}")))
            .await
            .unwrap();
        let status = body_json(response).await;
        let processed = status["progress"]["processed"].as_u64().unwrap();
        assert!(processed >= last_processed, "progress regressed");
        last_processed = processed;
        if status["status"] == "completed" {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    let final_status = wait_for_terminal(&harness, &job_id).await;
    assert_eq!(final_status["progress"]["processed"], 400);
}
