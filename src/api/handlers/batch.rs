//! Async batch job handlers.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::api::auth::{ReadAccess, WriteAccess};
use crate::api::AppContext;
use crate::error::{ServiceError, ServiceResult};
use crate::scheduler::JobResults;
use crate::types::{JobOptions, JobSnapshot, JobStatus, RawSample};

/// Body for `POST /api/v1/predict_batch_async`.
#[derive(Debug, Deserialize)]
pub struct AsyncBatchRequest {
    pub data: Vec<RawSample>,
    #[serde(default)]
    pub options: Option<JobOptions>,
}

/// `202 Accepted` body for an async submission.
#[derive(Debug, Serialize)]
pub struct AsyncBatchAccepted {
    pub job_id: String,
    pub status: &'static str,
    pub batch_size: usize,
    pub timestamp: chrono::DateTime<Utc>,
}

/// Query parameters for `GET /api/v1/batch_jobs`.
#[derive(Debug, Deserialize)]
pub struct ListJobsQuery {
    pub status: Option<JobStatus>,
    #[serde(default = "default_list_limit")]
    pub limit: usize,
}

fn default_list_limit() -> usize {
    50
}

#[derive(Debug, Serialize)]
pub struct JobListResponse {
    pub jobs: Vec<JobSnapshot>,
    pub count: usize,
    pub timestamp: chrono::DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct CancelResponse {
    pub job_id: String,
    pub status: JobStatus,
    pub timestamp: chrono::DateTime<Utc>,
}

/// `POST /api/v1/predict_batch_async` — submit a large batch for
/// background execution.
pub async fn submit_async_batch(
    State(ctx): State<Arc<AppContext>>,
    _access: ReadAccess,
    Json(request): Json<AsyncBatchRequest>,
) -> ServiceResult<impl IntoResponse> {
    let batch_size = request.data.len();
    let job_id = ctx.scheduler.submit(request.data, request.options.unwrap_or_default())?;
    Ok((
        StatusCode::ACCEPTED,
        Json(AsyncBatchAccepted {
            job_id,
            status: "submitted",
            batch_size,
            timestamp: Utc::now(),
        }),
    ))
}

/// `GET /api/v1/batch_status/{job_id}` — progress snapshot.
pub async fn batch_status(
    State(ctx): State<Arc<AppContext>>,
    _access: ReadAccess,
    Path(job_id): Path<String>,
) -> ServiceResult<Json<JobSnapshot>> {
    Ok(Json(ctx.scheduler.status(&job_id)?))
}

/// `GET /api/v1/batch_results/{job_id}` — results (partial for cancelled
/// jobs).
pub async fn batch_results(
    State(ctx): State<Arc<AppContext>>,
    _access: ReadAccess,
    Path(job_id): Path<String>,
) -> ServiceResult<Json<JobResults>> {
    Ok(Json(ctx.scheduler.results(&job_id)?))
}

/// `DELETE /api/v1/batch_job/{job_id}` — cooperative cancellation.
pub async fn cancel_batch_job(
    State(ctx): State<Arc<AppContext>>,
    _access: WriteAccess,
    Path(job_id): Path<String>,
) -> ServiceResult<Json<CancelResponse>> {
    let snapshot = ctx.scheduler.cancel(&job_id)?;
    Ok(Json(CancelResponse {
        job_id: snapshot.job_id,
        status: snapshot.status,
        timestamp: Utc::now(),
    }))
}

/// `GET /api/v1/batch_jobs` — list jobs, optionally filtered by status.
pub async fn list_batch_jobs(
    State(ctx): State<Arc<AppContext>>,
    _access: ReadAccess,
    Query(query): Query<ListJobsQuery>,
) -> ServiceResult<Json<JobListResponse>> {
    if query.limit == 0 {
        return Err(ServiceError::Validation("limit must be positive".into()));
    }
    let jobs = ctx.scheduler.list(query.status, query.limit.min(500));
    let count = jobs.len();
    Ok(Json(JobListResponse { jobs, count, timestamp: Utc::now() }))
}
