//! Synchronous scoring handlers.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Deserialize;

use crate::api::auth::ReadAccess;
use crate::api::AppContext;
use crate::error::{ServiceError, ServiceResult};
use crate::service::{RequestContext, ScoreOptions};
use crate::types::{BatchResponse, PredictionResult, RawSample};

/// Body for `POST /api/v1/predict`.
#[derive(Debug, Deserialize)]
pub struct PredictRequest {
    pub data: RawSample,
    #[serde(default)]
    pub options: Option<ScoreOptions>,
}

/// Body for `POST /api/v1/predict_batch`.
#[derive(Debug, Deserialize)]
pub struct PredictBatchRequest {
    pub data: Vec<RawSample>,
    #[serde(default)]
    pub options: Option<ScoreOptions>,
}

/// `POST /api/v1/predict` — score one worker sample.
pub async fn predict(
    State(ctx): State<Arc<AppContext>>,
    access: ReadAccess,
    Json(request): Json<PredictRequest>,
) -> ServiceResult<Json<PredictionResult>> {
    let request_ctx = RequestContext::new(
        "single",
        Some(ctx.scoring.default_timeout()),
        Some(access.auth.credential_hash.clone()),
    );
    let options = request.options.unwrap_or_default();
    let result = ctx.scoring.predict_single(&request_ctx, &request.data, options).await?;
    Ok(Json(result))
}

/// `POST /api/v1/predict_batch` — synchronous batch scoring (≤ configured
/// cap).
pub async fn predict_batch(
    State(ctx): State<Arc<AppContext>>,
    access: ReadAccess,
    Json(request): Json<PredictBatchRequest>,
) -> ServiceResult<Json<BatchResponse>> {
    if request.data.is_empty() {
        return Err(ServiceError::Validation("batch input cannot be empty".into()));
    }
    let request_ctx = RequestContext::new(
        "batch",
        Some(ctx.scoring.default_timeout()),
        Some(access.auth.credential_hash.clone()),
    );
    let options = request.options.unwrap_or_default();
    let response = ctx.scoring.predict_many(&request_ctx, &request.data, options).await?;
    Ok(Json(response))
}
