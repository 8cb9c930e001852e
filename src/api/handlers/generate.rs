//! Fixture generation handlers.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::api::auth::ReadAccess;
use crate::api::AppContext;
use crate::error::{ServiceError, ServiceResult};
use crate::types::{RawSample, RiskLevel};

/// Query parameters for `GET /api/v1/generate_random`.
#[derive(Debug, Deserialize)]
pub struct GenerateRandomQuery {
    #[serde(default = "default_count")]
    pub count: usize,
    pub risk_level: Option<RiskLevel>,
}

fn default_count() -> usize {
    10
}

/// Query parameters for the ramp scenarios.
#[derive(Debug, Deserialize)]
pub struct RampQuery {
    #[serde(default = "default_duration")]
    pub duration_minutes: u32,
    #[serde(default = "default_interval")]
    pub interval_minutes: u32,
}

fn default_duration() -> u32 {
    60
}

fn default_interval() -> u32 {
    5
}

#[derive(Debug, Serialize)]
pub struct GeneratedData {
    pub data: Vec<RawSample>,
    pub count: usize,
    pub scenario: &'static str,
    pub timestamp: chrono::DateTime<Utc>,
}

const MAX_GENERATED: usize = 1000;

/// `GET /api/v1/generate_random` — random fixture samples.
pub async fn generate_random(
    State(ctx): State<Arc<AppContext>>,
    _access: ReadAccess,
    Query(query): Query<GenerateRandomQuery>,
) -> ServiceResult<Json<GeneratedData>> {
    if query.count == 0 || query.count > MAX_GENERATED {
        return Err(ServiceError::Validation(format!(
            "count must be between 1 and {MAX_GENERATED}"
        )));
    }
    let data = match query.risk_level {
        Some(level) => {
            (0..query.count).map(|_| ctx.generator.random_sample(Some(level))).collect()
        }
        None => ctx.generator.random_batch(query.count),
    };
    let count = data.len();
    Ok(Json(GeneratedData { data, count, scenario: "random", timestamp: Utc::now() }))
}

/// `GET /api/v1/generate_ramp_up` — escalating heat scenario.
pub async fn generate_ramp_up(
    State(ctx): State<Arc<AppContext>>,
    _access: ReadAccess,
    Query(query): Query<RampQuery>,
) -> ServiceResult<Json<GeneratedData>> {
    validate_ramp(&query)?;
    let data = ctx.generator.ramp_up(query.duration_minutes, query.interval_minutes);
    let count = data.len();
    Ok(Json(GeneratedData { data, count, scenario: "ramp_up", timestamp: Utc::now() }))
}

/// `GET /api/v1/generate_ramp_down` — recovery scenario.
pub async fn generate_ramp_down(
    State(ctx): State<Arc<AppContext>>,
    _access: ReadAccess,
    Query(query): Query<RampQuery>,
) -> ServiceResult<Json<GeneratedData>> {
    validate_ramp(&query)?;
    let data = ctx.generator.ramp_down(query.duration_minutes, query.interval_minutes);
    let count = data.len();
    Ok(Json(GeneratedData { data, count, scenario: "ramp_down", timestamp: Utc::now() }))
}

fn validate_ramp(query: &RampQuery) -> ServiceResult<()> {
    if query.interval_minutes == 0 || query.duration_minutes == 0 {
        return Err(ServiceError::Validation(
            "duration_minutes and interval_minutes must be positive".into(),
        ));
    }
    if query.duration_minutes / query.interval_minutes > MAX_GENERATED as u32 {
        return Err(ServiceError::Validation(format!(
            "scenario would exceed {MAX_GENERATED} samples"
        )));
    }
    Ok(())
}
