//! Authentication extractors.
//!
//! [`ReadAccess`] and [`WriteAccess`] run the full admission flow — cached
//! credential validation, permission gate, sliding-window rate limit — from
//! the configured API-key header before the handler body executes.
//! Rejections render through the uniform error envelope.

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::response::{IntoResponse, Response};
use std::sync::Arc;

use crate::admission::{AuthContext, Permission, RateStatus};
use crate::api::AppContext;

/// Admitted request with read permission.
pub struct ReadAccess {
    pub auth: AuthContext,
    pub rate: RateStatus,
}

/// Admitted request with write permission.
pub struct WriteAccess {
    pub auth: AuthContext,
    pub rate: RateStatus,
}

async fn admit(
    parts: &Parts,
    state: &Arc<AppContext>,
    permission: Permission,
) -> Result<(AuthContext, RateStatus), Response> {
    let presented = parts
        .headers
        .get(state.settings.api_key_header.as_str())
        .and_then(|value| value.to_str().ok());

    state
        .admission
        .admit(presented, permission)
        .await
        .map_err(IntoResponse::into_response)
}

#[async_trait]
impl FromRequestParts<Arc<AppContext>> for ReadAccess {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppContext>,
    ) -> Result<Self, Self::Rejection> {
        let (auth, rate) = admit(parts, state, Permission::Read).await?;
        Ok(Self { auth, rate })
    }
}

#[async_trait]
impl FromRequestParts<Arc<AppContext>> for WriteAccess {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppContext>,
    ) -> Result<Self, Self::Rejection> {
        let (auth, rate) = admit(parts, state, Permission::Write).await?;
        Ok(Self { auth, rate })
    }
}
