//! Identity reconciliation route

use axum::{extract::rejection::JsonRejection, extract::State, Json};
use tracing::debug;

use crate::api::types::{IdentifyRequest, IdentifyResponse};
use crate::api::ApiState;
use crate::error::{Error, Result};
use crate::metrics;
use crate::resolution::{ContactQuery, ResponseAggregator};

/// Reconcile one observed (email, phone) pair and return its cluster
pub async fn identify(
    State(state): State<ApiState>,
    payload: std::result::Result<Json<IdentifyRequest>, JsonRejection>,
) -> Result<Json<IdentifyResponse>> {
    let result = resolve_request(&state, payload).await;

    let status = match &result {
        Ok(_) => 200,
        Err(e) => e.status_code().as_u16(),
    };
    metrics::record_http_request(status);

    result.map(Json)
}

async fn resolve_request(
    state: &ApiState,
    payload: std::result::Result<Json<IdentifyRequest>, JsonRejection>,
) -> Result<IdentifyResponse> {
    let Json(request) = payload.map_err(|rejection| Error::InvalidRequest {
        message: rejection.body_text(),
    })?;

    let phone_number = request.phone_number.map(|p| p.into_text());
    let query = ContactQuery::new(request.email.as_deref(), phone_number.as_deref())?;
    debug!(email = %query.email(), phone_number = %query.phone_number(), "Identify request accepted");

    let cluster = state.resolver.resolve(&query).await?;
    Ok(ResponseAggregator::summarize(&cluster))
}
