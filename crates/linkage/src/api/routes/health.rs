//! Health check route

use axum::{extract::State, Json};

use crate::api::types::HealthResponse;
use crate::api::ApiState;
use crate::error::Result;

/// Report store reachability and the number of stored contacts
pub async fn health_check(State(state): State<ApiState>) -> Result<Json<HealthResponse>> {
    let store = state.resolver.store();
    store.health_check().await?;
    let contacts = store.count().await?;

    Ok(Json(HealthResponse {
        status: "healthy".to_string(),
        version: crate::VERSION.to_string(),
        contacts,
        connections: store.connection_stats(),
        timestamp: chrono::Utc::now(),
    }))
}
