//! # Linkage API Module
//!
//! HTTP surface of the service: `POST /identify` and `GET /health`.

pub mod routes;
pub mod types;

use axum::{
    http::{header, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use common::ServerConfig;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::warn;

use crate::resolution::IdentityResolver;

/// API state shared across handlers
#[derive(Clone)]
pub struct ApiState {
    pub resolver: Arc<IdentityResolver>,
}

impl ApiState {
    pub fn new(resolver: Arc<IdentityResolver>) -> Self {
        Self { resolver }
    }
}

/// Create the Axum router with all endpoints and middleware
pub fn router(state: ApiState, config: &ServerConfig) -> Router {
    let middleware = ServiceBuilder::new()
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(config.request_timeout()))
        .layer(cors_layer(config));

    Router::new()
        .route("/identify", post(routes::identify))
        .route("/health", get(routes::health_check))
        .layer(middleware)
        .with_state(state)
}

fn cors_layer(config: &ServerConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    if config.allows_any_origin() {
        // Credentials cannot be combined with a wildcard origin.
        return cors.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    cors.allow_origin(AllowOrigin::list(origins))
        .allow_credentials(true)
}
