use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use std::sync::Arc;

use skealed_shared::clients::db;
use skealed_shared::{HealthCheck, HealthResponse, HealthStatus};

use crate::AppState;

pub async fn health_check(State(state): State<Arc<AppState>>) -> Response {
    let mut checks = Vec::with_capacity(3);

    checks.push(match db::ping(&state.db) {
        Ok(()) => HealthCheck::healthy("postgres"),
        Err(e) => HealthCheck::failing("postgres", HealthStatus::Unhealthy, e),
    });

    // Redis only backs the magic-link cooldown.
    checks.push(match state.redis.ping().await {
        Ok(()) => HealthCheck::healthy("redis"),
        Err(e) => HealthCheck::failing("redis", HealthStatus::Degraded, e.to_string()),
    });

    checks.push(if state.rabbitmq.is_connected() {
        HealthCheck::healthy("rabbitmq")
    } else {
        HealthCheck::failing("rabbitmq", HealthStatus::Degraded, "channel closed")
    });

    let response = HealthResponse::healthy("skealed-auth", env!("CARGO_PKG_VERSION")).with_checks(checks);
    let status = match response.status {
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::OK,
    };

    (status, Json(response)).into_response()
}

pub async fn metrics(State(state): State<Arc<AppState>>) -> String {
    state.metrics_handle.render()
}
