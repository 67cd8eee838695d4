// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use axum::{extract::State, http::StatusCode, Json};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::application::health::ServiceHealthReport;
use crate::presentation::state::AppState;

/// Liveness probe.
pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_seconds": state.start_time.elapsed().as_secs(),
    }))
}

pub async fn ping_handler() -> StatusCode {
    StatusCode::NO_CONTENT
}

/// Dependency report. Always 200; degradation is reported in the body.
pub async fn service_health_handler(
    State(state): State<Arc<AppState>>,
) -> Json<ServiceHealthReport> {
    Json(state.health.service_health().await)
}
