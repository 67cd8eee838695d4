// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use axum::{extract::State, Json};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::presentation::state::AppState;

pub async fn list_agents_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({ "agents": state.agents.names() }))
}

pub async fn agents_health_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({ "agents": state.agents.health_all().await }))
}
