// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use axum::{
    extract::{rejection::JsonRejection, rejection::PathRejection, Path, State},
    Extension, Json,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::domain::chat::{ChatId, ExchangeResult};
use crate::domain::identity::Identity;
use crate::presentation::error::ApiError;
use crate::presentation::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ExchangeRequest {
    pub content: String,
    /// Optional echo of the path id; must match when present
    #[serde(default)]
    pub chat_id: Option<i64>,
}

/// `POST /api/v1/chats/{chat_id}/exchange`
pub async fn exchange_handler(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    chat_id: Result<Path<i64>, PathRejection>,
    payload: Result<Json<ExchangeRequest>, JsonRejection>,
) -> Result<Json<ExchangeResult>, ApiError> {
    let Path(chat_id) = chat_id?;
    let Json(request) = payload?;

    if let Some(body_chat_id) = request.chat_id {
        if body_chat_id != chat_id {
            return Err(ApiError::bad_request(format!(
                "Body chat_id {} does not match path chat_id {}",
                body_chat_id, chat_id
            )));
        }
    }

    let result = state
        .exchange
        .exchange(ChatId(chat_id), &request.content, &identity)
        .await?;
    Ok(Json(result))
}
