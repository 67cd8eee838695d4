// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Chat management endpoints.
//
// Persistence-backed CRUD over the caller's chats and their messages.
// Ownership is checked on every chat-scoped call; admins may access any chat.
// New chats are always owned by the caller.

use axum::{
    extract::{rejection::JsonRejection, rejection::PathRejection, Path, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::domain::chat::{
    Chat, ChatAccess, ChatId, ChatUpdate, Message, MessageId, NewChat, NewMessage,
};
use crate::domain::identity::Identity;
use crate::presentation::error::ApiError;
use crate::presentation::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateChatRequest {
    pub title: String,
    #[serde(default)]
    pub agent_name: Option<String>,
    /// Must name the caller when present.
    #[serde(default)]
    pub owner_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateChatRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub agent_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MessageRequest {
    pub content: String,
}

pub async fn list_chats_handler(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
) -> Result<Json<Vec<Chat>>, ApiError> {
    Ok(Json(state.chats.list_by_owner(&identity.subject_id).await?))
}

pub async fn create_chat_handler(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    payload: Result<Json<CreateChatRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Chat>), ApiError> {
    let Json(request) = payload?;

    let title = request.title.trim();
    if title.is_empty() {
        return Err(ApiError::bad_request("Chat title cannot be empty"));
    }
    if request
        .owner_id
        .as_ref()
        .is_some_and(|owner| *owner != identity.subject_id)
    {
        return Err(ApiError::new(
            StatusCode::FORBIDDEN,
            "AccessDenied",
            "Chats can only be created for the caller",
        ));
    }
    let agent_name = request
        .agent_name
        .map(|name| known_agent(&state, &name))
        .transpose()?;

    let chat = state
        .chats
        .create(NewChat {
            owner_id: identity.subject_id,
            title: title.to_string(),
            agent_name,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(chat)))
}

pub async fn get_chat_handler(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    chat_id: Result<Path<i64>, PathRejection>,
) -> Result<Json<Chat>, ApiError> {
    let Path(chat_id) = chat_id?;
    let chat_id = authorize_chat(&state, ChatId(chat_id), &identity).await?;
    state
        .chats
        .find_by_id(chat_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("Chat {} not found", chat_id)))
}

pub async fn update_chat_handler(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    chat_id: Result<Path<i64>, PathRejection>,
    payload: Result<Json<UpdateChatRequest>, JsonRejection>,
) -> Result<Json<Chat>, ApiError> {
    let Path(chat_id) = chat_id?;
    let Json(request) = payload?;
    let chat_id = authorize_chat(&state, ChatId(chat_id), &identity).await?;

    let title = match request.title {
        Some(title) if title.trim().is_empty() => {
            return Err(ApiError::bad_request("Chat title cannot be empty"));
        }
        Some(title) => Some(title.trim().to_string()),
        None => None,
    };
    let update = ChatUpdate {
        title,
        agent_name: request
            .agent_name
            .map(|name| known_agent(&state, &name))
            .transpose()?,
    };
    if update.is_empty() {
        return Err(ApiError::bad_request("Nothing to update"));
    }

    Ok(Json(state.chats.update(chat_id, update).await?))
}

pub async fn delete_chat_handler(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    chat_id: Result<Path<i64>, PathRejection>,
) -> Result<StatusCode, ApiError> {
    let Path(chat_id) = chat_id?;
    let chat_id = authorize_chat(&state, ChatId(chat_id), &identity).await?;
    state.chats.delete(chat_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_messages_handler(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    chat_id: Result<Path<i64>, PathRejection>,
) -> Result<Json<Vec<Message>>, ApiError> {
    let Path(chat_id) = chat_id?;
    let chat_id = authorize_chat(&state, ChatId(chat_id), &identity).await?;
    Ok(Json(state.messages.list_by_chat(chat_id).await?))
}

pub async fn create_message_handler(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    chat_id: Result<Path<i64>, PathRejection>,
    payload: Result<Json<MessageRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Message>), ApiError> {
    let Path(chat_id) = chat_id?;
    let Json(request) = payload?;
    let chat_id = authorize_chat(&state, ChatId(chat_id), &identity).await?;
    let content = non_empty_content(&request.content)?;

    let message = state
        .messages
        .create_message(NewMessage::from_user(chat_id, &identity.subject_id, content))
        .await?;
    Ok((StatusCode::CREATED, Json(message)))
}

pub async fn get_message_handler(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    ids: Result<Path<(i64, i64)>, PathRejection>,
) -> Result<Json<Message>, ApiError> {
    let Path((chat_id, message_id)) = ids?;
    let chat_id = authorize_chat(&state, ChatId(chat_id), &identity).await?;
    Ok(Json(chat_message(&state, chat_id, MessageId(message_id)).await?))
}

pub async fn update_message_handler(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    ids: Result<Path<(i64, i64)>, PathRejection>,
    payload: Result<Json<MessageRequest>, JsonRejection>,
) -> Result<Json<Message>, ApiError> {
    let Path((chat_id, message_id)) = ids?;
    let Json(request) = payload?;
    let chat_id = authorize_chat(&state, ChatId(chat_id), &identity).await?;
    let content = non_empty_content(&request.content)?;

    let message = chat_message(&state, chat_id, MessageId(message_id)).await?;
    Ok(Json(state.messages.update_content(message.id, content).await?))
}

pub async fn delete_message_handler(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    ids: Result<Path<(i64, i64)>, PathRejection>,
) -> Result<StatusCode, ApiError> {
    let Path((chat_id, message_id)) = ids?;
    let chat_id = authorize_chat(&state, ChatId(chat_id), &identity).await?;

    let message = chat_message(&state, chat_id, MessageId(message_id)).await?;
    state.messages.delete_message(message.id).await?;
    Ok(StatusCode::NO_CONTENT)
}

fn known_agent(state: &AppState, name: &str) -> Result<String, ApiError> {
    state
        .agents
        .get(name)
        .map(|descriptor| descriptor.name.clone())
        .map_err(|e| ApiError::new(StatusCode::UNPROCESSABLE_ENTITY, "AgentNotFound", e.to_string()))
}

fn non_empty_content(content: &str) -> Result<&str, ApiError> {
    if content.trim().is_empty() {
        return Err(ApiError::bad_request("Message content cannot be empty"));
    }
    Ok(content)
}

/// A message of `chat_id`; messages of other chats read as missing.
async fn chat_message(
    state: &AppState,
    chat_id: ChatId,
    message_id: MessageId,
) -> Result<Message, ApiError> {
    state
        .messages
        .find_by_id(message_id)
        .await?
        .filter(|message| message.chat_id == chat_id)
        .ok_or_else(|| {
            ApiError::new(
                StatusCode::NOT_FOUND,
                "MessageNotFound",
                format!("Message {} not found in chat {}", message_id, chat_id),
            )
        })
}

async fn authorize_chat(
    state: &AppState,
    chat_id: ChatId,
    identity: &Identity,
) -> Result<ChatId, ApiError> {
    match state.chats.check_chat_access(chat_id, identity).await? {
        ChatAccess::Granted => Ok(chat_id),
        ChatAccess::Denied => Err(ApiError::new(
            StatusCode::FORBIDDEN,
            "AccessDenied",
            format!("Access to chat {} is denied", chat_id),
        )),
        ChatAccess::Missing => Err(ApiError::new(
            StatusCode::NOT_FOUND,
            "ChatNotFound",
            format!("Chat {} not found", chat_id),
        )),
    }
}
