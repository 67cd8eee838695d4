// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Domain Repository Interfaces
//!
//! Persistence contracts consumed by the exchange orchestrator and the chat
//! endpoints. Interfaces live here, implementations in
//! `crate::infrastructure::repositories`.
//!
//! | Trait | Aggregate | Implementations |
//! |-------|-----------|----------------|
//! | `ChatRepository` | `Chat` | `InMemoryChatRepository`, `PostgresChatRepository` |
//! | `MessageRepository` | `Message` | `InMemoryMessageRepository`, `PostgresMessageRepository` |
//!
//! The backend is selected at startup: a configured database URL selects
//! PostgreSQL, otherwise the in-memory store is used.

use async_trait::async_trait;

use crate::domain::chat::{
    Chat, ChatAccess, ChatBinding, ChatId, ChatUpdate, Message, MessageId, MessageStatus, NewChat,
    NewMessage,
};
use crate::domain::identity::Identity;

#[async_trait]
pub trait ChatRepository: Send + Sync {
    async fn create(&self, chat: NewChat) -> Result<Chat, RepositoryError>;

    async fn find_by_id(&self, id: ChatId) -> Result<Option<Chat>, RepositoryError>;

    /// Chats owned by `owner_id`, newest first.
    async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<Chat>, RepositoryError>;

    /// Applies the present fields and returns the stored chat.
    async fn update(&self, id: ChatId, update: ChatUpdate) -> Result<Chat, RepositoryError>;

    async fn delete(&self, id: ChatId) -> Result<(), RepositoryError>;

    /// Agent binding of a chat; `None` when the chat does not exist.
    async fn get_chat_binding(&self, id: ChatId) -> Result<Option<ChatBinding>, RepositoryError>;

    /// Ownership check. Admins may access every chat.
    async fn check_chat_access(
        &self,
        id: ChatId,
        identity: &Identity,
    ) -> Result<ChatAccess, RepositoryError>;

    /// Cheap liveness probe of the backing store.
    async fn ping(&self) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait MessageRepository: Send + Sync {
    /// Append a message to its chat; insertion order is history order.
    async fn create_message(&self, message: NewMessage) -> Result<Message, RepositoryError>;

    async fn find_by_id(&self, id: MessageId) -> Result<Option<Message>, RepositoryError>;

    async fn list_by_chat(&self, chat_id: ChatId) -> Result<Vec<Message>, RepositoryError>;

    async fn set_status(&self, id: MessageId, status: MessageStatus) -> Result<(), RepositoryError>;

    async fn update_content(
        &self,
        id: MessageId,
        content: &str,
    ) -> Result<Message, RepositoryError>;

    async fn delete_message(&self, id: MessageId) -> Result<(), RepositoryError>;
}

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("Entity not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl From<sqlx::Error> for RepositoryError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => RepositoryError::NotFound("Row not found".to_string()),
            _ => RepositoryError::Database(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for RepositoryError {
    fn from(err: serde_json::Error) -> Self {
        RepositoryError::Serialization(err.to_string())
    }
}
