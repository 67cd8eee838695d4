// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Repository Implementations
//!
//! Infrastructure implementations of the chat and message repository ports.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure
//! - **Purpose:** Persist and retrieve chats and their message history
//! - **Pattern:** Repository (DDD), Adapter (Hexagonal Architecture)
//!
//! # Available Implementations
//!
//! - **PostgresChatRepository** / **PostgresMessageRepository** - `sqlx` backed
//! - **InMemoryChatRepository** / **InMemoryMessageRepository** - lock-protected
//!   maps for development and tests

pub mod postgres_chat;
pub mod postgres_message;

pub use postgres_chat::PostgresChatRepository;
pub use postgres_message::PostgresMessageRepository;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::domain::chat::{
    Chat, ChatAccess, ChatBinding, ChatId, ChatUpdate, Message, MessageId, MessageStatus, NewChat,
    NewMessage,
};
use crate::domain::identity::Identity;
use crate::domain::repository::{ChatRepository, MessageRepository, RepositoryError};

#[derive(Default)]
struct ChatTable {
    next_id: i64,
    chats: BTreeMap<ChatId, Chat>,
}

#[derive(Clone, Default)]
pub struct InMemoryChatRepository {
    table: Arc<RwLock<ChatTable>>,
}

impl InMemoryChatRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ChatRepository for InMemoryChatRepository {
    async fn create(&self, chat: NewChat) -> Result<Chat, RepositoryError> {
        let mut table = self.table.write();
        table.next_id += 1;
        let chat = Chat {
            id: ChatId(table.next_id),
            owner_id: chat.owner_id,
            title: chat.title,
            agent_name: chat.agent_name,
            created_at: Utc::now(),
        };
        table.chats.insert(chat.id, chat.clone());
        Ok(chat)
    }

    async fn find_by_id(&self, id: ChatId) -> Result<Option<Chat>, RepositoryError> {
        Ok(self.table.read().chats.get(&id).cloned())
    }

    async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<Chat>, RepositoryError> {
        Ok(self
            .table
            .read()
            .chats
            .values()
            .rev()
            .filter(|c| c.owner_id == owner_id)
            .cloned()
            .collect())
    }

    async fn update(&self, id: ChatId, update: ChatUpdate) -> Result<Chat, RepositoryError> {
        let mut table = self.table.write();
        let chat = table
            .chats
            .get_mut(&id)
            .ok_or_else(|| RepositoryError::NotFound(format!("chat {}", id)))?;
        if let Some(title) = update.title {
            chat.title = title;
        }
        if let Some(agent_name) = update.agent_name {
            chat.agent_name = Some(agent_name);
        }
        Ok(chat.clone())
    }

    async fn delete(&self, id: ChatId) -> Result<(), RepositoryError> {
        match self.table.write().chats.remove(&id) {
            Some(_) => Ok(()),
            None => Err(RepositoryError::NotFound(format!("chat {}", id))),
        }
    }

    async fn get_chat_binding(&self, id: ChatId) -> Result<Option<ChatBinding>, RepositoryError> {
        Ok(self.table.read().chats.get(&id).map(ChatBinding::from))
    }

    async fn check_chat_access(
        &self,
        id: ChatId,
        identity: &Identity,
    ) -> Result<ChatAccess, RepositoryError> {
        Ok(match self.table.read().chats.get(&id) {
            Some(chat) => chat.access_for(identity),
            None => ChatAccess::Missing,
        })
    }

    async fn ping(&self) -> Result<(), RepositoryError> {
        Ok(())
    }
}

#[derive(Default)]
struct MessageLog {
    next_id: i64,
    messages: Vec<Message>,
}

#[derive(Clone, Default)]
pub struct InMemoryMessageRepository {
    log: Arc<RwLock<MessageLog>>,
}

impl InMemoryMessageRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MessageRepository for InMemoryMessageRepository {
    async fn create_message(&self, message: NewMessage) -> Result<Message, RepositoryError> {
        let mut log = self.log.write();
        log.next_id += 1;
        let message = Message {
            id: MessageId(log.next_id),
            chat_id: message.chat_id,
            role: message.role,
            author: message.author,
            content: message.content,
            status: MessageStatus::Delivered,
            created_at: Utc::now(),
        };
        log.messages.push(message.clone());
        Ok(message)
    }

    async fn find_by_id(&self, id: MessageId) -> Result<Option<Message>, RepositoryError> {
        Ok(self.log.read().messages.iter().find(|m| m.id == id).cloned())
    }

    async fn list_by_chat(&self, chat_id: ChatId) -> Result<Vec<Message>, RepositoryError> {
        Ok(self
            .log
            .read()
            .messages
            .iter()
            .filter(|m| m.chat_id == chat_id)
            .cloned()
            .collect())
    }

    async fn set_status(&self, id: MessageId, status: MessageStatus) -> Result<(), RepositoryError> {
        let mut log = self.log.write();
        match log.messages.iter_mut().find(|m| m.id == id) {
            Some(message) => {
                message.status = status;
                Ok(())
            }
            None => Err(RepositoryError::NotFound(format!("message {}", id))),
        }
    }

    async fn update_content(
        &self,
        id: MessageId,
        content: &str,
    ) -> Result<Message, RepositoryError> {
        let mut log = self.log.write();
        match log.messages.iter_mut().find(|m| m.id == id) {
            Some(message) => {
                message.content = content.to_string();
                Ok(message.clone())
            }
            None => Err(RepositoryError::NotFound(format!("message {}", id))),
        }
    }

    async fn delete_message(&self, id: MessageId) -> Result<(), RepositoryError> {
        let mut log = self.log.write();
        let before = log.messages.len();
        log.messages.retain(|m| m.id != id);
        if log.messages.len() == before {
            return Err(RepositoryError::NotFound(format!("message {}", id)));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::chat::ChatRole;
    use crate::domain::identity::RoleTier;

    fn identity(subject: &str, role: RoleTier) -> Identity {
        Identity {
            subject_id: subject.to_string(),
            role,
            expires_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_chat_access() {
        let repo = InMemoryChatRepository::new();
        let chat = repo
            .create(NewChat {
                owner_id: "alice".into(),
                title: "planning".into(),
                agent_name: Some("agenda".into()),
            })
            .await
            .unwrap();

        let access = |subject: &'static str, role| {
            let repo = repo.clone();
            async move {
                repo.check_chat_access(chat.id, &identity(subject, role))
                    .await
                    .unwrap()
            }
        };
        assert_eq!(access("alice", RoleTier::Common).await, ChatAccess::Granted);
        assert_eq!(access("bob", RoleTier::Staff).await, ChatAccess::Denied);
        assert_eq!(access("root", RoleTier::Admin).await, ChatAccess::Granted);
        assert_eq!(
            repo.check_chat_access(ChatId(42), &identity("alice", RoleTier::Common))
                .await
                .unwrap(),
            ChatAccess::Missing
        );

        let binding = repo.get_chat_binding(chat.id).await.unwrap().unwrap();
        assert_eq!(binding.agent_name.as_deref(), Some("agenda"));
    }

    #[tokio::test]
    async fn test_list_and_delete_chats() {
        let repo = InMemoryChatRepository::new();
        for title in ["first", "second"] {
            repo.create(NewChat {
                owner_id: "alice".into(),
                title: title.into(),
                agent_name: None,
            })
            .await
            .unwrap();
        }
        repo.create(NewChat {
            owner_id: "bob".into(),
            title: "other".into(),
            agent_name: None,
        })
        .await
        .unwrap();

        let chats = repo.list_by_owner("alice").await.unwrap();
        let titles: Vec<_> = chats.iter().map(|c| c.title.as_str()).collect();
        assert_eq!(titles, vec!["second", "first"]);

        repo.delete(chats[0].id).await.unwrap();
        assert!(matches!(
            repo.delete(chats[0].id).await,
            Err(RepositoryError::NotFound(_))
        ));
        assert_eq!(repo.list_by_owner("alice").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_messages_keep_insertion_order() {
        let repo = InMemoryMessageRepository::new();
        let chat = ChatId(1);
        let first = repo
            .create_message(NewMessage::from_user(chat, "alice", "hello"))
            .await
            .unwrap();
        repo.create_message(NewMessage::from_user(ChatId(2), "bob", "elsewhere"))
            .await
            .unwrap();
        repo.create_message(NewMessage::from_agent(chat, "agenda", "hi".to_string()))
            .await
            .unwrap();

        let history = repo.list_by_chat(chat).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].id, first.id);
        assert_eq!(history[1].role, ChatRole::Assistant);

        repo.set_status(first.id, MessageStatus::Failed).await.unwrap();
        let stored = repo.find_by_id(first.id).await.unwrap().unwrap();
        assert_eq!(stored.status, MessageStatus::Failed);
        assert!(repo.set_status(MessageId(99), MessageStatus::Failed).await.is_err());
    }

    #[tokio::test]
    async fn test_update_chat_keeps_absent_fields() {
        let repo = InMemoryChatRepository::new();
        let chat = repo
            .create(NewChat {
                owner_id: "alice".into(),
                title: "draft".into(),
                agent_name: Some("agenda".into()),
            })
            .await
            .unwrap();

        let updated = repo
            .update(
                chat.id,
                ChatUpdate {
                    title: Some("weekly plan".into()),
                    agent_name: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.title, "weekly plan");
        assert_eq!(updated.agent_name.as_deref(), Some("agenda"));
        assert_eq!(updated.owner_id, "alice");

        let stored = repo.find_by_id(chat.id).await.unwrap().unwrap();
        assert_eq!(stored, updated);

        assert!(matches!(
            repo.update(ChatId(77), ChatUpdate::default()).await,
            Err(RepositoryError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_edit_and_delete_messages() {
        let repo = InMemoryMessageRepository::new();
        let chat = ChatId(3);
        let first = repo
            .create_message(NewMessage::from_user(chat, "alice", "helo"))
            .await
            .unwrap();
        let second = repo
            .create_message(NewMessage::from_user(chat, "alice", "again"))
            .await
            .unwrap();

        let edited = repo.update_content(first.id, "hello").await.unwrap();
        assert_eq!(edited.content, "hello");
        assert_eq!(edited.created_at, first.created_at);

        repo.delete_message(second.id).await.unwrap();
        assert!(matches!(
            repo.delete_message(second.id).await,
            Err(RepositoryError::NotFound(_))
        ));
        let history = repo.list_by_chat(chat).await.unwrap();
        assert_eq!(history, vec![edited]);
    }
}
