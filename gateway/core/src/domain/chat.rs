// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Chat and message model
//!
//! Chats own an ordered message history and may be bound to the agent that
//! answers them. The gateway persists messages through the repository ports
//! in [`crate::domain::repository`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::identity::{Identity, RoleTier};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChatId(pub i64);

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub i64);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

impl ChatRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "user" => Some(ChatRole::User),
            "assistant" => Some(ChatRole::Assistant),
            _ => None,
        }
    }
}

/// Delivery state of a persisted message.
///
/// `Failed` is only written when the exchange orphan policy asks for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    Delivered,
    Failed,
}

impl MessageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageStatus::Delivered => "delivered",
            MessageStatus::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "delivered" => Some(MessageStatus::Delivered),
            "failed" => Some(MessageStatus::Failed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub chat_id: ChatId,
    pub role: ChatRole,
    /// Subject id for user messages, agent name for replies.
    pub author: String,
    pub content: String,
    pub status: MessageStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    pub chat_id: ChatId,
    pub role: ChatRole,
    pub author: String,
    pub content: String,
}

impl NewMessage {
    pub fn from_user(chat_id: ChatId, subject_id: &str, content: &str) -> Self {
        Self {
            chat_id,
            role: ChatRole::User,
            author: subject_id.to_string(),
            content: content.to_string(),
        }
    }

    pub fn from_agent(chat_id: ChatId, agent_name: &str, content: String) -> Self {
        Self {
            chat_id,
            role: ChatRole::Assistant,
            author: agent_name.to_string(),
            content,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chat {
    pub id: ChatId,
    pub owner_id: String,
    pub title: String,
    pub agent_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Chat {
    /// Owners and admins may use a chat.
    pub fn access_for(&self, identity: &Identity) -> ChatAccess {
        if self.owner_id == identity.subject_id || identity.role == RoleTier::Admin {
            ChatAccess::Granted
        } else {
            ChatAccess::Denied
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewChat {
    pub owner_id: String,
    pub title: String,
    pub agent_name: Option<String>,
}

/// Partial chat update; absent fields are left as they are.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChatUpdate {
    pub title: Option<String>,
    pub agent_name: Option<String>,
}

impl ChatUpdate {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.agent_name.is_none()
    }
}

/// Which agent answers a chat, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatBinding {
    pub chat_id: ChatId,
    pub agent_name: Option<String>,
}

impl From<&Chat> for ChatBinding {
    fn from(chat: &Chat) -> Self {
        Self {
            chat_id: chat.id,
            agent_name: chat.agent_name.clone(),
        }
    }
}

/// Outcome of an ownership/ACL check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatAccess {
    Granted,
    Denied,
    Missing,
}

/// The pair of messages produced by one exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExchangeResult {
    pub user_message: Message,
    pub agent_reply: Message,
}
