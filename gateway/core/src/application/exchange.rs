// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Message Exchange Orchestrator
//!
//! Persists an inbound chat message, dispatches it to the agent bound to the
//! chat, and persists the reply. The steps are not transactional: a user
//! message written before a failed generation stays in the history, and the
//! configured [`OrphanPolicy`] decides whether it is marked `failed`.
//!
//! Exchanges against the same chat are serialized with a per-chat async
//! lock held from the first write to the last, so history order always
//! alternates user message and reply.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Chat exchange use case

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, error, warn};

use crate::application::agent_factory::AgentFactory;
use crate::domain::agent::AgentError;
use crate::domain::chat::{
    ChatAccess, ChatId, ExchangeResult, Message, MessageId, MessageStatus, NewMessage,
};
use crate::domain::gateway_config::{ExchangeConfig, OrphanPolicy};
use crate::domain::identity::Identity;
use crate::domain::repository::{ChatRepository, MessageRepository, RepositoryError};

#[derive(Debug, thiserror::Error)]
pub enum ExchangeError {
    #[error("Message content cannot be empty")]
    EmptyMessage,

    #[error("Access to chat {0} is denied")]
    AccessDenied(ChatId),

    #[error("Chat {0} not found")]
    ChatNotFound(ChatId),

    #[error("Chat {0} has no bound agent")]
    NoAgentBound(ChatId),

    #[error("Agent `{0}` is not supported")]
    AgentNotFound(String),

    #[error("Exchange with agent '{agent}' failed for chat {chat_id}: {source}")]
    Failed {
        chat_id: ChatId,
        agent: String,
        user_message_id: MessageId,
        #[source]
        source: AgentError,
    },

    #[error("Persistence error: {0}")]
    Persistence(#[from] RepositoryError),
}

#[async_trait]
pub trait ExchangeService: Send + Sync {
    async fn exchange(
        &self,
        chat_id: ChatId,
        text: &str,
        identity: &Identity,
    ) -> Result<ExchangeResult, ExchangeError>;
}

pub struct StandardExchangeService {
    chats: Arc<dyn ChatRepository>,
    messages: Arc<dyn MessageRepository>,
    agents: Arc<AgentFactory>,
    orphan_policy: OrphanPolicy,
    default_agent: Option<String>,
    generation_timeout: Duration,
    chat_locks: DashMap<ChatId, Arc<Mutex<()>>>,
}

impl StandardExchangeService {
    pub fn new(
        chats: Arc<dyn ChatRepository>,
        messages: Arc<dyn MessageRepository>,
        agents: Arc<AgentFactory>,
        config: &ExchangeConfig,
    ) -> Self {
        Self {
            chats,
            messages,
            agents,
            orphan_policy: config.orphan_policy,
            default_agent: config.default_agent.clone(),
            generation_timeout: Duration::from_secs(config.generation_timeout_secs),
            chat_locks: DashMap::new(),
        }
    }

    async fn lock_chat(&self, chat_id: ChatId) -> ChatLockGuard<'_> {
        let lock = self.chat_locks.entry(chat_id).or_default().value().clone();
        let guard = lock.lock_owned().await;
        ChatLockGuard {
            locks: &self.chat_locks,
            chat_id,
            guard: Some(guard),
        }
    }

    /// Number of chats with an exchange in flight.
    pub fn active_chats(&self) -> usize {
        self.chat_locks.len()
    }

    async fn exchange_locked(
        &self,
        chat_id: ChatId,
        text: &str,
        identity: &Identity,
    ) -> Result<ExchangeResult, ExchangeError> {
        let user_message = self
            .messages
            .create_message(NewMessage::from_user(chat_id, &identity.subject_id, text))
            .await?;

        let binding = match self.chats.get_chat_binding(chat_id).await {
            Ok(Some(binding)) => binding,
            Ok(None) => {
                return Err(self
                    .orphan(&user_message, ExchangeError::ChatNotFound(chat_id))
                    .await)
            }
            Err(e) => return Err(self.orphan(&user_message, e.into()).await),
        };

        let Some(agent_name) = binding.agent_name.or_else(|| self.default_agent.clone()) else {
            return Err(self
                .orphan(&user_message, ExchangeError::NoAgentBound(chat_id))
                .await);
        };

        let descriptor = match self.agents.get(&agent_name) {
            Ok(descriptor) => descriptor,
            Err(e) => {
                warn!("Chat {} is bound to an unknown agent: {}", chat_id, e);
                return Err(self
                    .orphan(&user_message, ExchangeError::AgentNotFound(agent_name))
                    .await);
            }
        };

        debug!("Dispatching chat {} to agent '{}'", chat_id, descriptor.name);
        let generated = match tokio::time::timeout(
            self.generation_timeout,
            descriptor.implementation.generate(chat_id, text),
        )
        .await
        {
            Ok(Ok(reply)) if reply.trim().is_empty() => {
                Err(AgentError::MalformedResponse("empty reply".to_string()))
            }
            Ok(result) => result,
            Err(_) => Err(AgentError::Timeout(self.generation_timeout)),
        };

        let reply = match generated {
            Ok(reply) => reply,
            Err(source) => {
                error!(
                    "Agent '{}' failed for chat {}: {}",
                    descriptor.name, chat_id, source
                );
                let failure = ExchangeError::Failed {
                    chat_id,
                    agent: descriptor.name.clone(),
                    user_message_id: user_message.id,
                    source,
                };
                return Err(self.orphan(&user_message, failure).await);
            }
        };

        let agent_reply = self
            .messages
            .create_message(NewMessage::from_agent(chat_id, &descriptor.name, reply))
            .await?;

        Ok(ExchangeResult {
            user_message,
            agent_reply,
        })
    }

    /// Applies the orphan policy to a user message left without a reply.
    async fn orphan(&self, message: &Message, err: ExchangeError) -> ExchangeError {
        if self.orphan_policy == OrphanPolicy::MarkFailed {
            if let Err(e) = self
                .messages
                .set_status(message.id, MessageStatus::Failed)
                .await
            {
                warn!("Failed to mark message {} as failed: {}", message.id, e);
            }
        }
        err
    }
}

#[async_trait]
impl ExchangeService for StandardExchangeService {
    async fn exchange(
        &self,
        chat_id: ChatId,
        text: &str,
        identity: &Identity,
    ) -> Result<ExchangeResult, ExchangeError> {
        if text.trim().is_empty() {
            return Err(ExchangeError::EmptyMessage);
        }

        match self.chats.check_chat_access(chat_id, identity).await? {
            ChatAccess::Granted => {}
            ChatAccess::Denied => return Err(ExchangeError::AccessDenied(chat_id)),
            ChatAccess::Missing => return Err(ExchangeError::ChatNotFound(chat_id)),
        }

        let started = Instant::now();
        let result = {
            let _guard = self.lock_chat(chat_id).await;
            self.exchange_locked(chat_id, text, identity).await
        };

        let (agent, outcome) = match &result {
            Ok(r) => (r.agent_reply.author.clone(), "ok"),
            Err(ExchangeError::Failed { agent, source, .. }) => (agent.clone(), source.kind()),
            Err(ExchangeError::NoAgentBound(_)) => ("none".to_string(), "no_agent"),
            Err(_) => ("unknown".to_string(), "error"),
        };
        metrics::counter!("gateway_exchange_total", "agent" => agent, "outcome" => outcome)
            .increment(1);
        metrics::histogram!("gateway_exchange_duration_seconds")
            .record(started.elapsed().as_secs_f64());

        result
    }
}

/// Releases the per-chat lock and drops the map entry once nobody else holds it.
struct ChatLockGuard<'a> {
    locks: &'a DashMap<ChatId, Arc<Mutex<()>>>,
    chat_id: ChatId,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for ChatLockGuard<'_> {
    fn drop(&mut self) {
        self.guard.take();
        self.locks
            .remove_if(&self.chat_id, |_, lock| Arc::strong_count(lock) == 1);
    }
}
