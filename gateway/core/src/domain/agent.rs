// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Agent Gateway Interface
//!
//! Uniform contract implemented by every AI backend the gateway can dispatch to.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Agent capability set, health reporting and typed generation errors

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use super::chat::ChatId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HealthStatus {
    Ok,
    Degraded,
    Unavailable,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentHealth {
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<serde_json::Value>,
}

impl AgentHealth {
    pub fn ok() -> Self {
        Self {
            status: HealthStatus::Ok,
            detail: None,
        }
    }

    pub fn degraded(detail: serde_json::Value) -> Self {
        Self {
            status: HealthStatus::Degraded,
            detail: Some(detail),
        }
    }

    pub fn unavailable(error: impl Into<String>) -> Self {
        Self {
            status: HealthStatus::Unavailable,
            detail: Some(serde_json::json!({ "error": error.into() })),
        }
    }

    pub fn with_detail(mut self, detail: serde_json::Value) -> Self {
        self.detail = Some(detail);
        self
    }
}

/// Failure of a `generate` call against an agent backend.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AgentError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Agent call timed out after {0:?}")]
    Timeout(Duration),

    #[error("Malformed agent response: {0}")]
    MalformedResponse(String),

    #[error("Agent authentication failed: {0}")]
    Authentication(String),

    #[error("Agent rate limit exceeded")]
    RateLimit,

    #[error("Agent backend error (HTTP {status}): {message}")]
    Backend { status: u16, message: String },
}

impl AgentError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, AgentError::Timeout(_))
    }

    /// Stable label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            AgentError::Network(_) => "network",
            AgentError::Timeout(_) => "timeout",
            AgentError::MalformedResponse(_) => "malformed_response",
            AgentError::Authentication(_) => "authentication",
            AgentError::RateLimit => "rate_limit",
            AgentError::Backend { .. } => "backend",
        }
    }
}

/// Capability set every agent backend implements.
#[async_trait]
pub trait AgentGateway: Send + Sync {
    /// Unique, case-insensitive name the agent is registered under.
    fn name(&self) -> &str;

    /// Produce a reply to `new_message` in the context of `chat_id`.
    async fn generate(&self, chat_id: ChatId, new_message: &str) -> Result<String, AgentError>;

    /// Probe the backend. Errors are folded into an `UNAVAILABLE` status by [`health`].
    ///
    /// [`health`]: AgentGateway::health
    async fn check_health(&self) -> Result<AgentHealth, AgentError>;

    /// Never fails.
    async fn health(&self) -> AgentHealth {
        match self.check_health().await {
            Ok(health) => health,
            Err(e) => AgentHealth::unavailable(e.to_string()),
        }
    }
}

/// An agent indexed by the factory.
#[derive(Clone)]
pub struct AgentDescriptor {
    pub name: String,
    pub implementation: Arc<dyn AgentGateway>,
}

impl std::fmt::Debug for AgentDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentDescriptor")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}
