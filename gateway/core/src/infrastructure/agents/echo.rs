// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Echo Agent
//
// Local agent that answers without a backend. Used in development and for
// smoke-testing the exchange path.

use async_trait::async_trait;

use crate::domain::agent::{AgentError, AgentGateway, AgentHealth};
use crate::domain::chat::ChatId;

pub struct EchoAgent {
    name: String,
}

impl EchoAgent {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
        }
    }
}

#[async_trait]
impl AgentGateway for EchoAgent {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(&self, _chat_id: ChatId, new_message: &str) -> Result<String, AgentError> {
        Ok(format!("echo: {}", new_message))
    }

    async fn check_health(&self) -> Result<AgentHealth, AgentError> {
        Ok(AgentHealth::ok())
    }
}
