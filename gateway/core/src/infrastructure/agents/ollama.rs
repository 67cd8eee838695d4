// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Ollama Agent Adapter
//
// Anti-Corruption Layer for Ollama local models
// Supports air-gapped deployments with local LLMs

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{error_from_response, http_client, transport_error};
use crate::domain::agent::{AgentError, AgentGateway, AgentHealth};
use crate::domain::chat::ChatId;

pub struct OllamaAgent {
    name: String,
    client: reqwest::Client,
    endpoint: String,
    model: String,
    system_prompt: Option<String>,
    timeout: Duration,
}

#[derive(Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    messages: Vec<OllamaMessage>,
    stream: bool,
}

#[derive(Serialize, Deserialize)]
struct OllamaMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct OllamaResponse {
    message: OllamaMessage,
}

#[derive(Deserialize)]
struct OllamaTags {
    models: Vec<OllamaModel>,
}

#[derive(Deserialize)]
struct OllamaModel {
    name: String,
}

impl OllamaAgent {
    pub fn new(
        name: &str,
        endpoint: String,
        model: String,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            name: name.to_string(),
            client: http_client(timeout)?,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            model,
            system_prompt: None,
            timeout,
        })
    }

    pub fn with_system_prompt(mut self, prompt: Option<String>) -> Self {
        self.system_prompt = prompt;
        self
    }
}

#[async_trait]
impl AgentGateway for OllamaAgent {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(&self, _chat_id: ChatId, new_message: &str) -> Result<String, AgentError> {
        let mut messages = Vec::with_capacity(2);
        if let Some(prompt) = &self.system_prompt {
            messages.push(OllamaMessage {
                role: "system".to_string(),
                content: prompt.clone(),
            });
        }
        messages.push(OllamaMessage {
            role: "user".to_string(),
            content: new_message.to_string(),
        });

        let request = OllamaRequest {
            model: &self.model,
            messages,
            stream: false,
        };

        let url = format!("{}/api/chat", self.endpoint);
        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| transport_error(e, self.timeout))?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        let body: OllamaResponse = response
            .json()
            .await
            .map_err(|e| AgentError::MalformedResponse(format!("Failed to parse response: {}", e)))?;

        Ok(body.message.content)
    }

    async fn check_health(&self) -> Result<AgentHealth, AgentError> {
        let url = format!("{}/api/tags", self.endpoint);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| transport_error(e, self.timeout))?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        let tags: OllamaTags = response
            .json()
            .await
            .map_err(|e| AgentError::MalformedResponse(e.to_string()))?;

        // The server is up but cannot answer until the model is pulled
        let pulled = tags
            .models
            .iter()
            .any(|m| m.name == self.model || m.name.split(':').next() == Some(self.model.as_str()));
        if pulled {
            Ok(AgentHealth::ok())
        } else {
            Ok(AgentHealth::degraded(serde_json::json!({
                "error": format!("model '{}' is not available", self.model)
            })))
        }
    }
}
