// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Anthropic Agent Adapter
//
// Anti-Corruption Layer for the Anthropic messages API

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{error_from_response, http_client, transport_error};
use crate::domain::agent::{AgentError, AgentGateway, AgentHealth};
use crate::domain::chat::ChatId;

const API_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 1024;

pub struct AnthropicAgent {
    name: String,
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    system_prompt: Option<String>,
    timeout: Duration,
}

#[derive(Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    messages: Vec<AnthropicMessage<'a>>,
}

#[derive(Serialize)]
struct AnthropicMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct AnthropicResponse {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

impl AnthropicAgent {
    pub fn new(
        name: &str,
        endpoint: String,
        api_key: String,
        model: String,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            name: name.to_string(),
            client: http_client(timeout)?,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key,
            model,
            system_prompt: None,
            timeout,
        })
    }

    pub fn with_system_prompt(mut self, prompt: Option<String>) -> Self {
        self.system_prompt = prompt;
        self
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, format!("{}{}", self.endpoint, path))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
    }
}

#[async_trait]
impl AgentGateway for AnthropicAgent {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(&self, _chat_id: ChatId, new_message: &str) -> Result<String, AgentError> {
        let request = AnthropicRequest {
            model: &self.model,
            max_tokens: MAX_TOKENS,
            system: self.system_prompt.as_deref(),
            messages: vec![AnthropicMessage {
                role: "user",
                content: new_message,
            }],
        };

        let response = self
            .request(reqwest::Method::POST, "/messages")
            .json(&request)
            .send()
            .await
            .map_err(|e| transport_error(e, self.timeout))?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        let body: AnthropicResponse = response
            .json()
            .await
            .map_err(|e| AgentError::MalformedResponse(format!("Failed to parse response: {}", e)))?;

        let text: String = body
            .content
            .iter()
            .filter(|block| block.kind == "text")
            .map(|block| block.text.as_str())
            .collect();

        if text.is_empty() {
            return Err(AgentError::MalformedResponse("No text content in response".into()));
        }
        Ok(text)
    }

    async fn check_health(&self) -> Result<AgentHealth, AgentError> {
        let response = self
            .request(reqwest::Method::GET, "/models")
            .send()
            .await
            .map_err(|e| transport_error(e, self.timeout))?;

        // Any answer other than an auth failure proves the API is reachable
        match response.status() {
            s if s.is_success() => Ok(AgentHealth::ok()),
            StatusCode::NOT_FOUND | StatusCode::METHOD_NOT_ALLOWED => Ok(AgentHealth::ok()),
            _ => Err(error_from_response(response).await),
        }
    }
}
