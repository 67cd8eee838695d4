// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// OpenAI Agent Adapter
//
// Anti-Corruption Layer for the OpenAI chat-completions API.
// Also works with OpenAI-compatible APIs (LM Studio, vLLM, etc.)

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{error_from_response, http_client, transport_error};
use crate::domain::agent::{AgentError, AgentGateway, AgentHealth};
use crate::domain::chat::ChatId;

pub struct OpenAIAgent {
    name: String,
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    system_prompt: Option<String>,
    timeout: Duration,
}

#[derive(Serialize)]
struct OpenAIRequest<'a> {
    model: &'a str,
    messages: Vec<OpenAIMessage>,
    /// Lets the backend correlate calls from the same chat.
    user: String,
}

#[derive(Serialize, Deserialize)]
struct OpenAIMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
}

#[derive(Deserialize)]
struct OpenAIChoice {
    message: OpenAIMessage,
}

impl OpenAIAgent {
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

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if self.api_key.is_empty() {
            request
        } else {
            request.bearer_auth(&self.api_key)
        }
    }
}

#[async_trait]
impl AgentGateway for OpenAIAgent {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(&self, chat_id: ChatId, new_message: &str) -> Result<String, AgentError> {
        let mut messages = Vec::with_capacity(2);
        if let Some(prompt) = &self.system_prompt {
            messages.push(OpenAIMessage {
                role: "system".to_string(),
                content: prompt.clone(),
            });
        }
        messages.push(OpenAIMessage {
            role: "user".to_string(),
            content: new_message.to_string(),
        });

        let request = OpenAIRequest {
            model: &self.model,
            messages,
            user: format!("chat-{}", chat_id),
        };

        let url = format!("{}/chat/completions", self.endpoint);
        let response = self
            .authorize(self.client.post(&url))
            .json(&request)
            .send()
            .await
            .map_err(|e| transport_error(e, self.timeout))?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        let body: OpenAIResponse = response
            .json()
            .await
            .map_err(|e| AgentError::MalformedResponse(format!("Failed to parse response: {}", e)))?;

        body.choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| AgentError::MalformedResponse("No choices in response".into()))
    }

    async fn check_health(&self) -> Result<AgentHealth, AgentError> {
        // Listing models is the cheapest authenticated call
        let url = format!("{}/models", self.endpoint);
        let response = self
            .authorize(self.client.get(&url))
            .send()
            .await
            .map_err(|e| transport_error(e, self.timeout))?;

        if response.status().is_success() {
            Ok(AgentHealth::ok().with_detail(serde_json::json!({ "model": self.model })))
        } else {
            Err(error_from_response(response).await)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::agent::HealthStatus;

    fn agent(endpoint: String) -> OpenAIAgent {
        OpenAIAgent::new(
            "planner",
            endpoint,
            "sk-test".to_string(),
            "gpt-4o-mini".to_string(),
            Duration::from_secs(5),
        )
        .unwrap()
        .with_system_prompt(Some("You plan schedules.".to_string()))
    }

    #[tokio::test]
    async fn test_generate_returns_first_choice() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .match_header("authorization", "Bearer sk-test")
            .match_body(mockito::Matcher::PartialJson(serde_json::json!({
                "model": "gpt-4o-mini",
                "user": "chat-7",
                "messages": [
                    { "role": "system", "content": "You plan schedules." },
                    { "role": "user", "content": "hello" }
                ]
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"choices":[{"message":{"role":"assistant","content":"hi there"}}]}"#)
            .create_async()
            .await;

        let reply = agent(server.url()).generate(ChatId(7), "hello").await.unwrap();
        assert_eq!(reply, "hi there");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_generate_maps_status_codes() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/chat/completions")
            .with_status(429)
            .create_async()
            .await;

        let err = agent(server.url()).generate(ChatId(1), "hello").await.unwrap_err();
        assert_eq!(err, AgentError::RateLimit);
    }

    #[tokio::test]
    async fn test_generate_rejects_malformed_body() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/chat/completions")
            .with_status(200)
            .with_body(r#"{"choices":[]}"#)
            .create_async()
            .await;

        let err = agent(server.url()).generate(ChatId(1), "hello").await.unwrap_err();
        assert!(matches!(err, AgentError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn test_health_reports_auth_failure() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/models")
            .with_status(401)
            .with_body("invalid api key")
            .create_async()
            .await;

        let health = agent(server.url()).health().await;
        assert_eq!(health.status, HealthStatus::Unavailable);
    }
}
