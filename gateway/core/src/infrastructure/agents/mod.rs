// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Agent Backends - Anti-Corruption Layer Implementations
//
// Each adapter translates between the `AgentGateway` contract and one
// external chat API. The catalog below is the only place that knows the
// concrete adapter types; everything else sees `Arc<dyn AgentGateway>`.

pub mod anthropic;
pub mod echo;
pub mod ollama;
pub mod openai;

pub use anthropic::AnthropicAgent;
pub use echo::EchoAgent;
pub use ollama::OllamaAgent;
pub use openai::OpenAIAgent;

use anyhow::Context;
use reqwest::StatusCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::domain::agent::{AgentError, AgentGateway};
use crate::domain::gateway_config::{resolve_secret, AgentConfig, AgentKind};

const OPENAI_ENDPOINT: &str = "https://api.openai.com/v1";
const ANTHROPIC_ENDPOINT: &str = "https://api.anthropic.com/v1";

/// Build every enabled agent from configuration.
///
/// The result feeds `AgentFactory::discover`, which enforces name uniqueness.
pub fn build_agents(configs: &[AgentConfig]) -> anyhow::Result<Vec<Arc<dyn AgentGateway>>> {
    let mut agents = Vec::new();

    for config in configs {
        if !config.enabled {
            info!("Agent '{}' disabled, skipping", config.name);
            continue;
        }
        let agent = create_agent(config)
            .with_context(|| format!("Failed to initialize agent '{}'", config.name))?;
        agents.push(agent);
    }

    Ok(agents)
}

fn create_agent(config: &AgentConfig) -> anyhow::Result<Arc<dyn AgentGateway>> {
    let api_key = match &config.api_key {
        Some(key) => resolve_secret(key)?,
        None => String::new(),
    };
    let timeout = Duration::from_secs(config.timeout_secs);
    let model = || {
        config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("No model configured"))
    };
    let endpoint = |default: Option<&str>| {
        config
            .endpoint
            .clone()
            .or_else(|| default.map(str::to_string))
            .ok_or_else(|| anyhow::anyhow!("No endpoint configured"))
    };

    let agent: Arc<dyn AgentGateway> = match config.kind {
        AgentKind::Openai | AgentKind::OpenaiCompatible => {
            let endpoint = endpoint(match config.kind {
                AgentKind::Openai => Some(OPENAI_ENDPOINT),
                _ => None,
            })?;
            Arc::new(
                OpenAIAgent::new(&config.name, endpoint, api_key, model()?, timeout)?
                    .with_system_prompt(config.system_prompt.clone()),
            )
        }
        AgentKind::Ollama => Arc::new(
            OllamaAgent::new(&config.name, endpoint(None)?, model()?, timeout)?
                .with_system_prompt(config.system_prompt.clone()),
        ),
        AgentKind::Anthropic => Arc::new(
            AnthropicAgent::new(
                &config.name,
                endpoint(Some(ANTHROPIC_ENDPOINT))?,
                api_key,
                model()?,
                timeout,
            )?
            .with_system_prompt(config.system_prompt.clone()),
        ),
        AgentKind::Echo => Arc::new(EchoAgent::new(&config.name)),
    };

    info!("Initialized {:?} agent: {}", config.kind, config.name);
    Ok(agent)
}

pub(crate) fn http_client(timeout: Duration) -> anyhow::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .context("Failed to build agent HTTP client")
}

/// Maps a transport failure onto the typed generation error.
pub(crate) fn transport_error(err: reqwest::Error, timeout: Duration) -> AgentError {
    if err.is_timeout() {
        AgentError::Timeout(timeout)
    } else if err.is_decode() {
        AgentError::MalformedResponse(err.to_string())
    } else {
        AgentError::Network(err.to_string())
    }
}

/// Maps a non-success backend status onto the typed generation error.
pub(crate) fn status_error(status: StatusCode, body: String) -> AgentError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => AgentError::Authentication(body),
        StatusCode::TOO_MANY_REQUESTS => AgentError::RateLimit,
        _ => AgentError::Backend {
            status: status.as_u16(),
            message: body,
        },
    }
}

/// Reads a failed response into an `AgentError`.
pub(crate) async fn error_from_response(response: reqwest::Response) -> AgentError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    status_error(status, body)
}
