// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Application state shared by every request task.
//
// Built once at startup from the validated configuration. Nothing in here
// is mutated after construction.

use anyhow::Context;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;

use crate::application::agent_factory::AgentFactory;
use crate::application::exchange::{ExchangeService, StandardExchangeService};
use crate::application::health::{HealthService, UpstreamProbe};
use crate::domain::gateway_config::{resolve_secret, GatewayConfig};
use crate::domain::identity::{CredentialValidator, RolePolicy};
use crate::domain::repository::{ChatRepository, MessageRepository};
use crate::domain::route::RouteRegistry;
use crate::infrastructure::agents::build_agents;
use crate::infrastructure::repositories::{
    InMemoryChatRepository, InMemoryMessageRepository, PostgresChatRepository,
    PostgresMessageRepository,
};
use crate::infrastructure::{
    build_route_registry, Database, HttpUpstreamProbe, JwtCredentialValidator, UpstreamClient,
};

pub struct AppState {
    pub registry: Arc<RouteRegistry>,
    pub validator: Arc<dyn CredentialValidator>,
    pub policy: RolePolicy,
    pub upstream: UpstreamClient,
    pub agents: Arc<AgentFactory>,
    pub exchange: Arc<dyn ExchangeService>,
    pub chats: Arc<dyn ChatRepository>,
    pub messages: Arc<dyn MessageRepository>,
    pub health: Arc<HealthService>,
    pub start_time: Instant,
    pub expose_error_details: bool,
    pub identity_headers: bool,
    pub max_body_bytes: usize,
}

impl AppState {
    /// Wires every component from configuration.
    ///
    /// Fails on an inconsistent route table, duplicate agent names, unusable
    /// key material or an unreachable database.
    pub async fn from_config(config: &GatewayConfig) -> anyhow::Result<Self> {
        let spec = &config.spec;

        let validator = JwtCredentialValidator::from_config(&spec.auth)
            .context("Failed to initialize credential validator")?;
        let (registry, integrations) = build_route_registry(spec)?;
        let upstream = UpstreamClient::from_config(&spec.server)?;

        let (chats, messages): (Arc<dyn ChatRepository>, Arc<dyn MessageRepository>) =
            match &spec.database {
                Some(db) => {
                    let url = resolve_secret(&db.url)?;
                    let database = Database::new(&url, db.max_connections).await?;
                    database.ensure_schema().await?;
                    info!("Using PostgreSQL persistence");
                    (
                        Arc::new(PostgresChatRepository::new(database.get_pool().clone())),
                        Arc::new(PostgresMessageRepository::new(database.get_pool().clone())),
                    )
                }
                None => {
                    info!("No database configured, using in-memory persistence");
                    (
                        Arc::new(InMemoryChatRepository::new()),
                        Arc::new(InMemoryMessageRepository::new()),
                    )
                }
            };

        let agents = Arc::new(
            AgentFactory::discover(build_agents(&spec.agents)?)
                .context("Failed to register agents")?
                .with_probe_timeout(Duration::from_secs(spec.health.agent_probe_timeout_secs)),
        );

        let exchange = Arc::new(StandardExchangeService::new(
            chats.clone(),
            messages.clone(),
            agents.clone(),
            &spec.exchange,
        ));

        let probes: Vec<Arc<dyn UpstreamProbe>> = integrations
            .iter()
            .map(|i| {
                Arc::new(HttpUpstreamProbe::new(i.name, &i.base_url, &upstream))
                    as Arc<dyn UpstreamProbe>
            })
            .collect();
        let health = Arc::new(HealthService::new(chats.clone(), probes, agents.clone()));

        Ok(Self {
            registry: Arc::new(registry),
            validator: Arc::new(validator),
            policy: RolePolicy::new(spec.mode),
            upstream,
            agents,
            exchange,
            chats,
            messages,
            health,
            start_time: Instant::now(),
            expose_error_details: config.expose_error_details(),
            identity_headers: spec.auth.identity_headers,
            max_body_bytes: spec.server.max_body_bytes,
        })
    }
}
