// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Service Health - Dependency Aggregation
//
// Collects the persistence store, configured upstream services and every
// registered agent into one report. Each check runs concurrently and is
// reported independently.

use async_trait::async_trait;
use futures::future::join_all;
use serde::Serialize;
use std::sync::Arc;
use tracing::warn;

use crate::application::agent_factory::AgentFactory;
use crate::domain::agent::HealthStatus;
use crate::domain::repository::ChatRepository;

/// Reachability check of one upstream service.
#[async_trait]
pub trait UpstreamProbe: Send + Sync {
    fn name(&self) -> &str;

    async fn ping(&self) -> Result<(), String>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DependencyKind {
    Database,
    Http,
    Agent,
}

#[derive(Debug, Clone, Serialize)]
pub struct DependencyHealth {
    #[serde(rename = "type")]
    pub kind: DependencyKind,
    pub name: String,
    pub status: HealthStatus,
    pub details: Option<serde_json::Value>,
}

impl DependencyHealth {
    fn from_result(kind: DependencyKind, name: String, result: Result<(), String>) -> Self {
        match result {
            Ok(()) => Self {
                kind,
                name,
                status: HealthStatus::Ok,
                details: None,
            },
            Err(error) => {
                warn!("[HealthCheck] {} check failed: {}", name, error);
                Self {
                    kind,
                    name,
                    status: HealthStatus::Unavailable,
                    details: Some(serde_json::json!({ "error": error })),
                }
            }
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ServiceHealthReport {
    pub status: HealthStatus,
    pub dependencies: Vec<DependencyHealth>,
}

pub struct HealthService {
    chats: Arc<dyn ChatRepository>,
    upstreams: Vec<Arc<dyn UpstreamProbe>>,
    agents: Arc<AgentFactory>,
}

impl HealthService {
    pub fn new(
        chats: Arc<dyn ChatRepository>,
        upstreams: Vec<Arc<dyn UpstreamProbe>>,
        agents: Arc<AgentFactory>,
    ) -> Self {
        Self {
            chats,
            upstreams,
            agents,
        }
    }

    pub async fn service_health(&self) -> ServiceHealthReport {
        let database = async {
            let result = self.chats.ping().await.map_err(|e| e.to_string());
            DependencyHealth::from_result(DependencyKind::Database, "Persistence".to_string(), result)
        };

        let upstreams = join_all(self.upstreams.iter().map(|probe| async move {
            let result = probe.ping().await;
            DependencyHealth::from_result(DependencyKind::Http, probe.name().to_string(), result)
        }));

        let (database, upstreams, agents) =
            tokio::join!(database, upstreams, self.agents.health_all());

        let mut dependencies = vec![database];
        dependencies.extend(upstreams);
        dependencies.extend(agents.into_iter().map(|(name, health)| DependencyHealth {
            kind: DependencyKind::Agent,
            name: format!("Agent: {}", name),
            status: health.status,
            details: health.detail,
        }));

        let status = if dependencies.iter().all(|d| d.status == HealthStatus::Ok) {
            HealthStatus::Ok
        } else {
            HealthStatus::Degraded
        };

        ServiceHealthReport {
            status,
            dependencies,
        }
    }
}
