// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Agent Factory - Name Resolution and Health Aggregation
//
// Indexes every agent produced by the startup catalog under its lowercase
// name. The index is immutable once built and shared by reference.

use futures::future::join_all;
use futures::FutureExt;
use std::collections::{BTreeMap, HashMap};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::domain::agent::{AgentDescriptor, AgentGateway, AgentHealth};

const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FactoryError {
    #[error("Agent name '{0}' is registered more than once")]
    DuplicateAgentName(String),

    #[error("Agent name cannot be empty")]
    InvalidAgentName,

    #[error("Agent `{0}` is not supported")]
    AgentNotFound(String),
}

/// Registry of agents available to the exchange orchestrator.
pub struct AgentFactory {
    agents: HashMap<String, AgentDescriptor>,
    probe_timeout: Duration,
}

impl AgentFactory {
    /// Index every agent in `catalog`, failing on a name collision.
    pub fn discover<I>(catalog: I) -> Result<Self, FactoryError>
    where
        I: IntoIterator<Item = Arc<dyn AgentGateway>>,
    {
        let mut agents = HashMap::new();

        for implementation in catalog {
            let name = implementation.name().trim().to_lowercase();
            if name.is_empty() {
                return Err(FactoryError::InvalidAgentName);
            }
            if agents.contains_key(&name) {
                return Err(FactoryError::DuplicateAgentName(name));
            }
            info!("Registered agent: {}", name);
            agents.insert(
                name.clone(),
                AgentDescriptor {
                    name,
                    implementation,
                },
            );
        }

        if agents.is_empty() {
            warn!("No agents configured - chat exchanges will fail until one is added");
        }

        Ok(Self {
            agents,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
        })
    }

    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    /// Case-insensitive lookup.
    pub fn get(&self, name: &str) -> Result<&AgentDescriptor, FactoryError> {
        self.agents
            .get(&name.trim().to_lowercase())
            .ok_or_else(|| FactoryError::AgentNotFound(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.agents.contains_key(&name.trim().to_lowercase())
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.agents.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// Probe every agent concurrently.
    ///
    /// Each probe is isolated: a timeout or a panic inside one agent becomes an
    /// `UNAVAILABLE` entry for that agent and does not affect the others.
    pub async fn health_all(&self) -> BTreeMap<String, AgentHealth> {
        let probes = self.agents.values().map(|descriptor| {
            let timeout = self.probe_timeout;
            async move {
                let probe = AssertUnwindSafe(descriptor.implementation.health()).catch_unwind();
                let health = match tokio::time::timeout(timeout, probe).await {
                    Ok(Ok(health)) => health,
                    Ok(Err(_)) => {
                        warn!("Health probe for agent '{}' panicked", descriptor.name);
                        AgentHealth::unavailable("health probe panicked")
                    }
                    Err(_) => {
                        warn!("Health probe for agent '{}' timed out", descriptor.name);
                        AgentHealth::unavailable(format!(
                            "health probe timed out after {:?}",
                            timeout
                        ))
                    }
                };
                (descriptor.name.clone(), health)
            }
        });

        join_all(probes).await.into_iter().collect()
    }
}

impl std::fmt::Debug for AgentFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentFactory")
            .field("agents", &self.names())
            .field("probe_timeout", &self.probe_timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::agent::{AgentError, HealthStatus};
    use crate::domain::chat::ChatId;
    use async_trait::async_trait;

    enum Probe {
        Healthy,
        Failing,
        Panicking,
        Hanging,
    }

    struct FakeAgent {
        name: &'static str,
        probe: Probe,
    }

    #[async_trait]
    impl AgentGateway for FakeAgent {
        fn name(&self) -> &str {
            self.name
        }

        async fn generate(&self, _chat_id: ChatId, new_message: &str) -> Result<String, AgentError> {
            Ok(format!("{} says: {}", self.name, new_message))
        }

        async fn check_health(&self) -> Result<AgentHealth, AgentError> {
            match self.probe {
                Probe::Healthy => Ok(AgentHealth::ok()),
                Probe::Failing => Err(AgentError::Network("connection refused".into())),
                Probe::Panicking => panic!("probe exploded"),
                Probe::Hanging => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Ok(AgentHealth::ok())
                }
            }
        }
    }

    fn agent(name: &'static str, probe: Probe) -> Arc<dyn AgentGateway> {
        Arc::new(FakeAgent { name, probe })
    }

    #[test]
    fn test_discover_and_get_case_insensitive() {
        let factory = AgentFactory::discover(vec![
            agent("Agenda", Probe::Healthy),
            agent("coach", Probe::Healthy),
        ])
        .unwrap();

        assert_eq!(factory.len(), 2);
        assert_eq!(factory.names(), vec!["agenda".to_string(), "coach".to_string()]);
        assert_eq!(factory.get("AGENDA").unwrap().name, "agenda");
        assert!(factory.contains("Coach"));
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let err = AgentFactory::discover(vec![
            agent("agenda", Probe::Healthy),
            agent("AGENDA", Probe::Healthy),
        ])
        .unwrap_err();
        assert_eq!(err, FactoryError::DuplicateAgentName("agenda".to_string()));
    }

    #[test]
    fn test_empty_name_rejected() {
        let err = AgentFactory::discover(vec![agent("  ", Probe::Healthy)]).unwrap_err();
        assert_eq!(err, FactoryError::InvalidAgentName);
    }

    #[test]
    fn test_missing_agent() {
        let factory = AgentFactory::discover(vec![agent("agenda", Probe::Healthy)]).unwrap();
        let err = factory.get("planner").unwrap_err();
        assert_eq!(err, FactoryError::AgentNotFound("planner".to_string()));
        assert_eq!(err.to_string(), "Agent `planner` is not supported");
    }

    #[tokio::test]
    async fn test_health_all_isolates_failures() {
        let factory = AgentFactory::discover(vec![
            agent("healthy", Probe::Healthy),
            agent("failing", Probe::Failing),
            agent("panicking", Probe::Panicking),
        ])
        .unwrap();

        let report = factory.health_all().await;
        assert_eq!(report.len(), 3);
        assert_eq!(report["healthy"].status, HealthStatus::Ok);
        assert_eq!(report["failing"].status, HealthStatus::Unavailable);
        assert_eq!(
            report["failing"].detail,
            Some(serde_json::json!({ "error": "Network error: connection refused" }))
        );
        assert_eq!(report["panicking"].status, HealthStatus::Unavailable);
    }

    #[tokio::test]
    async fn test_health_all_times_out_slow_probe() {
        let factory = AgentFactory::discover(vec![
            agent("healthy", Probe::Healthy),
            agent("hanging", Probe::Hanging),
        ])
        .unwrap()
        .with_probe_timeout(Duration::from_millis(200));

        let report = factory.health_all().await;
        assert_eq!(report["healthy"].status, HealthStatus::Ok);
        assert_eq!(report["hanging"].status, HealthStatus::Unavailable);
    }
}
