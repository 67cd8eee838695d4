// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Upstream HTTP Client
//
// One pooled `reqwest::Client` shared by every proxied request, plus the
// reachability probe used by the service health report.
//
// The configured timeout bounds connecting, waiting for the response head and
// each idle gap while reading. It never bounds a whole streamed body.

use anyhow::Context;
use async_trait::async_trait;
use std::time::Duration;

use crate::application::health::UpstreamProbe;
use crate::domain::gateway_config::ServerConfig;

#[derive(Clone)]
pub struct UpstreamClient {
    client: reqwest::Client,
    timeout: Duration,
}

impl UpstreamClient {
    pub fn new(timeout: Duration, pool_max_idle: usize) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(timeout)
            .read_timeout(timeout)
            .pool_max_idle_per_host(pool_max_idle)
            // Upstream redirects are relayed to the caller untouched
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .context("Failed to build upstream HTTP client")?;

        Ok(Self { client, timeout })
    }

    pub fn from_config(config: &ServerConfig) -> anyhow::Result<Self> {
        Self::new(
            Duration::from_secs(config.upstream_timeout_secs),
            config.upstream_pool_max_idle,
        )
    }

    pub fn inner(&self) -> &reqwest::Client {
        &self.client
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Sends `request` and waits at most [`Self::timeout`] for the response head.
    pub async fn send(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, UpstreamSendError> {
        match tokio::time::timeout(self.timeout, request.send()).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(e)) if e.is_timeout() => Err(UpstreamSendError::Timeout),
            Ok(Err(e)) => Err(UpstreamSendError::Failed(e.to_string())),
            Err(_) => Err(UpstreamSendError::Timeout),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum UpstreamSendError {
    #[error("no response head within the deadline")]
    Timeout,

    #[error("{0}")]
    Failed(String),
}

/// Pings `GET {base}/api/health/ping` on an integrated service.
pub struct HttpUpstreamProbe {
    name: String,
    url: String,
    client: UpstreamClient,
}

impl HttpUpstreamProbe {
    pub fn new(name: impl Into<String>, base_url: &str, client: &UpstreamClient) -> Self {
        Self {
            name: name.into(),
            url: format!("{}/api/health/ping", base_url.trim_end_matches('/')),
            client: client.clone(),
        }
    }
}

#[async_trait]
impl UpstreamProbe for HttpUpstreamProbe {
    fn name(&self) -> &str {
        &self.name
    }

    async fn ping(&self) -> Result<(), String> {
        let request = self.client.inner().get(&self.url).timeout(self.client.timeout());
        let response = self.client.send(request).await.map_err(|e| e.to_string())?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(format!("HTTP {}", response.status()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    #[tokio::test]
    async fn test_probe_reports_status() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/health/ping")
            .with_status(204)
            .create_async()
            .await;

        let client = UpstreamClient::new(Duration::from_secs(2), 4).unwrap();
        let probe = HttpUpstreamProbe::new("Agenda Service", &format!("{}/", server.url()), &client);
        assert_eq!(probe.name(), "Agenda Service");
        assert_ok!(probe.ping().await);
    }

    #[tokio::test]
    async fn test_probe_failure_status() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/health/ping")
            .with_status(503)
            .create_async()
            .await;

        let client = UpstreamClient::new(Duration::from_secs(2), 4).unwrap();
        let probe = HttpUpstreamProbe::new("Snapshot Service", &server.url(), &client);
        let err = assert_err!(probe.ping().await);
        assert_eq!(err, "HTTP 503 Service Unavailable");

        let unreachable = HttpUpstreamProbe::new("Auth Service", "http://127.0.0.1:9", &client);
        assert_err!(unreachable.ping().await);
    }

    #[tokio::test]
    async fn test_ping_times_out_on_silent_service() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let client = UpstreamClient::new(Duration::from_millis(200), 4).unwrap();
        let probe = HttpUpstreamProbe::new("Agenda Service", &base, &client);
        let err = assert_err!(probe.ping().await);
        assert!(!err.is_empty());
    }
}
