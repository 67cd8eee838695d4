// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Shared helpers for router-level tests.
#![allow(dead_code)]

use agent_gateway_core::domain::gateway_config::GatewayConfig;
use agent_gateway_core::domain::identity::DeploymentMode;
use agent_gateway_core::presentation::{app, AppState};
use axum::body::Body;
use axum::http::{HeaderMap, Request, StatusCode};
use axum::Router;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tower::ServiceExt;

pub const PRIVATE_PEM: &str = include_str!("../fixtures/jwt_rs256.pem");
pub const PUBLIC_PEM: &str = include_str!("../fixtures/jwt_rs256.pub.pem");

/// Mints an RS256 token valid for one hour.
pub fn token(subject: &str, role: Option<&str>) -> String {
    let mut claims = json!({
        "sub": subject,
        "exp": chrono::Utc::now().timestamp() + 3600,
    });
    if let Some(role) = role {
        claims["role"] = json!(role);
    }
    let key = EncodingKey::from_rsa_pem(PRIVATE_PEM.as_bytes()).unwrap();
    encode(&Header::new(Algorithm::RS256), &claims, &key).unwrap()
}

pub fn bearer(subject: &str, role: &str) -> String {
    format!("Bearer {}", token(subject, Some(role)))
}

pub fn config(mode: DeploymentMode) -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.spec.mode = mode;
    config.spec.auth.public_key = Some(PUBLIC_PEM.to_string());
    config
}

pub async fn gateway(config: &GatewayConfig) -> (Router, Arc<AppState>) {
    let state = Arc::new(AppState::from_config(config).await.unwrap());
    (app(state.clone()), state)
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap()
    }

    pub fn text(&self) -> String {
        String::from_utf8(self.body.clone()).unwrap()
    }
}

pub async fn send(router: &Router, request: Request<Body>) -> TestResponse {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec();
    TestResponse {
        status,
        headers,
        body,
    }
}

pub fn get(uri: &str, authorization: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(value) = authorization {
        builder = builder.header("authorization", value);
    }
    builder.body(Body::empty()).unwrap()
}

pub fn post_json(uri: &str, authorization: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(value) = authorization {
        builder = builder.header("authorization", value);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

/// An address nothing listens on.
pub fn closed_port_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}

/// A listener that accepts connections at the kernel level but never answers.
pub async fn silent_upstream() -> (tokio::net::TcpListener, String) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    (listener, url)
}

/// Serves a single chunked `200` whose chunks are written `gap` apart.
pub async fn trickling_upstream(chunks: Vec<&'static str>, gap: Duration) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut head = Vec::new();
        let mut buf = [0u8; 1024];
        while !head.windows(4).any(|w| w == b"\r\n\r\n") {
            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 {
                return;
            }
            head.extend_from_slice(&buf[..n]);
        }

        socket
            .write_all(
                b"HTTP/1.1 200 OK\r\ncontent-type: text/plain\r\n\
                  transfer-encoding: chunked\r\nconnection: close\r\n\r\n",
            )
            .await
            .unwrap();
        for chunk in chunks {
            let frame = format!("{:x}\r\n{}\r\n", chunk.len(), chunk);
            socket.write_all(frame.as_bytes()).await.unwrap();
            socket.flush().await.unwrap();
            tokio::time::sleep(gap).await;
        }
        socket.write_all(b"0\r\n\r\n").await.unwrap();
    });

    url
}
