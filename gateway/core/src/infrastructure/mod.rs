// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Infrastructure Layer - Adapters for external systems
//
// Credential validation, the upstream HTTP client, agent backends,
// persistence and the built-in integration routes.

pub mod agents;
pub mod db;
pub mod http_client;
pub mod integrations;
pub mod jwt;
pub mod repositories;

pub use db::Database;
pub use http_client::{HttpUpstreamProbe, UpstreamClient};
pub use integrations::{build_route_registry, Integration};
pub use jwt::JwtCredentialValidator;
