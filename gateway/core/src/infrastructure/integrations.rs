// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Upstream Integrations
//!
//! Route modules for the backend services the gateway fronts. Each module
//! registers its routes once on the startup [`RouteRegistryBuilder`]; an
//! integration whose base URL is not configured registers nothing.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure Layer
//! - **Purpose:** Built-in route table, public routes and configured extras

use anyhow::Context;
use tracing::info;

use crate::domain::gateway_config::GatewayConfigSpec;
use crate::domain::route::{
    MethodFilter, ProxyRoute, RewriteRule, RouteError, RouteRegistry, RouteRegistryBuilder,
};

/// Requests anyone may make without a bearer token.
pub const DEFAULT_PUBLIC_ROUTES: &[(&str, &str)] = &[
    ("*", "/health"),
    ("GET", "/api/health/*"),
    ("*", "/docs"),
    ("*", "/openapi.json"),
    ("*", "/docs/openapi.json"),
    ("POST", "/api/v1/auth/sessions"),
    ("PUT", "/api/v1/auth/sessions"),
    ("POST", "/api/v1/auth/users/register"),
];

/// A configured upstream service, kept for health probing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Integration {
    pub name: &'static str,
    pub base_url: String,
}

trait IntegrationModule {
    fn name(&self) -> &'static str;

    fn register(&self, base_url: &str, builder: &mut RouteRegistryBuilder)
        -> Result<(), RouteError>;
}

struct AuthIntegration;

impl IntegrationModule for AuthIntegration {
    fn name(&self) -> &'static str {
        "Authentication Service"
    }

    fn register(
        &self,
        base_url: &str,
        builder: &mut RouteRegistryBuilder,
    ) -> Result<(), RouteError> {
        // Any POST under /users is a sign-up, including the public /users/register
        let route = ProxyRoute::new("/api/v1/auth", base_url, None)?
            .with_rewrite(RewriteRule::new(
                MethodFilter::Only(axum::http::Method::POST),
                r"^/users(/|$)",
                "/api/v1/users/register",
            )?)
            .with_rewrite(RewriteRule::new(
                MethodFilter::Only(axum::http::Method::GET),
                r"^/users/me",
                "/api/v1/users/me",
            )?);
        builder.register(route)
    }
}

struct AgendaIntegration;

impl IntegrationModule for AgendaIntegration {
    fn name(&self) -> &'static str {
        "Agenda Service"
    }

    fn register(
        &self,
        base_url: &str,
        builder: &mut RouteRegistryBuilder,
    ) -> Result<(), RouteError> {
        // The service mounts its API under /api/v1 without the agenda segment
        let upstream = format!("{}/api/v1", base_url.trim_end_matches('/'));
        builder.register(ProxyRoute::new(
            "/api/v1/agenda",
            &upstream,
            Some("/api/v1/agenda"),
        )?)
    }
}

struct SnapshotIntegration;

impl IntegrationModule for SnapshotIntegration {
    fn name(&self) -> &'static str {
        "Snapshot Service"
    }

    fn register(
        &self,
        base_url: &str,
        builder: &mut RouteRegistryBuilder,
    ) -> Result<(), RouteError> {
        builder.register(ProxyRoute::new("/api/v1/snapshot", base_url, None)?)
    }
}

/// Builds the immutable route table from the built-in integrations, the
/// default public routes and any extra routes in configuration.
///
/// Any registration failure is fatal: the gateway must not start with a
/// partially populated registry.
pub fn build_route_registry(
    spec: &GatewayConfigSpec,
) -> anyhow::Result<(RouteRegistry, Vec<Integration>)> {
    let mut builder = RouteRegistry::builder();
    let mut integrations = Vec::new();

    let modules: [(&dyn IntegrationModule, &Option<String>); 3] = [
        (&AuthIntegration, &spec.integrations.auth_service_url),
        (&AgendaIntegration, &spec.integrations.agenda_service_url),
        (&SnapshotIntegration, &spec.integrations.snapshot_service_url),
    ];

    for (module, base_url) in modules {
        let Some(base_url) = base_url else {
            info!("{} not configured, skipping its routes", module.name());
            continue;
        };
        module
            .register(base_url, &mut builder)
            .with_context(|| format!("Failed to register routes for {}", module.name()))?;
        integrations.push(Integration {
            name: module.name(),
            base_url: base_url.clone(),
        });
    }

    for route in &spec.routes {
        let proxy_route = route
            .to_route()
            .with_context(|| format!("Invalid route '{}'", route.prefix))?;
        builder.register(proxy_route)?;
    }

    for (method, path) in DEFAULT_PUBLIC_ROUTES {
        builder.add_public(method, path)?;
    }
    for public in &spec.public_routes {
        builder.add_public(&public.method, &public.path)?;
    }

    let registry = builder.build();
    for route in registry.routes() {
        info!(
            "Proxy route {} -> {} (min tier {})",
            route.prefix(),
            route.upstream_base(),
            route.min_tier()
        );
    }

    Ok((registry, integrations))
}
