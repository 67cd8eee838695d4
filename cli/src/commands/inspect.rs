// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Read-only views of the resolved gateway: route table and agent catalog.

use anyhow::{Context, Result};
use colored::Colorize;
use std::path::PathBuf;
use std::time::Duration;

use agent_gateway_core::application::AgentFactory;
use agent_gateway_core::domain::agent::HealthStatus;
use agent_gateway_core::domain::gateway_config::GatewayConfig;
use agent_gateway_core::infrastructure::{agents::build_agents, build_route_registry};

pub fn routes(config_override: Option<PathBuf>) -> Result<()> {
    let config = GatewayConfig::load_or_default(config_override)
        .context("Failed to load configuration")?;
    let (registry, _) =
        build_route_registry(&config.spec).context("Failed to build route table")?;

    println!("{}", "Proxy routes:".bold());
    if registry.is_empty() {
        println!("  {}", "(none)".dimmed());
    }
    for route in registry.routes() {
        println!(
            "  {} -> {} [{}]",
            route.prefix().bold(),
            route.upstream_base(),
            route.min_tier()
        );
        if let Some(strip) = route.strip_prefix() {
            println!("    strip: {}", strip);
        }
        for rewrite in route.rewrites() {
            println!(
                "    rewrite: {} {} -> {}",
                rewrite.method, rewrite.pattern, rewrite.replacement
            );
        }
    }
    println!();

    println!("{}", "Public routes:".bold());
    for public in registry.public_routes() {
        println!("  {:<6} {}", public.method.to_string(), public.pattern);
    }

    Ok(())
}

pub async fn agents(config_override: Option<PathBuf>, probe: bool) -> Result<()> {
    let config = GatewayConfig::load_or_default(config_override)
        .context("Failed to load configuration")?;
    let factory = AgentFactory::discover(build_agents(&config.spec.agents)?)
        .context("Failed to register agents")?
        .with_probe_timeout(Duration::from_secs(
            config.spec.health.agent_probe_timeout_secs,
        ));

    if factory.is_empty() {
        println!("{}", "No agents configured".yellow());
        return Ok(());
    }

    if !probe {
        println!("{}", "Agents:".bold());
        for name in factory.names() {
            println!("  {}", name);
        }
        return Ok(());
    }

    println!("{}", "Agent health:".bold());
    for (name, health) in factory.health_all().await {
        let status = match health.status {
            HealthStatus::Ok => "OK".green(),
            HealthStatus::Degraded => "DEGRADED".yellow(),
            HealthStatus::Unavailable => "UNAVAILABLE".red(),
        };
        match health.detail {
            Some(detail) => println!("  {:<16} {} {}", name, status, detail.to_string().dimmed()),
            None => println!("  {:<16} {}", name, status),
        }
    }

    Ok(())
}
