// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Configuration management commands
//!
//! Commands: show, validate, generate

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::{Path, PathBuf};

use agent_gateway_core::domain::gateway_config::GatewayConfig;

const MINIMAL_TEMPLATE: &str = include_str!("../../templates/gateway-config.yaml");
const EXAMPLES_TEMPLATE: &str = include_str!("../../templates/gateway-config-with-examples.yaml");

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Show config file paths checked
        #[arg(long)]
        paths: bool,

        /// Print the effective configuration as YAML
        #[arg(long)]
        yaml: bool,
    },

    /// Validate configuration file
    Validate {
        /// Path to config file (default: discover)
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },

    /// Generate sample configuration
    Generate {
        /// Output path (default: ./gateway-config.yaml)
        #[arg(short, long, default_value = "./gateway-config.yaml")]
        output: PathBuf,

        /// Include examples and comments
        #[arg(long)]
        examples: bool,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

pub async fn handle_command(
    command: ConfigCommand,
    config_override: Option<PathBuf>,
) -> Result<()> {
    match command {
        ConfigCommand::Show { paths, yaml } => show(config_override, paths, yaml),
        ConfigCommand::Validate { file } => validate(file.or(config_override)),
        ConfigCommand::Generate {
            output,
            examples,
            force,
        } => generate(&output, examples, force),
    }
}

fn show(config_override: Option<PathBuf>, show_paths: bool, yaml: bool) -> Result<()> {
    let config = GatewayConfig::load_or_default(config_override.clone())
        .context("Failed to load configuration")?;

    if show_paths {
        println!("{}", "Configuration discovery paths:".bold());
        if let Some(path) = &config_override {
            println!("  1. --config flag: {}", path.display());
        } else {
            println!("  1. --config flag: {}", "(not set)".dimmed());
        }
        println!(
            "  2. GATEWAY_CONFIG_PATH: {}",
            std::env::var("GATEWAY_CONFIG_PATH")
                .unwrap_or_else(|_| "(not set)".to_string())
                .dimmed()
        );
        println!("  3. ./gateway-config.yaml");
        println!("  4. ~/.agent-gateway/config.yaml");
        println!("  5. /etc/agent-gateway/config.yaml");
        println!();
    }

    if yaml {
        print!("{}", config.to_yaml_string()?);
        return Ok(());
    }

    let spec = &config.spec;
    println!("{}", "Current configuration:".bold());
    println!();

    println!("{}", "Server:".bold());
    println!("  Name: {}", config.metadata.name);
    println!("  Mode: {}", spec.mode);
    println!("  Listen: {}:{}", spec.server.host, spec.server.port);
    println!("  Upstream timeout: {}s", spec.server.upstream_timeout_secs);
    println!(
        "  Error details: {}",
        if config.expose_error_details() {
            "exposed"
        } else {
            "hidden"
        }
    );
    println!();

    println!("{}", "Authentication:".bold());
    println!("  Algorithm: {}", spec.auth.algorithm);
    let key_source = match (&spec.auth.public_key, &spec.auth.public_key_path) {
        (Some(key), _) if key.starts_with("env:") => key.clone(),
        (Some(_), _) => "(inline)".to_string(),
        (None, Some(path)) => path.clone(),
        (None, None) => "(not set)".to_string(),
    };
    println!("  Key: {}", key_source);
    println!();

    println!("{}", "Integrations:".bold());
    for (name, url) in [
        ("Authentication", &spec.integrations.auth_service_url),
        ("Agenda", &spec.integrations.agenda_service_url),
        ("Snapshot", &spec.integrations.snapshot_service_url),
    ] {
        match url {
            Some(url) => println!("  {}: {}", name, url),
            None => println!("  {}: {}", name, "(disabled)".dimmed()),
        }
    }
    println!();

    println!("{}", "Agents:".bold());
    if spec.agents.is_empty() {
        println!("  {}", "(none)".dimmed());
    }
    for agent in &spec.agents {
        let status = if agent.enabled {
            "enabled".green()
        } else {
            "disabled".dimmed()
        };
        println!("  {} ({:?}) {}", agent.name.bold(), agent.kind, status);
        if let Some(model) = &agent.model {
            println!("    Model: {}", model);
        }
        if let Some(endpoint) = &agent.endpoint {
            println!("    Endpoint: {}", endpoint);
        }
    }
    println!();

    println!("{}", "Persistence:".bold());
    match &spec.database {
        Some(_) => println!("  PostgreSQL"),
        None => println!("  In-memory"),
    }
    println!();

    Ok(())
}

fn validate(config_path: Option<PathBuf>) -> Result<()> {
    println!("Validating configuration...");

    let config =
        GatewayConfig::load_or_default(config_path).context("Failed to load configuration")?;

    config
        .validate()
        .context("Configuration validation failed")?;

    println!("{}", "✓ Configuration is valid".green());

    Ok(())
}

fn generate(output: &Path, with_examples: bool, force: bool) -> Result<()> {
    if output.exists() && !force {
        anyhow::bail!(
            "{} already exists. Use --force to overwrite",
            output.display()
        );
    }

    let sample = if with_examples {
        EXAMPLES_TEMPLATE
    } else {
        MINIMAL_TEMPLATE
    };

    std::fs::write(output, sample)
        .with_context(|| format!("Failed to write config to {:?}", output))?;

    println!(
        "{}",
        format!("✓ Configuration generated: {}", output.display()).green()
    );

    Ok(())
}
