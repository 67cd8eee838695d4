// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # Agent Gateway CLI
//!
//! The `agent-gateway` binary runs the gateway server and inspects its
//! configuration.
//!
//! ## Commands
//!
//! - `agent-gateway serve` - Run the HTTP gateway
//! - `agent-gateway config show|validate|generate` - Configuration management
//! - `agent-gateway routes` - Print the resolved route table
//! - `agent-gateway agents [--health]` - List configured agents

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

use agent_gateway_core::domain::gateway_config::GatewayConfig;

mod commands;
mod server;

use commands::ConfigCommand;

/// Agent Gateway - One authenticated entry point for services and AI agents
#[derive(Parser)]
#[command(name = "agent-gateway")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(
        short,
        long,
        global = true,
        env = "GATEWAY_CONFIG_PATH",
        value_name = "FILE"
    )]
    config: Option<PathBuf>,

    /// HTTP listen port (overrides spec.server.port)
    #[arg(long, global = true, env = "GATEWAY_PORT")]
    port: Option<u16>,

    /// HTTP listen address (overrides spec.server.host)
    #[arg(long, global = true, env = "GATEWAY_HOST")]
    host: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "GATEWAY_LOG_LEVEL", default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the gateway HTTP server
    #[command(name = "serve")]
    Serve,

    /// Configuration management
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },

    /// Print the resolved route table
    #[command(name = "routes")]
    Routes,

    /// List configured agents
    #[command(name = "agents")]
    Agents {
        /// Probe every agent backend
        #[arg(long)]
        health: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is not an error
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Serve) => {
            let mut config = GatewayConfig::load_or_default(cli.config)
                .context("Failed to load configuration")?;
            if let Some(host) = cli.host {
                config.spec.server.host = host;
            }
            if let Some(port) = cli.port {
                config.spec.server.port = port;
            }

            let (level, json) = config.logging(&cli.log_level);
            init_logging(&level, json)?;

            server::start_server(config).await
        }
        Some(Commands::Config { command }) => {
            init_logging(&cli.log_level, false)?;
            commands::config::handle_command(command, cli.config).await
        }
        Some(Commands::Routes) => {
            init_logging(&cli.log_level, false)?;
            commands::inspect::routes(cli.config)
        }
        Some(Commands::Agents { health }) => {
            init_logging(&cli.log_level, false)?;
            commands::inspect::agents(cli.config, health).await
        }
        None => {
            eprintln!("{}", "No command specified. Use --help for usage.".yellow());
            std::process::exit(1);
        }
    }
}

/// Initialize tracing subscriber for logging. `RUST_LOG` wins over `level`.
fn init_logging(level: &str, json: bool) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    if json {
        builder.json().init();
    } else {
        builder.compact().init();
    }

    Ok(())
}
