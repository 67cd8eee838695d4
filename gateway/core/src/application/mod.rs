// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Mod
//!
//! Use cases coordinating domain ports.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Agent factory, chat exchange and health aggregation

pub mod agent_factory;
pub mod exchange;
pub mod health;

pub use agent_factory::{AgentFactory, FactoryError};
pub use exchange::{ExchangeError, ExchangeService, StandardExchangeService};
pub use health::{HealthService, ServiceHealthReport, UpstreamProbe};
