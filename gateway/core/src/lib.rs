// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Agent gateway core
//!
//! Authenticated dispatch engine sitting in front of upstream services and AI agents.
//!
//! # Architecture
//!
//! - **Layer:** Core System
//! - **Purpose:** Route registry, reverse proxy, auth chain, agent factory and exchange orchestration

pub mod domain;
pub mod application;
pub mod infrastructure;
pub mod presentation;

pub use domain::*;
