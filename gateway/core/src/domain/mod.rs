// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Mod
//!
//! Provides the pure domain model of the gateway.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Types, ports and policies with no I/O

pub mod agent;
pub mod chat;
pub mod gateway_config;
pub mod identity;
pub mod repository;
pub mod route;
