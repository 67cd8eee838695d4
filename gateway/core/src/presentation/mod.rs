// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Presentation Layer (`agent-gateway-core`)
//!
//! HTTP surface of the gateway. **No business logic lives here**: requests
//! are authenticated, then either forwarded upstream or handed to the
//! application services in `crate::application`.
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`api`] | Router and middleware stack |
//! | [`auth`] | Bearer authentication and tier enforcement |
//! | [`proxy`] | Reverse proxy to registered upstreams |
//! | [`error`] | JSON error rendering |
//! | [`handlers`] | Local endpoints: health, chats, exchange, agents |

pub mod api;
pub mod auth;
pub mod error;
pub mod handlers;
pub mod proxy;
pub mod state;

pub use api::app;
pub use error::ApiError;
pub use state::AppState;
