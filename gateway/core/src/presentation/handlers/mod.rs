// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod agents;
pub mod chats;
pub mod exchange;
pub mod health;
