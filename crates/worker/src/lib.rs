// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! cp-worker library surface.
//!
//! This module exposes the configuration loader and subscription wiring
//! for reuse by anything embedding the Worker (tests); `main.rs` owns
//! process wiring.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod config;
pub mod identity;
pub mod subscriptions;

pub use config::{CliOverrides, Config, ConfigError};
