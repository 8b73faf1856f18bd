// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! cp-manager library surface.
//!
//! This module exposes the operator protocol types and configuration
//! loader for reuse by anything embedding the Manager (tests, a future
//! thin CLI client); `main.rs` owns process wiring.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod config;
pub mod container;
pub mod listener;
pub mod protocol;
pub mod subscriptions;

pub use config::{CliOverrides, Config, ConfigError};
pub use container::{ContainerSpawner, ProcessContainerSpawner, SpawnedContainer};
pub use listener::ListenCtx;
pub use protocol::{ProtocolError, Request, Response, TimeRange, MAX_MESSAGE_SIZE};
