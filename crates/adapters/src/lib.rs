// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! cp-adapters: Bus, Cache, and agent-process adapters for external I/O.

pub mod agent;
pub mod bus;
pub mod cache;

pub use agent::{
    AgentOutcome, AgentOutputLine, AgentProcess, AgentProcessConfig, AgentProcessError, AgentProcessHandle,
    AgentSpawnConfig, ChildAgentProcess,
};
pub use bus::{Bus, BusEnvelope, NatsBus};
pub use cache::{Cache, RedisCache};

#[cfg(any(test, feature = "test-support"))]
pub use agent::{AgentProcessCall, FakeAgentProcess};
#[cfg(any(test, feature = "test-support"))]
pub use bus::{BusCall, FakeBus};
#[cfg(any(test, feature = "test-support"))]
pub use cache::{CacheCall, FakeCache};
