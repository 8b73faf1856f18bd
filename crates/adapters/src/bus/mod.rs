// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bus adapter: publish/subscribe and request-reply messaging (§4.1).

mod nats;

pub use nats::NatsBus;

#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{BusCall, FakeBus};

use async_trait::async_trait;
use cp_core::AdapterError;
use std::time::Duration;
use tokio::sync::mpsc;

/// One inbound message delivered to a subscription.
#[derive(Debug, Clone)]
pub struct BusEnvelope {
    pub subject: String,
    pub payload: Vec<u8>,
    /// Present when the sender expects a reply (request-reply calls).
    pub reply_to: Option<String>,
}

/// Adapter for the message bus. Required semantics (§4.1): at-least-once
/// delivery, no ordering guarantee across subjects, per-subscription FIFO.
#[async_trait]
pub trait Bus: Clone + Send + Sync + 'static {
    /// Publish a message on `subject`. No reply is expected.
    async fn publish(&self, subject: &str, payload: Vec<u8>) -> Result<(), AdapterError>;

    /// Subscribe to `subject_pattern` (hierarchical, `*` matches one
    /// segment). Messages are delivered in FIFO order within this
    /// subscription only.
    async fn subscribe(&self, subject_pattern: &str) -> Result<mpsc::Receiver<BusEnvelope>, AdapterError>;

    /// Publish on `subject` and await a single reply within `timeout`.
    /// Times out with `AdapterError::timeout` if nothing replies in time.
    async fn request(
        &self,
        subject: &str,
        payload: Vec<u8>,
        timeout: Duration,
    ) -> Result<Vec<u8>, AdapterError>;

    /// Reply to a message previously received with a `reply_to` address.
    async fn reply(&self, reply_to: &str, payload: Vec<u8>) -> Result<(), AdapterError>;
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
