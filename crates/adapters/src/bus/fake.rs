// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake Bus for deterministic testing.

use super::{Bus, BusEnvelope};
use async_trait::async_trait;
use cp_core::AdapterError;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Recorded call to `FakeBus`, for assertions in tests.
#[derive(Debug, Clone)]
pub enum BusCall {
    Publish { subject: String },
    Subscribe { subject_pattern: String },
    Request { subject: String },
    Reply { reply_to: String },
}

/// In-process Bus. Subject matching supports a single trailing or
/// embedded `*` wildcard segment, matching the real Bus's hierarchical
/// subject semantics closely enough for unit tests.
#[derive(Clone)]
pub struct FakeBus {
    inner: Arc<Mutex<FakeBusState>>,
}

struct FakeBusState {
    subscribers: Vec<(String, mpsc::Sender<BusEnvelope>)>,
    calls: Vec<BusCall>,
    request_handlers: HashMap<String, Vec<u8>>,
}

impl Default for FakeBus {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeBus {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(FakeBusState {
                subscribers: Vec::new(),
                calls: Vec::new(),
                request_handlers: HashMap::new(),
            })),
        }
    }

    pub fn calls(&self) -> Vec<BusCall> {
        self.inner.lock().calls.clone()
    }

    /// Pre-program the payload `request()` returns for a given subject,
    /// bypassing the need for a live responder.
    pub fn set_request_response(&self, subject: &str, payload: Vec<u8>) {
        self.inner.lock().request_handlers.insert(subject.to_string(), payload);
    }

    fn matches(pattern: &str, subject: &str) -> bool {
        let pattern_segments: Vec<&str> = pattern.split('.').collect();
        let subject_segments: Vec<&str> = subject.split('.').collect();
        if pattern_segments.len() != subject_segments.len() {
            return false;
        }
        pattern_segments
            .iter()
            .zip(subject_segments.iter())
            .all(|(p, s)| *p == "*" || p == s)
    }
}

#[async_trait]
impl Bus for FakeBus {
    async fn publish(&self, subject: &str, payload: Vec<u8>) -> Result<(), AdapterError> {
        let mut inner = self.inner.lock();
        inner.calls.push(BusCall::Publish { subject: subject.to_string() });
        let envelope = BusEnvelope {
            subject: subject.to_string(),
            payload,
            reply_to: None,
        };
        inner.subscribers.retain(|(pattern, tx)| {
            if Self::matches(pattern, subject) {
                let _ = tx.try_send(envelope.clone());
            }
            !tx.is_closed()
        });
        Ok(())
    }

    async fn subscribe(&self, subject_pattern: &str) -> Result<mpsc::Receiver<BusEnvelope>, AdapterError> {
        let (tx, rx) = mpsc::channel(256);
        let mut inner = self.inner.lock();
        inner.calls.push(BusCall::Subscribe {
            subject_pattern: subject_pattern.to_string(),
        });
        inner.subscribers.push((subject_pattern.to_string(), tx));
        Ok(rx)
    }

    async fn request(
        &self,
        subject: &str,
        _payload: Vec<u8>,
        _timeout: Duration,
    ) -> Result<Vec<u8>, AdapterError> {
        let mut inner = self.inner.lock();
        inner.calls.push(BusCall::Request { subject: subject.to_string() });
        inner
            .request_handlers
            .remove(subject)
            .ok_or_else(|| AdapterError::timeout(format!("no fake response programmed for {subject}")))
    }

    async fn reply(&self, reply_to: &str, payload: Vec<u8>) -> Result<(), AdapterError> {
        let mut inner = self.inner.lock();
        inner.calls.push(BusCall::Reply { reply_to: reply_to.to_string() });
        drop(inner);
        self.publish(reply_to, payload).await
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
