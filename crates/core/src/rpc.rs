// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pending RPC: a Worker-initiated request awaiting operator resolution
//! (§3, §4.3.3).
//!
//! Modeled after the human-in-the-loop decision record pattern, generalized
//! to the three symmetric flows the interactive RPC broker handles.

use crate::id::{QuestionId, WorkerId};
use serde::{Deserialize, Serialize};

/// Which of the three symmetric interactive flows this Pending RPC
/// represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PendingRpcKind {
    Question,
    NextTaskRequest,
    SessionEndRequest,
}

/// How a Pending RPC was ultimately resolved. Every Pending RPC resolves
/// exactly once, by exactly one of these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PendingRpcResolution {
    /// Resolved by explicit operator action.
    Answered { answered_by: String, payload: serde_json::Value },
    /// Resolved by the deadline timer firing before the operator acted.
    TimedOut,
    /// Resolved by the Manager's graceful shutdown draining all
    /// outstanding handles.
    Shutdown,
}

/// A Worker-initiated request blocked on human/operator reply.
///
/// `reply_handle` is opaque to the broker: it is whatever the Bus adapter
/// needs to route a reply back to the original request-reply call, and is
/// never serialized to the durable store (the store only ever sees the
/// resolution, §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingRpc {
    pub question_id: QuestionId,
    pub kind: PendingRpcKind,
    pub worker_id: WorkerId,
    #[serde(default)]
    pub session_id: Option<String>,
    pub payload: serde_json::Value,
    pub received_at_ms: u64,
    /// Epoch ms at which the deadline timer fires a synthesized response.
    pub deadline_ms: u64,
}

impl PendingRpc {
    pub fn is_expired(&self, now_ms: u64) -> bool {
        now_ms >= self.deadline_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> PendingRpc {
        PendingRpc {
            question_id: QuestionId::new("q1"),
            kind: PendingRpcKind::Question,
            worker_id: WorkerId::new("w1"),
            session_id: None,
            payload: serde_json::json!({"question": "A or B?"}),
            received_at_ms: 0,
            deadline_ms: 30_000,
        }
    }

    #[test]
    fn not_expired_before_deadline() {
        assert!(!sample().is_expired(29_999));
    }

    #[test]
    fn expired_at_or_after_deadline() {
        assert!(sample().is_expired(30_000));
        assert!(sample().is_expired(30_001));
    }
}
