// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Progress record: a Worker's periodic report of its own Task execution
//! (§3, §4.3.4).

use crate::id::{TaskId, WorkerId};
use serde::{Deserialize, Serialize};

/// Free-form metrics attached to a progress update. Kept as an opaque
/// JSON blob since the shape varies per task kind; the ingestor never
/// interprets it beyond storing and forwarding it.
pub type ProgressMetrics = serde_json::Value;

/// A single progress report, as published on the realtime analytics
/// subject and appended to `task_progress` (§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressRecord {
    pub task_id: TaskId,
    pub worker_id: WorkerId,
    #[serde(default)]
    pub phase: Option<String>,
    pub percent_complete: u8,
    #[serde(default)]
    pub metrics: ProgressMetrics,
    pub reported_at_ms: u64,
}

impl ProgressRecord {
    /// §8 invariant: a Task's reported `percent_complete` never
    /// decreases across the sequence of progress records it emits.
    pub fn is_monotonic_successor_of(&self, previous: &ProgressRecord) -> bool {
        self.task_id == previous.task_id && self.percent_complete >= previous.percent_complete
    }
}
