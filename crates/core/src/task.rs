// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task entity and state machine (§3).

use crate::id::{TaskId, WorkerId};
use serde::{Deserialize, Serialize};

/// Dispatch priority. Ordering is `Urgent > High > Normal > Low`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Normal,
    High,
    Urgent,
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Normal
    }
}

/// Task status. Monotonic: once a status leaves `Pending` it never
/// returns, and terminal statuses (`Completed`, `Failed`, `Rejected`,
/// `Timeout`) never transition further.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Assigned,
    Running,
    Completed,
    Failed,
    Rejected,
    Timeout,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Rejected | TaskStatus::Timeout
        )
    }

    /// §3 invariant: `assigned_worker` must be set once a Task reaches
    /// any of these statuses.
    pub fn requires_assigned_worker(&self) -> bool {
        matches!(
            self,
            TaskStatus::Assigned | TaskStatus::Running | TaskStatus::Completed | TaskStatus::Failed
        )
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Assigned => "assigned",
            TaskStatus::Running => "running",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
            TaskStatus::Rejected => "rejected",
            TaskStatus::Timeout => "timeout",
        };
        write!(f, "{s}")
    }
}

/// A dispatched unit of work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub task_id: TaskId,
    pub description: String,
    pub priority: Priority,
    #[serde(default)]
    pub assigned_worker: Option<WorkerId>,
    pub status: TaskStatus,
    pub created_at_ms: u64,
    #[serde(default)]
    pub started_at_ms: Option<u64>,
    #[serde(default)]
    pub completed_at_ms: Option<u64>,
    pub timeout_ms: u64,
    #[serde(default)]
    pub retry_count: u32,
    #[serde(default)]
    pub result_blob: Option<serde_json::Value>,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub analytics: serde_json::Value,
    /// Session this task belongs to, if dispatched as part of one.
    #[serde(default)]
    pub session_id: Option<String>,
}

impl Task {
    pub fn new(task_id: TaskId, description: String, priority: Priority, timeout_ms: u64, created_at_ms: u64) -> Self {
        Self {
            task_id,
            description,
            priority,
            assigned_worker: None,
            status: TaskStatus::Pending,
            created_at_ms,
            started_at_ms: None,
            completed_at_ms: None,
            timeout_ms,
            retry_count: 0,
            result_blob: None,
            error_message: None,
            analytics: serde_json::Value::Null,
            session_id: None,
        }
    }

    /// §8 invariant: `completed_at >= started_at >= created_at` for
    /// every terminal task.
    pub fn has_consistent_timestamps(&self) -> bool {
        if !self.status.is_terminal() {
            return true;
        }
        let started = self.started_at_ms.unwrap_or(self.created_at_ms);
        let completed = self.completed_at_ms.unwrap_or(started);
        completed >= started && started >= self.created_at_ms
    }
}
