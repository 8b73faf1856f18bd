// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bus message payloads (§6).
//!
//! Serializes with `{"type": "name", ...fields}` format, one variant per
//! subject family in the external interfaces table. The subject itself
//! (built by [`crate::subject`]) carries routing information (worker id,
//! task id, event type) that is never duplicated into the payload.

use crate::id::{QuestionId, SessionId, TaskId, WorkerId};
use crate::progress::ProgressMetrics;
use crate::task::Priority;
use crate::worker::{WorkerCapabilities, WorkerSystemInfo};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Control commands a Worker honors on its command subject (§4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandKind {
    Pause,
    Resume,
    Stop,
    UpdateConfig,
    ClearQueue,
    Status,
}

/// Messages exchanged over the Bus between Manager and Worker.
///
/// Unknown `type` tags deserialize to `Custom` rather than failing, so a
/// Worker or Manager running a newer protocol version never poisons the
/// other side's subscription.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum BusMessage {
    #[serde(rename = "worker:register")]
    WorkerRegister {
        worker_id: WorkerId,
        hostname: String,
        #[serde(default)]
        tags: HashSet<String>,
        capabilities: WorkerCapabilities,
        #[serde(default)]
        system_info: WorkerSystemInfo,
        registered_at_ms: u64,
    },

    #[serde(rename = "worker:heartbeat")]
    WorkerHeartbeat {
        worker_id: WorkerId,
        current_load: u32,
        #[serde(default)]
        system_info: WorkerSystemInfo,
        sent_at_ms: u64,
    },

    #[serde(rename = "task:assignment")]
    TaskAssignment {
        task_id: TaskId,
        description: String,
        priority: Priority,
        timeout_ms: u64,
        #[serde(default)]
        session_id: Option<String>,
        assigned_at_ms: u64,
    },

    #[serde(rename = "task:rejected")]
    TaskRejected {
        task_id: TaskId,
        worker_id: WorkerId,
        reason: String,
        rejected_at_ms: u64,
    },

    #[serde(rename = "task:progress")]
    TaskProgress {
        task_id: TaskId,
        worker_id: WorkerId,
        #[serde(default)]
        phase: Option<String>,
        percent_complete: u8,
        #[serde(default)]
        metrics: ProgressMetrics,
        reported_at_ms: u64,
    },

    #[serde(rename = "worker:progress_realtime")]
    WorkerProgressRealtime {
        worker_id: WorkerId,
        #[serde(default)]
        stream: ProgressMetrics,
        reported_at_ms: u64,
    },

    #[serde(rename = "task:completion")]
    TaskCompletion {
        task_id: TaskId,
        worker_id: WorkerId,
        success: bool,
        #[serde(default)]
        result_blob: Option<serde_json::Value>,
        #[serde(default)]
        error_message: Option<String>,
        execution_time_ms: u64,
        completed_at_ms: u64,
    },

    #[serde(rename = "task:event")]
    TaskEvent {
        worker_id: WorkerId,
        event_type: String,
        #[serde(default)]
        event_data: serde_json::Value,
        timestamp_ms: u64,
    },

    #[serde(rename = "manager:question")]
    ManagerQuestion {
        question_id: QuestionId,
        worker_id: WorkerId,
        #[serde(default)]
        session_id: Option<SessionId>,
        question: String,
        #[serde(default)]
        question_type: Option<String>,
        #[serde(default)]
        context: serde_json::Value,
        asked_at_ms: u64,
    },

    #[serde(rename = "manager:next_task")]
    ManagerNextTaskRequest {
        question_id: QuestionId,
        worker_id: WorkerId,
        requested_at_ms: u64,
    },

    #[serde(rename = "manager:end_session")]
    ManagerEndSessionRequest {
        question_id: QuestionId,
        worker_id: WorkerId,
        session_id: SessionId,
        #[serde(default)]
        reason: Option<String>,
        requested_at_ms: u64,
    },

    #[serde(rename = "worker:broadcast")]
    WorkerBroadcast {
        message: String,
        #[serde(default)]
        target_session_ids: Vec<String>,
        sent_at_ms: u64,
    },

    #[serde(rename = "worker:command")]
    WorkerCommand {
        worker_id: WorkerId,
        command: CommandKind,
        #[serde(default)]
        payload: serde_json::Value,
        issued_at_ms: u64,
    },

    /// Catch-all for unknown message types (forward compatibility).
    #[serde(other, skip_serializing)]
    Custom,
}

impl BusMessage {
    pub fn name(&self) -> &'static str {
        match self {
            BusMessage::WorkerRegister { .. } => "worker:register",
            BusMessage::WorkerHeartbeat { .. } => "worker:heartbeat",
            BusMessage::TaskAssignment { .. } => "task:assignment",
            BusMessage::TaskRejected { .. } => "task:rejected",
            BusMessage::TaskProgress { .. } => "task:progress",
            BusMessage::WorkerProgressRealtime { .. } => "worker:progress_realtime",
            BusMessage::TaskCompletion { .. } => "task:completion",
            BusMessage::TaskEvent { .. } => "task:event",
            BusMessage::ManagerQuestion { .. } => "manager:question",
            BusMessage::ManagerNextTaskRequest { .. } => "manager:next_task",
            BusMessage::ManagerEndSessionRequest { .. } => "manager:end_session",
            BusMessage::WorkerBroadcast { .. } => "worker:broadcast",
            BusMessage::WorkerCommand { .. } => "worker:command",
            BusMessage::Custom => "custom",
        }
    }

    pub fn worker_id(&self) -> Option<&WorkerId> {
        match self {
            BusMessage::WorkerRegister { worker_id, .. }
            | BusMessage::WorkerHeartbeat { worker_id, .. }
            | BusMessage::TaskRejected { worker_id, .. }
            | BusMessage::TaskProgress { worker_id, .. }
            | BusMessage::WorkerProgressRealtime { worker_id, .. }
            | BusMessage::TaskCompletion { worker_id, .. }
            | BusMessage::TaskEvent { worker_id, .. }
            | BusMessage::ManagerQuestion { worker_id, .. }
            | BusMessage::ManagerNextTaskRequest { worker_id, .. }
            | BusMessage::ManagerEndSessionRequest { worker_id, .. }
            | BusMessage::WorkerCommand { worker_id, .. } => Some(worker_id),
            BusMessage::TaskAssignment { .. } | BusMessage::WorkerBroadcast { .. } | BusMessage::Custom => None,
        }
    }
}

#[cfg(test)]
#[path = "message_tests.rs"]
mod tests;
