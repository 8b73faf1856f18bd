// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Operator-facing protocol (§6): newline-delimited JSON over stdin/stdout.
//!
//! Unlike a Unix-socket daemon, a stdio process has exactly one peer and no
//! accept loop, so there is no length-prefixed binary framing here — each
//! `Request`/`Response` is one JSON object terminated by `\n`.

use cp_core::{Priority, ProgressRecord, TaskId, WorkerId, WorkerRecord, WorkerStatus};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;

/// One call against the operator surface (§6).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "tool", rename_all = "snake_case")]
pub enum Request {
    ListWorkers {
        #[serde(default)]
        status_filter: Option<WorkerStatus>,
        #[serde(default)]
        include_stats: bool,
    },
    GetWorkerStatus {
        worker_id: WorkerId,
    },
    AssignTask {
        description: String,
        #[serde(default)]
        priority: Priority,
        #[serde(default)]
        worker_id: Option<WorkerId>,
        #[serde(default)]
        timeout_ms: Option<u64>,
    },
    GetTaskStatus {
        task_id: TaskId,
        #[serde(default)]
        include_timeline: bool,
    },
    MonitorTaskRealtime {
        task_id: TaskId,
        duration_seconds: u64,
    },
    Broadcast {
        message: String,
        #[serde(default)]
        target_session_ids: Vec<String>,
    },
    ListPendingQuestions {
        #[serde(default)]
        filter: Option<String>,
    },
    AnswerWorkerQuestion {
        question_id: String,
        answer: String,
        #[serde(default)]
        guidance_type: Option<String>,
    },
    AssignTaskToWaitingWorker {
        worker_id: WorkerId,
        description: String,
        #[serde(default)]
        priority: Priority,
    },
    ApproveSessionEnd {
        worker_id: WorkerId,
        approved: bool,
        #[serde(default)]
        reason: Option<String>,
        #[serde(default)]
        final_instructions: Option<String>,
    },
    GetWorkerAnalytics {
        #[serde(default)]
        time_range: Option<TimeRange>,
    },
    SpawnWorkerContainer {
        #[serde(default)]
        tags: Vec<String>,
        max_tasks: u32,
        max_memory_mb: u64,
        #[serde(default)]
        name: Option<String>,
    },
    Ping,
    Shutdown,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimeRange {
    pub since_ms: u64,
    pub until_ms: u64,
}

/// Reply to one [`Request`]. Every variant that can fail independently of
/// transport carries its own `success`/`error` per §7's user-visible
/// surface rather than a single top-level `Result`, so a partially
/// successful fan-out (none exist today, but `broadcast` is one misstep
/// away from becoming one) has somewhere to report per-item failures.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    Pong,
    ShuttingDown,
    Workers { workers: Vec<WorkerRecord> },
    WorkerStatus { worker: Option<Box<WorkerRecord>>, recent_events: Vec<serde_json::Value> },
    TaskAssigned { task_id: TaskId, worker_id: Option<WorkerId> },
    TaskStatus { task: Option<serde_json::Value>, timeline: Vec<ProgressRecord> },
    TaskProgressStream { records: Vec<ProgressRecord> },
    Broadcast { recipients_count: usize },
    PendingQuestions { questions: Vec<serde_json::Value> },
    QuestionAnswered { found: bool },
    SessionEndApproved { found: bool },
    WorkerAnalytics { aggregates: serde_json::Value },
    ContainerSpawned { container_id: String, name: String, registered: bool },
    /// Uniform failure carrier for every request variant (§7): `{success:
    /// false, error}`. Idempotent no-ops use `Ok`/a variant's own
    /// `found: false` rather than this, per §7's distinction.
    Error { error: String },
}

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("message too large: {size} bytes (max {max})")]
    MessageTooLarge { size: usize, max: usize },
    #[error("connection closed")]
    ConnectionClosed,
}

/// One operator request, at 16 MiB, is already generous for a JSON object
/// with no binary payloads; this guards against a misbehaving client
/// wedging the reader on an unterminated line.
pub const MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

pub fn encode<T: Serialize>(msg: &T) -> Result<Vec<u8>, ProtocolError> {
    let mut json = serde_json::to_vec(msg)?;
    if json.len() > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::MessageTooLarge { size: json.len(), max: MAX_MESSAGE_SIZE });
    }
    json.push(b'\n');
    Ok(json)
}

pub fn decode<T: DeserializeOwned>(line: &str) -> Result<T, ProtocolError> {
    Ok(serde_json::from_str(line)?)
}

/// Reads one newline-delimited JSON request. Returns `Ok(None)` at EOF
/// (the normal way a stdio client signals it is done).
pub async fn read_request<R>(reader: &mut R) -> Result<Option<Request>, ProtocolError>
where
    R: tokio::io::AsyncBufReadExt + Unpin,
{
    use tokio::io::AsyncBufReadExt;
    let mut line = String::new();
    let bytes_read = reader.read_line(&mut line).await?;
    if bytes_read == 0 {
        return Ok(None);
    }
    let trimmed = line.trim_end_matches(['\n', '\r']);
    if trimmed.is_empty() {
        return Ok(None);
    }
    if trimmed.len() > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::MessageTooLarge { size: trimmed.len(), max: MAX_MESSAGE_SIZE });
    }
    Ok(Some(decode(trimmed)?))
}

pub async fn write_response<W>(writer: &mut W, response: &Response) -> Result<(), ProtocolError>
where
    W: tokio::io::AsyncWriteExt + Unpin,
{
    let data = encode(response)?;
    writer.write_all(&data).await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
