// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The `Store` trait: durable persistence for every entity in §3/§6.

use async_trait::async_trait;
use cp_core::{AdapterError, ProgressRecord, Session, Task, WorkerRecord};

/// A persisted question row (§6 `questions` table).
#[derive(Debug, Clone)]
pub struct QuestionRow {
    pub question_id: String,
    pub worker_id: String,
    pub question: String,
    pub question_type: Option<String>,
    pub context: serde_json::Value,
    pub asked_at_ms: u64,
    pub answer: Option<String>,
    pub answered_by: Option<String>,
    pub answered_at_ms: Option<u64>,
}

/// A persisted event row (§6 `events` table).
#[derive(Debug, Clone)]
pub struct EventRow {
    pub worker_id: String,
    pub event_type: String,
    pub event_data: serde_json::Value,
    pub timestamp_ms: u64,
}

/// Durable persistence for Workers, Tasks, progress, events, questions,
/// and Sessions. Every write is an idempotent upsert keyed on the
/// entity's natural id (§5: "duplicate delivery of any at-least-once
/// message is tolerated by idempotent upserts").
#[async_trait]
pub trait Store: Clone + Send + Sync + 'static {
    async fn upsert_worker(&self, worker: &WorkerRecord) -> Result<(), AdapterError>;
    async fn get_worker(&self, worker_id: &str) -> Result<Option<WorkerRecord>, AdapterError>;
    async fn list_workers(&self) -> Result<Vec<WorkerRecord>, AdapterError>;

    async fn upsert_task(&self, task: &Task) -> Result<(), AdapterError>;
    async fn get_task(&self, task_id: &str) -> Result<Option<Task>, AdapterError>;
    async fn list_pending_tasks(&self) -> Result<Vec<Task>, AdapterError>;
    /// Tasks with `status in (assigned, running)` owned by `worker_id`
    /// (§4.3.1 reassignment on Worker death).
    async fn list_active_tasks_for_worker(&self, worker_id: &str) -> Result<Vec<Task>, AdapterError>;

    async fn append_progress(&self, record: &ProgressRecord) -> Result<(), AdapterError>;
    async fn list_progress(&self, task_id: &str) -> Result<Vec<ProgressRecord>, AdapterError>;

    async fn append_event(&self, event: &EventRow) -> Result<(), AdapterError>;
    async fn list_events(&self, worker_id: &str, limit: i64) -> Result<Vec<EventRow>, AdapterError>;

    async fn upsert_question(&self, question: &QuestionRow) -> Result<(), AdapterError>;
    async fn answer_question(
        &self,
        question_id: &str,
        answer: &str,
        answered_by: &str,
        answered_at_ms: u64,
    ) -> Result<(), AdapterError>;

    async fn upsert_session(&self, session: &Session) -> Result<(), AdapterError>;
    async fn get_session(&self, session_id: &str) -> Result<Option<Session>, AdapterError>;
}
