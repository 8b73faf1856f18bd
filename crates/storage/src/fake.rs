// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory `Store` for deterministic tests.

use crate::store::{EventRow, QuestionRow, Store};
use async_trait::async_trait;
use cp_core::{AdapterError, ProgressRecord, Session, Task, WorkerRecord};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreCall {
    UpsertWorker,
    GetWorker,
    ListWorkers,
    UpsertTask,
    GetTask,
    ListPendingTasks,
    ListActiveTasksForWorker,
    AppendProgress,
    ListProgress,
    AppendEvent,
    ListEvents,
    UpsertQuestion,
    AnswerQuestion,
    UpsertSession,
    GetSession,
}

#[derive(Default)]
struct Inner {
    workers: HashMap<String, WorkerRecord>,
    tasks: HashMap<String, Task>,
    progress: HashMap<String, Vec<ProgressRecord>>,
    events: HashMap<String, Vec<EventRow>>,
    questions: HashMap<String, QuestionRow>,
    sessions: HashMap<String, Session>,
    calls: Vec<StoreCall>,
    fail_next: Option<AdapterError>,
}

/// In-memory stand-in for [`crate::postgres::PgStore`], used by
/// manager-runtime and worker tests that need a `Store` without a
/// Postgres instance.
#[derive(Clone, Default)]
pub struct FakeStore {
    inner: Arc<Mutex<Inner>>,
}

impl FakeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<StoreCall> {
        self.inner.lock().calls.clone()
    }

    /// Makes the next call fail with `err`, then resumes normal behavior.
    pub fn fail_next(&self, err: AdapterError) {
        self.inner.lock().fail_next = Some(err);
    }

    fn take_failure(inner: &mut Inner) -> Option<AdapterError> {
        inner.fail_next.take()
    }
}

#[async_trait]
impl Store for FakeStore {
    async fn upsert_worker(&self, worker: &WorkerRecord) -> Result<(), AdapterError> {
        let mut inner = self.inner.lock();
        inner.calls.push(StoreCall::UpsertWorker);
        if let Some(err) = Self::take_failure(&mut inner) {
            return Err(err);
        }
        inner.workers.insert(worker.worker_id.as_str().to_string(), worker.clone());
        Ok(())
    }

    async fn get_worker(&self, worker_id: &str) -> Result<Option<WorkerRecord>, AdapterError> {
        let mut inner = self.inner.lock();
        inner.calls.push(StoreCall::GetWorker);
        if let Some(err) = Self::take_failure(&mut inner) {
            return Err(err);
        }
        Ok(inner.workers.get(worker_id).cloned())
    }

    async fn list_workers(&self) -> Result<Vec<WorkerRecord>, AdapterError> {
        let mut inner = self.inner.lock();
        inner.calls.push(StoreCall::ListWorkers);
        if let Some(err) = Self::take_failure(&mut inner) {
            return Err(err);
        }
        Ok(inner.workers.values().cloned().collect())
    }

    async fn upsert_task(&self, task: &Task) -> Result<(), AdapterError> {
        let mut inner = self.inner.lock();
        inner.calls.push(StoreCall::UpsertTask);
        if let Some(err) = Self::take_failure(&mut inner) {
            return Err(err);
        }
        inner.tasks.insert(task.task_id.as_str().to_string(), task.clone());
        Ok(())
    }

    async fn get_task(&self, task_id: &str) -> Result<Option<Task>, AdapterError> {
        let mut inner = self.inner.lock();
        inner.calls.push(StoreCall::GetTask);
        if let Some(err) = Self::take_failure(&mut inner) {
            return Err(err);
        }
        Ok(inner.tasks.get(task_id).cloned())
    }

    async fn list_pending_tasks(&self) -> Result<Vec<Task>, AdapterError> {
        let mut inner = self.inner.lock();
        inner.calls.push(StoreCall::ListPendingTasks);
        if let Some(err) = Self::take_failure(&mut inner) {
            return Err(err);
        }
        Ok(inner
            .tasks
            .values()
            .filter(|t| t.status == cp_core::TaskStatus::Pending)
            .cloned()
            .collect())
    }

    async fn list_active_tasks_for_worker(&self, worker_id: &str) -> Result<Vec<Task>, AdapterError> {
        let mut inner = self.inner.lock();
        inner.calls.push(StoreCall::ListActiveTasksForWorker);
        if let Some(err) = Self::take_failure(&mut inner) {
            return Err(err);
        }
        Ok(inner
            .tasks
            .values()
            .filter(|t| {
                t.assigned_worker.as_ref().is_some_and(|w| w.as_str() == worker_id)
                    && matches!(t.status, cp_core::TaskStatus::Assigned | cp_core::TaskStatus::Running)
            })
            .cloned()
            .collect())
    }

    async fn append_progress(&self, record: &ProgressRecord) -> Result<(), AdapterError> {
        let mut inner = self.inner.lock();
        inner.calls.push(StoreCall::AppendProgress);
        if let Some(err) = Self::take_failure(&mut inner) {
            return Err(err);
        }
        inner
            .progress
            .entry(record.task_id.as_str().to_string())
            .or_default()
            .push(record.clone());
        Ok(())
    }

    async fn list_progress(&self, task_id: &str) -> Result<Vec<ProgressRecord>, AdapterError> {
        let mut inner = self.inner.lock();
        inner.calls.push(StoreCall::ListProgress);
        if let Some(err) = Self::take_failure(&mut inner) {
            return Err(err);
        }
        Ok(inner.progress.get(task_id).cloned().unwrap_or_default())
    }

    async fn append_event(&self, event: &EventRow) -> Result<(), AdapterError> {
        let mut inner = self.inner.lock();
        inner.calls.push(StoreCall::AppendEvent);
        if let Some(err) = Self::take_failure(&mut inner) {
            return Err(err);
        }
        inner.events.entry(event.worker_id.clone()).or_default().push(event.clone());
        Ok(())
    }

    async fn list_events(&self, worker_id: &str, limit: i64) -> Result<Vec<EventRow>, AdapterError> {
        let mut inner = self.inner.lock();
        inner.calls.push(StoreCall::ListEvents);
        if let Some(err) = Self::take_failure(&mut inner) {
            return Err(err);
        }
        let mut events = inner.events.get(worker_id).cloned().unwrap_or_default();
        events.reverse();
        events.truncate(limit.max(0) as usize);
        Ok(events)
    }

    async fn upsert_question(&self, question: &QuestionRow) -> Result<(), AdapterError> {
        let mut inner = self.inner.lock();
        inner.calls.push(StoreCall::UpsertQuestion);
        if let Some(err) = Self::take_failure(&mut inner) {
            return Err(err);
        }
        inner.questions.insert(question.question_id.clone(), question.clone());
        Ok(())
    }

    async fn answer_question(
        &self,
        question_id: &str,
        answer: &str,
        answered_by: &str,
        answered_at_ms: u64,
    ) -> Result<(), AdapterError> {
        let mut inner = self.inner.lock();
        inner.calls.push(StoreCall::AnswerQuestion);
        if let Some(err) = Self::take_failure(&mut inner) {
            return Err(err);
        }
        if let Some(q) = inner.questions.get_mut(question_id) {
            q.answer = Some(answer.to_string());
            q.answered_by = Some(answered_by.to_string());
            q.answered_at_ms = Some(answered_at_ms);
            Ok(())
        } else {
            Err(AdapterError::invalid(format!("unknown question {question_id}")))
        }
    }

    async fn upsert_session(&self, session: &Session) -> Result<(), AdapterError> {
        let mut inner = self.inner.lock();
        inner.calls.push(StoreCall::UpsertSession);
        if let Some(err) = Self::take_failure(&mut inner) {
            return Err(err);
        }
        inner.sessions.insert(session.session_id.as_str().to_string(), session.clone());
        Ok(())
    }

    async fn get_session(&self, session_id: &str) -> Result<Option<Session>, AdapterError> {
        let mut inner = self.inner.lock();
        inner.calls.push(StoreCall::GetSession);
        if let Some(err) = Self::take_failure(&mut inner) {
            return Err(err);
        }
        Ok(inner.sessions.get(session_id).cloned())
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
