// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Progress/analytics ingestor (§4.3.4): normalizes every message on the
//! wildcarded analytics subjects, writes the cache projection first (so a
//! slow durable write never stalls the hot path), then the durable row.
//! Malformed messages are dropped and counted rather than poisoning the
//! subscription; a durable write that fails because the store is
//! unavailable is buffered up to `durable_buffer_limit` and retried by
//! [`Ingestor::flush_buffer`]. A progress report that regresses a task's
//! `percent_complete` (§8) is likewise dropped and counted, never
//! overwriting the last-known-good cache/timeline/store entries.

use crate::config::ManagerRuntimeConfig;
use crate::error::IngestError;
use cp_adapters::bus::BusEnvelope;
use cp_adapters::cache::Cache;
use cp_core::{BusMessage, ProgressRecord, QuestionId, SessionId, TaskId, WorkerId};
use cp_storage::store::EventRow;
use cp_storage::Store;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::warn;

fn progress_cache_key(task_id: &str) -> String {
    format!("task:{task_id}:progress")
}

fn timeline_cache_key(task_id: &str) -> String {
    format!("task:{task_id}:timeline")
}

fn realtime_cache_key(worker_id: &str) -> String {
    format!("worker:{worker_id}:progress_realtime")
}

/// A durable write the ingestor could not complete because the store was
/// unavailable, held for a later [`Ingestor::flush_buffer`] attempt.
enum BufferedWrite {
    Progress(ProgressRecord),
    Event(EventRow),
}

/// What an ingested message means for the rest of the control plane. The
/// ingestor only normalizes and persists; routing the Scheduler/RpcBroker
/// consequences stays with the caller that owns those subsystems.
pub enum IngestOutcome {
    Progress { task_id: TaskId, worker_id: WorkerId },
    RealtimeProgress { worker_id: WorkerId },
    Event { worker_id: WorkerId, event_type: String },
    Completion { task_id: TaskId, worker_id: WorkerId, success: bool },
    Question {
        question_id: QuestionId,
        worker_id: WorkerId,
        session_id: Option<SessionId>,
        question: String,
        question_type: Option<String>,
        context: serde_json::Value,
        reply_to: String,
    },
    NextTaskRequest { worker_id: WorkerId, reply_to: String },
    EndSessionRequest {
        worker_id: WorkerId,
        session_id: SessionId,
        reason: Option<String>,
        reply_to: String,
    },
}

pub struct Ingestor<C: Cache, S: Store> {
    cache: C,
    store: S,
    config: ManagerRuntimeConfig,
    malformed: AtomicU64,
    dropped: AtomicU64,
    buffer: Mutex<VecDeque<BufferedWrite>>,
}

impl<C: Cache, S: Store> Ingestor<C, S> {
    pub fn new(cache: C, store: S, config: ManagerRuntimeConfig) -> Self {
        Self {
            cache,
            store,
            config,
            malformed: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            buffer: Mutex::new(VecDeque::new()),
        }
    }

    pub fn malformed_count(&self) -> u64 {
        self.malformed.load(Ordering::Relaxed)
    }

    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Normalizes and persists one message from the wildcarded analytics
    /// subjects, returning what the rest of the runtime should do about it.
    pub async fn ingest(&self, envelope: &BusEnvelope, now_ms: u64) -> Result<IngestOutcome, IngestError> {
        let message: BusMessage = serde_json::from_slice(&envelope.payload).map_err(|e| {
            self.malformed.fetch_add(1, Ordering::Relaxed);
            IngestError::Malformed { subject: envelope.subject.clone(), reason: e.to_string() }
        })?;

        match message {
            BusMessage::TaskProgress { task_id, worker_id, phase, percent_complete, metrics, reported_at_ms } => {
                self.record_progress(&task_id, &worker_id, phase, percent_complete, metrics, reported_at_ms).await?;
                Ok(IngestOutcome::Progress { task_id, worker_id })
            }
            BusMessage::WorkerProgressRealtime { worker_id, stream, reported_at_ms } => {
                let blob = serde_json::json!({ "stream": stream, "reported_at_ms": reported_at_ms });
                let encoded = serde_json::to_vec(&blob).map_err(|e| {
                    IngestError::Malformed { subject: envelope.subject.clone(), reason: e.to_string() }
                })?;
                self.cache
                    .set(&realtime_cache_key(worker_id.as_str()), encoded, Some(self.config.progress_cache_ttl))
                    .await?;
                Ok(IngestOutcome::RealtimeProgress { worker_id })
            }
            BusMessage::TaskEvent { worker_id, event_type, event_data, timestamp_ms } => {
                let event = EventRow {
                    worker_id: worker_id.as_str().to_string(),
                    event_type: event_type.clone(),
                    event_data,
                    timestamp_ms,
                };
                if let Err(e) = self.store.append_event(&event).await {
                    self.buffer_or_drop(BufferedWrite::Event(event), now_ms, &e);
                }
                Ok(IngestOutcome::Event { worker_id, event_type })
            }
            BusMessage::TaskCompletion { task_id, worker_id, success, result_blob, error_message, completed_at_ms, .. } => {
                self.record_completion(&task_id, success, result_blob, error_message, completed_at_ms).await;
                Ok(IngestOutcome::Completion { task_id, worker_id, success })
            }
            BusMessage::ManagerQuestion { question_id, worker_id, session_id, question, question_type, context, .. } => {
                let reply_to = envelope.reply_to.clone().ok_or_else(|| IngestError::Malformed {
                    subject: envelope.subject.clone(),
                    reason: "question has no reply_to".into(),
                })?;
                Ok(IngestOutcome::Question { question_id, worker_id, session_id, question, question_type, context, reply_to })
            }
            BusMessage::ManagerNextTaskRequest { worker_id, .. } => {
                let reply_to = envelope.reply_to.clone().ok_or_else(|| IngestError::Malformed {
                    subject: envelope.subject.clone(),
                    reason: "next-task request has no reply_to".into(),
                })?;
                Ok(IngestOutcome::NextTaskRequest { worker_id, reply_to })
            }
            BusMessage::ManagerEndSessionRequest { worker_id, session_id, reason, .. } => {
                let reply_to = envelope.reply_to.clone().ok_or_else(|| IngestError::Malformed {
                    subject: envelope.subject.clone(),
                    reason: "end-session request has no reply_to".into(),
                })?;
                Ok(IngestOutcome::EndSessionRequest { worker_id, session_id, reason, reply_to })
            }
            other => Err(IngestError::Malformed {
                subject: envelope.subject.clone(),
                reason: format!("unexpected message type on analytics subject: {}", other.name()),
            }),
        }
    }

    async fn record_progress(
        &self,
        task_id: &TaskId,
        worker_id: &WorkerId,
        phase: Option<String>,
        percent_complete: u8,
        metrics: serde_json::Value,
        reported_at_ms: u64,
    ) -> Result<(), IngestError> {
        let record = ProgressRecord {
            task_id: task_id.clone(),
            worker_id: worker_id.clone(),
            phase,
            percent_complete,
            metrics,
            reported_at_ms,
        };

        if let Some(previous) = self.cache.get(&progress_cache_key(task_id.as_str())).await? {
            if let Ok(previous) = serde_json::from_slice::<ProgressRecord>(&previous) {
                if !record.is_monotonic_successor_of(&previous) {
                    warn!(
                        task_id = %task_id,
                        previous = previous.percent_complete,
                        reported = record.percent_complete,
                        "dropping out-of-order progress report"
                    );
                    self.dropped.fetch_add(1, Ordering::Relaxed);
                    return Ok(());
                }
            }
        }

        let encoded = serde_json::to_vec(&record).map_err(|e| IngestError::Malformed {
            subject: "task.progress".into(),
            reason: e.to_string(),
        })?;
        self.cache
            .set(&progress_cache_key(task_id.as_str()), encoded.clone(), Some(self.config.progress_cache_ttl))
            .await?;
        self.cache
            .rpush(&timeline_cache_key(task_id.as_str()), encoded, Some(self.config.progress_cache_ttl))
            .await?;

        if let Err(e) = self.store.append_progress(&record).await {
            self.buffer_or_drop(BufferedWrite::Progress(record), reported_at_ms, &e);
        }
        Ok(())
    }

    async fn record_completion(
        &self,
        task_id: &TaskId,
        success: bool,
        result_blob: Option<serde_json::Value>,
        error_message: Option<String>,
        completed_at_ms: u64,
    ) {
        let Ok(Some(mut task)) = self.store.get_task(task_id.as_str()).await else {
            warn!(task_id = %task_id, "completion reported for unknown task");
            return;
        };
        task.status = if success { cp_core::TaskStatus::Completed } else { cp_core::TaskStatus::Failed };
        task.result_blob = result_blob;
        task.error_message = error_message;
        task.completed_at_ms = Some(completed_at_ms);
        if let Err(e) = self.store.upsert_task(&task).await {
            warn!(task_id = %task_id, error = %e, "failed to persist task completion");
        }
        self.cache.delete(&progress_cache_key(task_id.as_str())).await.ok();
    }

    /// Bounded buffering of a durable write the store rejected as
    /// unavailable. At capacity the oldest entry is dropped and counted
    /// rather than growing without limit.
    fn buffer_or_drop(&self, write: BufferedWrite, _now_ms: u64, error: &cp_core::AdapterError) {
        warn!(error = %error, "buffering durable write after store error");
        let mut buffer = self.buffer.lock();
        if buffer.len() >= self.config.durable_buffer_limit {
            buffer.pop_front();
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
        buffer.push_back(write);
    }

    /// Retries every buffered durable write against the store, in order.
    /// Returns the number successfully flushed; writes that fail again
    /// stay buffered (re-queued at the front, preserving order).
    pub async fn flush_buffer(&self) -> Result<usize, IngestError> {
        let pending: Vec<BufferedWrite> = {
            let mut buffer = self.buffer.lock();
            buffer.drain(..).collect()
        };
        let mut flushed = 0;
        for write in pending {
            let result = match &write {
                BufferedWrite::Progress(record) => self.store.append_progress(record).await,
                BufferedWrite::Event(event) => self.store.append_event(event).await,
            };
            match result {
                Ok(()) => flushed += 1,
                Err(e) => self.buffer_or_drop(write, 0, &e),
            }
        }
        Ok(flushed)
    }

    pub fn buffered_count(&self) -> usize {
        self.buffer.lock().len()
    }

    /// The most recent `timeline_max_len` progress records cached for a
    /// task, newest last (§6 `monitor_task_realtime`).
    pub async fn task_timeline(&self, task_id: &str) -> Result<Vec<ProgressRecord>, IngestError> {
        let start = -(self.config.timeline_max_len as isize);
        let entries = self.cache.lrange(&timeline_cache_key(task_id), start, -1).await?;
        entries
            .iter()
            .map(|bytes| {
                serde_json::from_slice(bytes)
                    .map_err(|e| IngestError::Malformed { subject: timeline_cache_key(task_id), reason: e.to_string() })
            })
            .collect()
    }
}

#[cfg(test)]
#[path = "ingestor_tests.rs"]
mod tests;
