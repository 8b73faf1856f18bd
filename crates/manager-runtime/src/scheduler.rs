// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scheduler / Dispatcher (§4.3.2): task creation, Worker selection, and
//! reassignment on rejection, ack-timeout, or Worker death.

use crate::config::ManagerRuntimeConfig;
use crate::error::SchedulerError;
use crate::registry::Registry;
use cp_adapters::bus::Bus;
use cp_adapters::cache::Cache;
use cp_core::{id::IdGen, subject, BusMessage, Clock, Priority, Task, TaskId, TaskStatus, WorkerId};
use cp_storage::Store;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{info, warn};

fn priority_rank(priority: Priority) -> u8 {
    match priority {
        Priority::Urgent => 3,
        Priority::High => 2,
        Priority::Normal => 1,
        Priority::Low => 0,
    }
}

pub struct Scheduler<B: Bus, C: Cache, S: Store, G: IdGen, K: Clock> {
    bus: B,
    store: S,
    registry: Arc<Registry<C, S, K>>,
    id_gen: G,
    config: ManagerRuntimeConfig,
    /// task_id -> ms the dispatch was made, so `check_ack_deadlines` can
    /// requeue assignments the Worker never confirmed (§4.3.2). Bounded by
    /// the number of in-flight dispatches; entries are removed on
    /// confirmation, rejection, or timeout.
    assigned_at: Mutex<HashMap<TaskId, u64>>,
}

impl<B: Bus, C: Cache, S: Store, G: IdGen, K: Clock> Scheduler<B, C, S, G, K> {
    pub fn new(
        bus: B,
        store: S,
        registry: Arc<Registry<C, S, K>>,
        id_gen: G,
        config: ManagerRuntimeConfig,
    ) -> Self {
        Self {
            bus,
            store,
            registry,
            id_gen,
            config,
            assigned_at: Mutex::new(HashMap::new()),
        }
    }

    /// Creates a Task and attempts immediate dispatch. Returns the Worker it
    /// went to, if any (`None` means it is sitting in the pending queue).
    pub async fn assign_task(
        &self,
        description: String,
        priority: Priority,
        explicit_worker: Option<WorkerId>,
        timeout_ms: u64,
        session_id: Option<String>,
        now_ms: u64,
    ) -> Result<(TaskId, Option<WorkerId>), SchedulerError> {
        let task_id = TaskId::new(self.id_gen.next());
        let mut task = Task::new(task_id.clone(), description, priority, timeout_ms, now_ms);
        task.session_id = session_id;
        self.store.upsert_task(&task).await?;

        let target = match explicit_worker {
            Some(worker_id) => Some(worker_id),
            None => self.pick_candidate().await?,
        };
        if let Some(worker_id) = &target {
            self.dispatch_to(&mut task, worker_id, now_ms).await?;
        }
        Ok((task_id, target))
    }

    /// Picks an idle candidate: lowest `current_load`, tie-broken by most
    /// recent `last_heartbeat_ms` (§4.3.2 step 1-2).
    async fn pick_candidate(&self) -> Result<Option<WorkerId>, SchedulerError> {
        let required_tags = HashSet::new();
        let mut candidates: Vec<_> = self
            .registry
            .list_workers()
            .await?
            .into_iter()
            .filter(|w| w.is_dispatch_candidate(&required_tags))
            .collect();
        candidates.sort_by(|a, b| {
            a.current_load
                .cmp(&b.current_load)
                .then(b.last_heartbeat_ms.cmp(&a.last_heartbeat_ms))
        });
        Ok(candidates.into_iter().next().map(|w| w.worker_id))
    }

    async fn dispatch_to(&self, task: &mut Task, worker_id: &WorkerId, now_ms: u64) -> Result<(), SchedulerError> {
        task.status = TaskStatus::Assigned;
        task.assigned_worker = Some(worker_id.clone());
        self.store.upsert_task(task).await?;
        self.registry.set_status(worker_id, cp_core::WorkerStatus::Busy).await?;

        let message = BusMessage::TaskAssignment {
            task_id: task.task_id.clone(),
            description: task.description.clone(),
            priority: task.priority,
            timeout_ms: task.timeout_ms,
            session_id: task.session_id.clone(),
            assigned_at_ms: now_ms,
        };
        let payload = serde_json::to_vec(&message).map_err(|e| SchedulerError::Serialization(e.to_string()))?;
        self.bus.publish(&subject::worker_task(worker_id), payload).await?;
        self.assigned_at.lock().insert(task.task_id.clone(), now_ms);
        info!(task_id = %task.task_id, worker_id = %worker_id, "task dispatched");
        Ok(())
    }

    /// Drains the pending queue (priority desc, then FIFO by `created_at_ms`)
    /// against currently available Workers. Returns the number dispatched.
    pub async fn dispatch_pending(&self, now_ms: u64) -> Result<usize, SchedulerError> {
        let mut pending = self.store.list_pending_tasks().await?;
        pending.sort_by(|a, b| {
            priority_rank(b.priority)
                .cmp(&priority_rank(a.priority))
                .then(a.created_at_ms.cmp(&b.created_at_ms))
        });
        let mut dispatched = 0;
        for mut task in pending {
            let Some(worker_id) = self.pick_candidate().await? else {
                break;
            };
            self.dispatch_to(&mut task, &worker_id, now_ms).await?;
            dispatched += 1;
        }
        Ok(dispatched)
    }

    /// The Worker confirmed the task is running (first progress record).
    pub async fn handle_confirmation(&self, task_id: &TaskId, now_ms: u64) -> Result<(), SchedulerError> {
        self.assigned_at.lock().remove(task_id);
        if let Some(mut task) = self.store.get_task(task_id.as_str()).await? {
            if task.status == TaskStatus::Assigned {
                task.status = TaskStatus::Running;
                task.started_at_ms = Some(now_ms);
                self.store.upsert_task(&task).await?;
            }
        }
        Ok(())
    }

    /// The Worker rejected the assignment (e.g. `queue_full`).
    pub async fn handle_rejection(&self, task_id: &TaskId, reason: &str, now_ms: u64) -> Result<(), SchedulerError> {
        self.assigned_at.lock().remove(task_id);
        self.requeue_or_fail(task_id, reason, now_ms).await
    }

    /// Called by the health sweeper for each Worker that just went
    /// `unresponsive`: its active tasks are requeued (not failed outright),
    /// with `retry_count` incremented (§4.3.1, §8 scenario 5).
    pub async fn reassign_for_unresponsive(&self, worker_id: &WorkerId, now_ms: u64) -> Result<(), SchedulerError> {
        let active = self.store.list_active_tasks_for_worker(worker_id.as_str()).await?;
        for task in active {
            self.assigned_at.lock().remove(&task.task_id);
            self.requeue_or_fail(&task.task_id, "worker_lost", now_ms).await?;
        }
        Ok(())
    }

    /// Requeues tasks whose dispatch was never confirmed within
    /// `dispatch_ack_deadline`. Returns the number requeued.
    pub async fn check_ack_deadlines(&self, now_ms: u64) -> Result<usize, SchedulerError> {
        let deadline_ms = self.config.dispatch_ack_deadline.as_millis() as u64;
        let expired: Vec<TaskId> = {
            let guard = self.assigned_at.lock();
            guard
                .iter()
                .filter(|(_, &assigned_ms)| now_ms.saturating_sub(assigned_ms) >= deadline_ms)
                .map(|(task_id, _)| task_id.clone())
                .collect()
        };
        for task_id in &expired {
            self.assigned_at.lock().remove(task_id);
            self.requeue_or_fail(task_id, "dispatch_ack_timeout", now_ms).await?;
        }
        Ok(expired.len())
    }

    async fn requeue_or_fail(&self, task_id: &TaskId, reason: &str, now_ms: u64) -> Result<(), SchedulerError> {
        let Some(mut task) = self.store.get_task(task_id.as_str()).await? else {
            return Ok(());
        };
        if task.status.is_terminal() {
            return Ok(());
        }
        task.retry_count += 1;
        if task.retry_count >= self.config.retry_limit {
            task.status = TaskStatus::Failed;
            task.error_message = Some(reason.to_string());
            task.completed_at_ms = Some(now_ms);
            self.store.upsert_task(&task).await?;
            warn!(task_id = %task_id, reason, "task failed after exhausting retries");
        } else {
            task.status = TaskStatus::Pending;
            task.assigned_worker = None;
            self.store.upsert_task(&task).await?;
            info!(task_id = %task_id, reason, retry_count = task.retry_count, "task requeued");
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
