// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The Worker event loop (§4.2): registration, task acceptance, child
//! execution, and graceful shutdown, composed behind one
//! [`WorkerRuntime`] handle generic over the Bus/Cache/agent-process
//! adapters and the clock that makes it deterministically testable.
//!
//! Every durable write this system needs is already owned by the
//! Manager's progress ingestor, which persists whatever the Worker
//! publishes on the analytics subjects (§4.3.4) — so unlike the source's
//! Worker-side optional store connection, this runtime never talks to a
//! `Store` at all. "Must behave correctly with the store offline" holds
//! trivially, since there is nothing to disconnect.

use crate::config::WorkerRuntimeConfig;
use crate::error::WorkerRuntimeError;
use crate::progress::{estimate_percent_complete, TaskCounters};
use cp_adapters::agent::{AgentOutcome, AgentProcess, AgentSpawnConfig};
use cp_adapters::cache::Cache;
use cp_adapters::bus::Bus;
use cp_core::{subject, BusMessage, Clock, CommandKind, TaskId, WorkerCapabilities, WorkerId, WorkerSystemInfo};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Snapshot of one task this Worker is currently executing, queryable via
/// the `status` command (§4.2 "Commands").
#[derive(Debug, Clone)]
pub struct TaskInstance {
    pub started_at_ms: u64,
    pub timeout_ms: u64,
    pub last_percent_complete: u8,
    pub session_id: Option<String>,
}

/// Outcome of [`WorkerRuntime::handle_task_assignment`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskAcceptance {
    Accepted,
    Rejected { reason: String },
    /// A broadcast task another Worker claimed first; no-op on this side.
    ClaimLost,
}

/// Outcome of [`WorkerRuntime::handle_command`].
#[derive(Debug, Clone)]
pub enum CommandOutcome {
    Paused,
    Resumed,
    StopInitiated,
    ConfigAcknowledged,
    QueueCleared { cleared: usize },
    Status(serde_json::Value),
}

fn claim_key(task_id: &TaskId) -> String {
    format!("task:{task_id}:claimed")
}

/// Everything resolved during startup step 1, "resolve identity" (§4.2),
/// bundled so constructing a [`WorkerRuntime`] takes one identity value
/// instead of four loose fields.
#[derive(Debug, Clone)]
pub struct WorkerIdentity {
    pub worker_id: WorkerId,
    pub hostname: String,
    pub tags: HashSet<String>,
    pub capabilities: WorkerCapabilities,
    /// Static env vars (credentials, bus address) merged into every
    /// spawned agent process alongside the per-task `task_id`/`worker_id`
    /// (§4.2 "Execution").
    pub agent_env: Vec<(String, String)>,
}

pub struct WorkerRuntime<B: Bus, C: Cache, A: AgentProcess, K: Clock> {
    bus: B,
    cache: C,
    agent: A,
    clock: K,
    config: WorkerRuntimeConfig,
    worker_id: WorkerId,
    hostname: String,
    tags: HashSet<String>,
    capabilities: WorkerCapabilities,
    agent_env: Vec<(String, String)>,
    active_tasks: Arc<Mutex<HashMap<String, TaskInstance>>>,
    paused: Arc<AtomicBool>,
    shutting_down: Arc<AtomicBool>,
}

impl<B: Bus, C: Cache, A: AgentProcess, K: Clock> Clone for WorkerRuntime<B, C, A, K> {
    fn clone(&self) -> Self {
        Self {
            bus: self.bus.clone(),
            cache: self.cache.clone(),
            agent: self.agent.clone(),
            clock: self.clock.clone(),
            config: self.config.clone(),
            worker_id: self.worker_id.clone(),
            hostname: self.hostname.clone(),
            tags: self.tags.clone(),
            capabilities: self.capabilities.clone(),
            agent_env: self.agent_env.clone(),
            active_tasks: self.active_tasks.clone(),
            paused: self.paused.clone(),
            shutting_down: self.shutting_down.clone(),
        }
    }
}

impl<B: Bus, C: Cache, A: AgentProcess, K: Clock> WorkerRuntime<B, C, A, K> {
    pub fn new(bus: B, cache: C, agent: A, clock: K, identity: WorkerIdentity, config: WorkerRuntimeConfig) -> Self {
        Self {
            bus,
            cache,
            agent,
            clock,
            config,
            worker_id: identity.worker_id,
            hostname: identity.hostname,
            tags: identity.tags,
            capabilities: identity.capabilities,
            agent_env: identity.agent_env,
            active_tasks: Arc::new(Mutex::new(HashMap::new())),
            paused: Arc::new(AtomicBool::new(false)),
            shutting_down: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn worker_id(&self) -> &WorkerId {
        &self.worker_id
    }

    pub fn capabilities(&self) -> &WorkerCapabilities {
        &self.capabilities
    }

    pub fn active_task_count(&self) -> usize {
        self.active_tasks.lock().len()
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::SeqCst)
    }

    /// Zero while paused or shutting down, `max_concurrent_tasks`
    /// otherwise (§4.2 "Commands": `pause` sets effective capacity to
    /// zero).
    pub fn effective_capacity(&self) -> u32 {
        if self.paused.load(Ordering::SeqCst) || self.is_shutting_down() {
            0
        } else {
            self.capabilities.max_concurrent_tasks
        }
    }

    /// Publishes the registration record and awaits the Manager's ack
    /// (§4.2 step 3, §6: "expects reply").
    pub async fn publish_registration(&self, system_info: WorkerSystemInfo, now_ms: u64) -> Result<(), WorkerRuntimeError> {
        let message = BusMessage::WorkerRegister {
            worker_id: self.worker_id.clone(),
            hostname: self.hostname.clone(),
            tags: self.tags.clone(),
            capabilities: self.capabilities.clone(),
            system_info,
            registered_at_ms: now_ms,
        };
        let payload = serde_json::to_vec(&message)
            .map_err(|e| WorkerRuntimeError::Malformed { subject: subject::WORKER_REGISTER.to_string(), reason: e.to_string() })?;
        self.bus.request(subject::WORKER_REGISTER, payload, self.config.registration_ack_timeout).await?;
        info!(worker_id = %self.worker_id, "registered with manager");
        Ok(())
    }

    pub async fn publish_heartbeat(&self, system_info: WorkerSystemInfo, now_ms: u64) -> Result<(), WorkerRuntimeError> {
        let message = BusMessage::WorkerHeartbeat {
            worker_id: self.worker_id.clone(),
            current_load: self.active_task_count() as u32,
            system_info,
            sent_at_ms: now_ms,
        };
        let payload = serde_json::to_vec(&message)
            .map_err(|e| WorkerRuntimeError::Malformed { subject: subject::WORKER_HEARTBEAT.to_string(), reason: e.to_string() })?;
        self.bus.publish(subject::WORKER_HEARTBEAT, payload).await?;
        Ok(())
    }

    /// Task acceptance flow (§4.2): capacity gate, optional claim race for
    /// broadcast-delivered assignments, bookkeeping, then hands execution
    /// off to its own task so the caller's receive loop is never blocked
    /// on one task's lifetime.
    pub async fn handle_task_assignment(
        &self,
        message: BusMessage,
        is_broadcast: bool,
        now_ms: u64,
    ) -> Result<TaskAcceptance, WorkerRuntimeError> {
        let BusMessage::TaskAssignment { task_id, description, timeout_ms, session_id, .. } = message else {
            return Err(WorkerRuntimeError::Malformed {
                subject: subject::worker_task(&self.worker_id),
                reason: "expected a task assignment message".to_string(),
            });
        };

        if self.is_shutting_down() || self.active_task_count() as u32 >= self.effective_capacity() {
            self.publish_rejection(&task_id, "queue_full", now_ms).await?;
            return Ok(TaskAcceptance::Rejected { reason: "queue_full".to_string() });
        }

        if is_broadcast {
            let ttl = Duration::from_millis(timeout_ms) + self.config.claim_grace;
            let won = self.cache.set_nx(&claim_key(&task_id), self.worker_id.as_str().as_bytes().to_vec(), ttl).await?;
            if !won {
                return Ok(TaskAcceptance::ClaimLost);
            }
        }

        self.active_tasks.lock().insert(
            task_id.as_str().to_string(),
            TaskInstance { started_at_ms: now_ms, timeout_ms, last_percent_complete: 0, session_id: session_id.clone() },
        );
        self.publish_event("started", serde_json::json!({ "task_id": task_id.as_str() }), now_ms).await?;

        let runtime = self.clone();
        tokio::spawn(async move {
            runtime.execute_task(task_id, description, timeout_ms, now_ms).await;
        });

        Ok(TaskAcceptance::Accepted)
    }

    async fn publish_rejection(&self, task_id: &TaskId, reason: &str, now_ms: u64) -> Result<(), WorkerRuntimeError> {
        let message = BusMessage::TaskRejected {
            task_id: task_id.clone(),
            worker_id: self.worker_id.clone(),
            reason: reason.to_string(),
            rejected_at_ms: now_ms,
        };
        let payload = serde_json::to_vec(&message)
            .map_err(|e| WorkerRuntimeError::Malformed { subject: subject::task_rejected(task_id), reason: e.to_string() })?;
        self.bus.publish(&subject::task_rejected(task_id), payload).await?;
        Ok(())
    }

    async fn publish_event(
        &self,
        event_type: &str,
        event_data: serde_json::Value,
        now_ms: u64,
    ) -> Result<(), WorkerRuntimeError> {
        let message = BusMessage::TaskEvent {
            worker_id: self.worker_id.clone(),
            event_type: event_type.to_string(),
            event_data,
            timestamp_ms: now_ms,
        };
        let subject = subject::task_event(event_type);
        let payload = serde_json::to_vec(&message)
            .map_err(|e| WorkerRuntimeError::Malformed { subject: subject.clone(), reason: e.to_string() })?;
        self.bus.publish(&subject, payload).await?;
        Ok(())
    }

    async fn publish_progress(&self, task_id: &TaskId, counters: &TaskCounters, percent_complete: u8, reported_at_ms: u64) {
        self.active_tasks
            .lock()
            .entry(task_id.as_str().to_string())
            .and_modify(|instance| instance.last_percent_complete = percent_complete);
        let message = BusMessage::TaskProgress {
            task_id: task_id.clone(),
            worker_id: self.worker_id.clone(),
            phase: None,
            percent_complete,
            metrics: counters.to_metrics(),
            reported_at_ms,
        };
        match serde_json::to_vec(&message) {
            Ok(payload) => {
                if let Err(e) = self.bus.publish(&subject::task_progress(task_id), payload).await {
                    warn!(error = %e, task_id = %task_id, "failed to publish progress");
                }
            }
            Err(e) => warn!(error = %e, task_id = %task_id, "failed to encode progress message"),
        }
    }

    /// Drives one accepted task to completion: spawns the external agent,
    /// parses its output for observable markers, reports progress on a
    /// fixed interval, and publishes the terminal completion message
    /// (§4.2 "Execution", "Termination").
    async fn execute_task(self, task_id: TaskId, description: String, timeout_ms: u64, started_at_ms: u64) {
        let mut env = self.agent_env.clone();
        env.push(("TASK_ID".to_string(), task_id.as_str().to_string()));
        env.push(("WORKER_ID".to_string(), self.worker_id.as_str().to_string()));
        let spawn_config = AgentSpawnConfig {
            task_id: task_id.as_str().to_string(),
            worker_id: self.worker_id.as_str().to_string(),
            description,
            env,
            cwd: None,
            timeout: Duration::from_millis(timeout_ms),
        };
        let mut handle = match self.agent.spawn(spawn_config).await {
            Ok(handle) => handle,
            Err(e) => {
                warn!(error = %e, task_id = %task_id, "failed to spawn agent process");
                self.finish_task(&task_id, false, Some(e.to_string()), &TaskCounters::default(), started_at_ms).await;
                return;
            }
        };

        let mut counters = TaskCounters::default();
        let mut ticker = tokio::time::interval(self.config.progress_report_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        // The output channel closes once the child's pipes do, which
        // happens at or just before exit; `wait_fut` is the authoritative
        // signal that the process is actually done. Once output closes we
        // stop polling it (`output_done`) rather than let a closed
        // receiver spin the select loop.
        let wait_fut = self.agent.wait(task_id.as_str());
        tokio::pin!(wait_fut);
        let mut output_done = false;
        let outcome = loop {
            tokio::select! {
                line = handle.output.recv(), if !output_done => {
                    match line {
                        Some(line) => counters.record_line(&line.line, line.is_stderr),
                        None => output_done = true,
                    }
                }
                _ = ticker.tick() => {
                    let elapsed = self.clock.epoch_ms().saturating_sub(started_at_ms);
                    let percent = estimate_percent_complete(elapsed, timeout_ms);
                    self.publish_progress(&task_id, &counters, percent, self.clock.epoch_ms()).await;
                }
                result = &mut wait_fut => break result,
            }
        };
        let (success, error_message) = match outcome {
            Ok(AgentOutcome::Exited { code: 0 }) => (true, None),
            Ok(AgentOutcome::Exited { code }) => (false, Some(format!("agent exited with code {code}"))),
            Ok(AgentOutcome::TimedOut) => (false, Some("execution exceeded timeout_ms".to_string())),
            Ok(AgentOutcome::Killed) => (false, Some("task killed".to_string())),
            Err(e) => (false, Some(e.to_string())),
        };
        self.finish_task(&task_id, success, error_message, &counters, started_at_ms).await;
    }

    async fn finish_task(
        &self,
        task_id: &TaskId,
        success: bool,
        error_message: Option<String>,
        counters: &TaskCounters,
        started_at_ms: u64,
    ) {
        let now_ms = self.clock.epoch_ms();
        self.publish_progress(task_id, counters, 100, now_ms).await;
        let message = BusMessage::TaskCompletion {
            task_id: task_id.clone(),
            worker_id: self.worker_id.clone(),
            success,
            result_blob: Some(counters.to_metrics()),
            error_message,
            execution_time_ms: now_ms.saturating_sub(started_at_ms),
            completed_at_ms: now_ms,
        };
        match serde_json::to_vec(&message) {
            Ok(payload) => {
                if let Err(e) = self.bus.publish(subject::TASK_COMPLETION, payload).await {
                    warn!(error = %e, task_id = %task_id, "failed to publish completion");
                }
            }
            Err(e) => warn!(error = %e, task_id = %task_id, "failed to encode completion message"),
        }
        if let Err(e) = self
            .publish_event("task_completed", serde_json::json!({ "task_id": task_id.as_str(), "success": success }), now_ms)
            .await
        {
            warn!(error = %e, task_id = %task_id, "failed to publish task_completed event");
        }
        self.active_tasks.lock().remove(task_id.as_str());
    }

    /// Handles `{pause, resume, stop, update_config, clear_queue,
    /// status}` on the command subject (§4.2 "Commands"). There is no
    /// bounded pending queue on the Worker side (capacity overflow is
    /// always an immediate rejection, not an enqueue — see
    /// `handle_task_assignment`), so `clear_queue` always reports zero
    /// cleared.
    pub async fn handle_command(&self, message: BusMessage) -> Result<CommandOutcome, WorkerRuntimeError> {
        let BusMessage::WorkerCommand { command, payload, .. } = message else {
            return Err(WorkerRuntimeError::Malformed {
                subject: subject::worker_command(&self.worker_id),
                reason: "expected a worker command message".to_string(),
            });
        };
        match command {
            CommandKind::Pause => {
                self.paused.store(true, Ordering::SeqCst);
                Ok(CommandOutcome::Paused)
            }
            CommandKind::Resume => {
                self.paused.store(false, Ordering::SeqCst);
                Ok(CommandOutcome::Resumed)
            }
            CommandKind::Stop => {
                self.shutting_down.store(true, Ordering::SeqCst);
                Ok(CommandOutcome::StopInitiated)
            }
            CommandKind::UpdateConfig => {
                info!(?payload, "config update command acknowledged");
                Ok(CommandOutcome::ConfigAcknowledged)
            }
            CommandKind::ClearQueue => Ok(CommandOutcome::QueueCleared { cleared: 0 }),
            CommandKind::Status => Ok(CommandOutcome::Status(self.status_snapshot())),
        }
    }

    fn status_snapshot(&self) -> serde_json::Value {
        let active_tasks = self.active_tasks.lock();
        let tasks: Vec<_> = active_tasks
            .iter()
            .map(|(task_id, instance)| {
                serde_json::json!({
                    "task_id": task_id,
                    "started_at_ms": instance.started_at_ms,
                    "last_percent_complete": instance.last_percent_complete,
                })
            })
            .collect();
        serde_json::json!({
            "worker_id": self.worker_id.as_str(),
            "active_task_count": active_tasks.len(),
            "active_tasks": tasks,
            "effective_capacity": self.effective_capacity(),
            "paused": self.paused.load(Ordering::SeqCst),
            "shutting_down": self.is_shutting_down(),
        })
    }

    /// Graceful shutdown (§4.2 "Graceful shutdown"): stop accepting new
    /// tasks (already reflected in `effective_capacity`), wait up to
    /// `shutdown_deadline` for active tasks to finish on their own, then
    /// force-kill stragglers.
    pub async fn shutdown(&self) {
        self.shutting_down.store(true, Ordering::SeqCst);
        let start = tokio::time::Instant::now();
        while self.active_task_count() > 0 && start.elapsed() < self.config.shutdown_deadline {
            tokio::time::sleep(Duration::from_millis(200)).await;
        }
        let stragglers: Vec<String> = self.active_tasks.lock().keys().cloned().collect();
        for task_id in stragglers {
            if let Err(e) = self.agent.kill(&task_id, self.config.kill_grace).await {
                warn!(error = %e, task_id, "failed to kill straggling task during shutdown");
            }
        }
    }
}

#[cfg(test)]
#[path = "runtime_tests.rs"]
mod tests;
