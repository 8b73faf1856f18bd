// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! cp-manager-runtime: the Manager's control-plane subsystems (§4.3) —
//! Registry reconciliation, Scheduler dispatch, the interactive RPC
//! broker, and the progress/analytics ingestor — composed behind one
//! [`ManagerRuntime`] handle generic over the Bus/Cache/Store adapters
//! and the id/clock sources that make it deterministically testable.

pub mod config;
pub mod error;
pub mod ingestor;
pub mod registry;
pub mod rpc_broker;
pub mod scheduler;

pub use config::ManagerRuntimeConfig;
pub use error::{IngestError, RegistryError, RpcBrokerError, SchedulerError};
pub use ingestor::{IngestOutcome, Ingestor};
pub use registry::Registry;
pub use rpc_broker::RpcBroker;
pub use scheduler::Scheduler;

use cp_adapters::bus::{Bus, BusEnvelope};
use cp_adapters::cache::Cache;
use cp_core::id::IdGen;
use cp_core::{subject, Clock, TaskId, WorkerId, WorkerStatus};
use cp_storage::Store;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, warn};

/// Union of every subsystem error a top-level dispatch loop can hit.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
    #[error(transparent)]
    RpcBroker(#[from] RpcBrokerError),
    #[error(transparent)]
    Ingest(#[from] IngestError),
}

/// Composes the four control-plane subsystems. Owns no subscriptions or
/// background tasks itself — a binary (`cp-manager`) drives its methods
/// from its own tokio tasks/timers, keeping this crate free of a process
/// lifecycle opinion.
pub struct ManagerRuntime<B: Bus, C: Cache, S: Store, G: IdGen, K: Clock> {
    pub registry: Arc<Registry<C, S, K>>,
    pub scheduler: Scheduler<B, C, S, G, K>,
    pub rpc_broker: RpcBroker<B, C, S>,
    pub ingestor: Ingestor<C, S>,
    config: ManagerRuntimeConfig,
}

impl<B: Bus, C: Cache, S: Store, G: IdGen, K: Clock> ManagerRuntime<B, C, S, G, K> {
    pub fn new(bus: B, cache: C, store: S, clock: K, id_gen: G, config: ManagerRuntimeConfig) -> Self {
        let registry = Arc::new(Registry::new(cache.clone(), store.clone(), clock, config.clone()));
        let scheduler = Scheduler::new(bus.clone(), store.clone(), registry.clone(), id_gen, config.clone());
        let rpc_broker = RpcBroker::new(bus, cache.clone(), store.clone(), config.clone());
        let ingestor = Ingestor::new(cache, store, config.clone());
        Self { registry, scheduler, rpc_broker, ingestor, config }
    }

    pub fn config(&self) -> &ManagerRuntimeConfig {
        &self.config
    }

    /// The seven subjects a binary must subscribe this method's output to
    /// (§4.3.4).
    pub fn analytics_subjects(&self) -> [&'static str; 7] {
        subject::ingestor_wildcards()
    }

    /// Feeds one message off the analytics subscription through the
    /// ingestor, then routes its outcome to the Scheduler, Registry, or
    /// RPC broker as appropriate. Malformed messages are logged and
    /// swallowed rather than propagated, so one bad message never stalls
    /// the subscription (§4.3.4).
    pub async fn handle_analytics_message(&self, envelope: &BusEnvelope, now_ms: u64) -> Result<(), RuntimeError> {
        let outcome = match self.ingestor.ingest(envelope, now_ms).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(subject = %envelope.subject, error = %e, "dropping malformed analytics message");
                return Ok(());
            }
        };
        match outcome {
            IngestOutcome::Progress { task_id, .. } => {
                self.scheduler.handle_confirmation(&task_id, now_ms).await?;
            }
            IngestOutcome::Completion { worker_id, .. } => {
                self.on_task_completed(&worker_id, now_ms).await?;
            }
            IngestOutcome::Question { question_id, worker_id, session_id, question, question_type, context, reply_to } => {
                self.rpc_broker
                    .submit_question(
                        question_id,
                        worker_id,
                        session_id.map(|s| s.as_str().to_string()),
                        question,
                        question_type,
                        context,
                        reply_to,
                        now_ms,
                    )
                    .await?;
            }
            IngestOutcome::NextTaskRequest { worker_id, reply_to } => {
                self.rpc_broker.submit_next_task_request(&worker_id, now_ms, &reply_to).await?;
            }
            IngestOutcome::EndSessionRequest { worker_id, session_id, reason, reply_to } => {
                self.rpc_broker
                    .submit_end_session_request(worker_id, session_id.as_str().to_string(), reason, now_ms, reply_to)
                    .await?;
            }
            IngestOutcome::RealtimeProgress { .. } | IngestOutcome::Event { .. } => {}
        }
        Ok(())
    }

    /// A freed Worker goes back to `idle` immediately, and the pending
    /// queue gets one dispatch attempt rather than waiting for the next
    /// periodic sweep, so capacity freed by a fast task is reused without
    /// a `health_check_interval`-sized latency hit.
    async fn on_task_completed(&self, worker_id: &WorkerId, now_ms: u64) -> Result<(), RuntimeError> {
        self.registry.set_status(worker_id, WorkerStatus::Idle).await?;
        self.scheduler.dispatch_pending(now_ms).await?;
        Ok(())
    }

    /// A Worker explicitly rejected its assignment (`task.rejected.<id>`).
    pub async fn handle_task_rejection(&self, task_id: &TaskId, reason: &str, now_ms: u64) -> Result<(), RuntimeError> {
        self.scheduler.handle_rejection(task_id, reason, now_ms).await?;
        Ok(())
    }

    /// One pass of every periodic control-plane concern: health sweep,
    /// reassignment of the Workers it just condemned, dispatch-ack
    /// timeouts, draining the pending queue against freed capacity, and
    /// question-deadline expiry. A `cp-manager` binary calls this from a
    /// single timer loop on `health_check_interval`.
    pub async fn run_periodic_sweep(&self, now_ms: u64) -> Result<SweepReport, RuntimeError> {
        let newly_unresponsive = self.registry.sweep().await?;
        for worker_id in &newly_unresponsive {
            self.scheduler.reassign_for_unresponsive(worker_id, now_ms).await?;
        }
        let ack_timeouts = self.scheduler.check_ack_deadlines(now_ms).await?;
        let dispatched = self.scheduler.dispatch_pending(now_ms).await?;
        let expired_questions = self.rpc_broker.expire_questions(now_ms).await?;
        let flushed = self.ingestor.flush_buffer().await?;
        Ok(SweepReport {
            newly_unresponsive: newly_unresponsive.len(),
            ack_timeouts,
            dispatched,
            expired_questions,
            flushed_buffer_writes: flushed,
        })
    }

    /// Graceful shutdown: drain every outstanding interactive RPC with a
    /// synthesized reply before the process exits (§10.6).
    pub async fn shutdown(&self) -> Result<(), RuntimeError> {
        self.rpc_broker.shutdown().await?;
        if self.ingestor.dropped_count() > 0 {
            error!(dropped = self.ingestor.dropped_count(), "analytics writes dropped during this run");
        }
        Ok(())
    }
}

/// Summary of one [`ManagerRuntime::run_periodic_sweep`] pass, useful for
/// structured logging and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub newly_unresponsive: usize,
    pub ack_timeouts: usize,
    pub dispatched: usize,
    pub expired_questions: usize,
    pub flushed_buffer_writes: usize,
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
