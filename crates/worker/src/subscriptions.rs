// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bus subscription wiring (§4.2 step 4). [`WorkerRuntime`] itself owns
//! no subscriptions — this binary drives its methods from its own
//! tasks, so this module is where those tasks live: one per direct task
//! subject, each broadcast subject, and the command subject.
//!
//! Broadcast subjects carry two distinct payload shapes: a `task:
//! assignment` (the Scheduler offering work to every capable Worker,
//! racing the claim in [`cp_worker_runtime::WorkerRuntime::handle_task_assignment`])
//! and a `worker:broadcast` informational message from the operator
//! surface (§4.3.5 `broadcast()`), which this Worker only logs — there is
//! no further action defined for it on the Worker side.

use cp_adapters::agent::AgentProcess;
use cp_adapters::bus::{Bus, BusEnvelope};
use cp_adapters::cache::Cache;
use cp_core::{subject, AdapterError, BusMessage, Clock};
use cp_worker_runtime::WorkerRuntime;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Subscribes to every subject this Worker needs before returning, then
/// hands back one background task per receive loop.
pub async fn spawn_all<B, C, A, K>(
    runtime: Arc<WorkerRuntime<B, C, A, K>>,
    bus: B,
    clock: K,
) -> Result<Vec<JoinHandle<()>>, AdapterError>
where
    B: Bus,
    C: Cache,
    A: AgentProcess,
    K: Clock,
{
    let task_rx = bus.subscribe(&subject::worker_task(runtime.worker_id())).await?;
    let broadcast_rx = bus.subscribe(&subject::worker_broadcast(runtime.worker_id().as_str())).await?;
    let broadcast_all_rx = bus.subscribe(&subject::worker_broadcast_all()).await?;
    let command_rx = bus.subscribe(&subject::worker_command(runtime.worker_id())).await?;

    Ok(vec![
        spawn_assignment_loop(runtime.clone(), clock.clone(), task_rx, false),
        spawn_assignment_loop(runtime.clone(), clock.clone(), broadcast_rx, true),
        spawn_assignment_loop(runtime.clone(), clock.clone(), broadcast_all_rx, true),
        spawn_command_loop(runtime, command_rx),
    ])
}

fn spawn_assignment_loop<B, C, A, K>(
    runtime: Arc<WorkerRuntime<B, C, A, K>>,
    clock: K,
    mut rx: mpsc::Receiver<BusEnvelope>,
    is_broadcast: bool,
) -> JoinHandle<()>
where
    B: Bus,
    C: Cache,
    A: AgentProcess,
    K: Clock,
{
    tokio::spawn(async move {
        while let Some(envelope) = rx.recv().await {
            let message: BusMessage = match serde_json::from_slice(&envelope.payload) {
                Ok(m) => m,
                Err(e) => {
                    warn!(error = %e, "malformed message on task subject");
                    continue;
                }
            };
            match message {
                message @ BusMessage::TaskAssignment { .. } => {
                    match runtime.handle_task_assignment(message, is_broadcast, clock.epoch_ms()).await {
                        Ok(outcome) => info!(?outcome, is_broadcast, "task assignment handled"),
                        Err(e) => error!(error = %e, "failed to handle task assignment"),
                    }
                }
                BusMessage::WorkerBroadcast { message, sent_at_ms, .. } => {
                    info!(message, sent_at_ms, "received operator broadcast");
                }
                _ => warn!("unexpected message type on task/broadcast subject"),
            }
        }
    })
}

fn spawn_command_loop<B, C, A, K>(
    runtime: Arc<WorkerRuntime<B, C, A, K>>,
    mut rx: mpsc::Receiver<BusEnvelope>,
) -> JoinHandle<()>
where
    B: Bus,
    C: Cache,
    A: AgentProcess,
    K: Clock,
{
    tokio::spawn(async move {
        while let Some(envelope) = rx.recv().await {
            let message: BusMessage = match serde_json::from_slice(&envelope.payload) {
                Ok(m) => m,
                Err(e) => {
                    warn!(error = %e, "malformed worker command");
                    continue;
                }
            };
            match runtime.handle_command(message).await {
                Ok(outcome) => info!(?outcome, "worker command handled"),
                Err(e) => error!(error = %e, "failed to handle worker command"),
            }
        }
    })
}

#[cfg(test)]
#[path = "subscriptions_tests.rs"]
mod tests;
