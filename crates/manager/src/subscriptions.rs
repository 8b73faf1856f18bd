// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bus subscription wiring (§4.3, §6). [`ManagerRuntime`] itself owns no
//! subscriptions — a binary drives its methods from its own tasks, so
//! this module is where those tasks live: one per registration,
//! heartbeat, rejection, and analytics-wildcard subject.

use cp_adapters::bus::{Bus, BusEnvelope};
use cp_adapters::cache::Cache;
use cp_core::id::IdGen;
use cp_core::{subject, AdapterError, BusMessage, Clock, WorkerRecord};
use cp_manager_runtime::ManagerRuntime;
use cp_storage::Store;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, warn};

/// Starts every background subscription task the Manager needs beyond
/// what an operator-surface listener drives directly. Subscribing
/// happens before this function returns, so by the time it resolves
/// every subject is live; only the receive loops run in the background.
pub async fn spawn_all<B, C, S, G, K>(
    runtime: Arc<ManagerRuntime<B, C, S, G, K>>,
    bus: B,
    clock: K,
) -> Result<Vec<JoinHandle<()>>, AdapterError>
where
    B: Bus,
    C: Cache,
    S: Store,
    G: IdGen,
    K: Clock,
{
    let registration_rx = bus.subscribe(subject::WORKER_REGISTER).await?;
    let heartbeat_rx = bus.subscribe(subject::WORKER_HEARTBEAT).await?;
    let rejection_rx = bus.subscribe("task.rejected.*").await?;
    let mut analytics_rx = Vec::new();
    for subject in runtime.analytics_subjects() {
        analytics_rx.push((subject, bus.subscribe(subject).await?));
    }

    let mut handles = vec![
        spawn_registration_loop(runtime.clone(), bus.clone(), clock.clone(), registration_rx),
        spawn_heartbeat_loop(runtime.clone(), heartbeat_rx),
        spawn_task_rejection_loop(runtime.clone(), clock.clone(), rejection_rx),
    ];
    for (subject, rx) in analytics_rx {
        handles.push(spawn_analytics_loop(runtime.clone(), clock.clone(), subject, rx));
    }
    Ok(handles)
}

fn spawn_registration_loop<B, C, S, G, K>(
    runtime: Arc<ManagerRuntime<B, C, S, G, K>>,
    bus: B,
    clock: K,
    mut rx: mpsc::Receiver<BusEnvelope>,
) -> JoinHandle<()>
where
    B: Bus,
    C: Cache,
    S: Store,
    G: IdGen,
    K: Clock,
{
    tokio::spawn(async move {
        while let Some(envelope) = rx.recv().await {
            let message: BusMessage = match serde_json::from_slice(&envelope.payload) {
                Ok(m) => m,
                Err(e) => {
                    warn!(error = %e, "malformed worker registration");
                    continue;
                }
            };
            let BusMessage::WorkerRegister { worker_id, hostname, tags, capabilities, system_info, registered_at_ms } =
                message
            else {
                warn!("unexpected message type on worker registration subject");
                continue;
            };
            let record = WorkerRecord {
                worker_id,
                hostname,
                tags,
                capabilities,
                system_info,
                status: cp_core::WorkerStatus::Idle,
                registered_at_ms,
                last_heartbeat_ms: registered_at_ms,
                metadata: Default::default(),
                current_load: 0,
            };
            if let Err(e) = runtime.registry.register(&record).await {
                error!(error = %e, worker_id = %record.worker_id, "registration failed");
            }
            if let Some(reply_to) = envelope.reply_to {
                let ack = serde_json::json!({ "registered": true, "now_ms": clock.epoch_ms() });
                if let Ok(bytes) = serde_json::to_vec(&ack) {
                    if let Err(e) = bus.reply(&reply_to, bytes).await {
                        warn!(error = %e, "failed to ack worker registration");
                    }
                }
            }
        }
    })
}

fn spawn_heartbeat_loop<B, C, S, G, K>(
    runtime: Arc<ManagerRuntime<B, C, S, G, K>>,
    mut rx: mpsc::Receiver<BusEnvelope>,
) -> JoinHandle<()>
where
    B: Bus,
    C: Cache,
    S: Store,
    G: IdGen,
    K: Clock,
{
    tokio::spawn(async move {
        while let Some(envelope) = rx.recv().await {
            let message: BusMessage = match serde_json::from_slice(&envelope.payload) {
                Ok(m) => m,
                Err(e) => {
                    warn!(error = %e, "malformed worker heartbeat");
                    continue;
                }
            };
            let BusMessage::WorkerHeartbeat { worker_id, current_load, sent_at_ms, .. } = message else {
                warn!("unexpected message type on worker heartbeat subject");
                continue;
            };
            if let Err(e) = runtime.registry.heartbeat(&worker_id, current_load, sent_at_ms).await {
                warn!(error = %e, worker_id = %worker_id, "heartbeat failed");
            }
        }
    })
}

fn spawn_task_rejection_loop<B, C, S, G, K>(
    runtime: Arc<ManagerRuntime<B, C, S, G, K>>,
    clock: K,
    mut rx: mpsc::Receiver<BusEnvelope>,
) -> JoinHandle<()>
where
    B: Bus,
    C: Cache,
    S: Store,
    G: IdGen,
    K: Clock,
{
    tokio::spawn(async move {
        while let Some(envelope) = rx.recv().await {
            let message: BusMessage = match serde_json::from_slice(&envelope.payload) {
                Ok(m) => m,
                Err(e) => {
                    warn!(error = %e, "malformed task rejection");
                    continue;
                }
            };
            let BusMessage::TaskRejected { task_id, reason, rejected_at_ms, .. } = message else {
                warn!("unexpected message type on task rejection subject");
                continue;
            };
            let now_ms = std::cmp::max(rejected_at_ms, clock.epoch_ms());
            if let Err(e) = runtime.handle_task_rejection(&task_id, &reason, now_ms).await {
                error!(error = %e, task_id = %task_id, "failed to handle task rejection");
            }
        }
    })
}

fn spawn_analytics_loop<B, C, S, G, K>(
    runtime: Arc<ManagerRuntime<B, C, S, G, K>>,
    clock: K,
    subject: &'static str,
    mut rx: mpsc::Receiver<BusEnvelope>,
) -> JoinHandle<()>
where
    B: Bus,
    C: Cache,
    S: Store,
    G: IdGen,
    K: Clock,
{
    tokio::spawn(async move {
        while let Some(envelope) = rx.recv().await {
            if let Err(e) = runtime.handle_analytics_message(&envelope, clock.epoch_ms()).await {
                error!(error = %e, subject, "failed to handle analytics message");
            }
        }
    })
}

#[cfg(test)]
#[path = "subscriptions_tests.rs"]
mod tests;
