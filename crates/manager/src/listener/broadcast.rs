// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `broadcast` (§6). The bus has no native multicast concept — delivery
//! is per-subject, so a targeted broadcast resolves each session id to
//! its owning Worker and publishes once per Worker; an untargeted one
//! publishes once on the `worker.broadcast.all` subject every Worker
//! subscribes to.

use super::{error_response, ListenCtx};
use crate::container::ContainerSpawner;
use crate::protocol::Response;
use cp_adapters::bus::Bus;
use cp_adapters::cache::Cache;
use cp_core::id::IdGen;
use cp_core::{subject, BusMessage, Clock, WorkerId};
use cp_storage::Store;
use std::collections::HashSet;
use tracing::warn;

pub async fn broadcast<B, C, S, G, K, CS>(
    ctx: &ListenCtx<B, C, S, G, K, CS>,
    message: String,
    target_session_ids: Vec<String>,
) -> Response
where
    B: Bus,
    C: Cache,
    S: Store,
    G: IdGen,
    K: Clock,
    CS: ContainerSpawner,
{
    let now_ms = ctx.clock.epoch_ms();

    if target_session_ids.is_empty() {
        let recipients_count = match ctx.runtime.registry.list_workers().await {
            Ok(workers) => workers.len(),
            Err(e) => return error_response(e),
        };
        let payload = BusMessage::WorkerBroadcast { message, target_session_ids, sent_at_ms: now_ms };
        return match publish(ctx, &subject::worker_broadcast_all(), &payload).await {
            Ok(()) => Response::Broadcast { recipients_count },
            Err(e) => error_response(e),
        };
    }

    let mut worker_ids: HashSet<WorkerId> = HashSet::new();
    for session_id in &target_session_ids {
        match ctx.store.get_session(session_id).await {
            Ok(Some(session)) => {
                worker_ids.insert(session.worker_id);
            }
            Ok(None) => warn!(session_id, "broadcast targets an unknown session, skipping"),
            Err(e) => return error_response(e),
        }
    }

    let payload = BusMessage::WorkerBroadcast { message, target_session_ids, sent_at_ms: now_ms };
    for worker_id in &worker_ids {
        if let Err(e) = publish(ctx, &subject::worker_broadcast(worker_id.as_str()), &payload).await {
            return error_response(e);
        }
    }
    Response::Broadcast { recipients_count: worker_ids.len() }
}

async fn publish<B, C, S, G, K, CS>(
    ctx: &ListenCtx<B, C, S, G, K, CS>,
    subject: &str,
    message: &BusMessage,
) -> Result<(), cp_core::AdapterError>
where
    B: Bus,
    C: Cache,
    S: Store,
    G: IdGen,
    K: Clock,
    CS: ContainerSpawner,
{
    let payload = serde_json::to_vec(message).map_err(|e| cp_core::AdapterError::invalid(e.to_string()))?;
    ctx.bus.publish(subject, payload).await
}

#[cfg(test)]
#[path = "broadcast_tests.rs"]
mod tests;
