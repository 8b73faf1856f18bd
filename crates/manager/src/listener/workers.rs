// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `list_workers`, `get_worker_status`, `spawn_worker_container` (§6).

use super::{error_response, ListenCtx};
use crate::container::{ContainerSpawner, ContainerSpawnRequest};
use crate::protocol::Response;
use cp_adapters::bus::Bus;
use cp_adapters::cache::Cache;
use cp_core::id::IdGen;
use cp_core::{Clock, WorkerId, WorkerStatus};
use cp_storage::Store;

const RECENT_EVENTS_LIMIT: i64 = 20;

pub async fn list_workers<B, C, S, G, K, CS>(
    ctx: &ListenCtx<B, C, S, G, K, CS>,
    status_filter: Option<WorkerStatus>,
    _include_stats: bool,
) -> Response
where
    B: Bus,
    C: Cache,
    S: Store,
    G: IdGen,
    K: Clock,
    CS: ContainerSpawner,
{
    match ctx.runtime.registry.list_workers().await {
        Ok(workers) => {
            let workers = match status_filter {
                Some(status) => workers.into_iter().filter(|w| w.status == status).collect(),
                None => workers,
            };
            Response::Workers { workers }
        }
        Err(e) => error_response(e),
    }
}

pub async fn get_worker_status<B, C, S, G, K, CS>(ctx: &ListenCtx<B, C, S, G, K, CS>, worker_id: &WorkerId) -> Response
where
    B: Bus,
    C: Cache,
    S: Store,
    G: IdGen,
    K: Clock,
    CS: ContainerSpawner,
{
    let worker = match ctx.runtime.registry.get_worker(worker_id.as_str()).await {
        Ok(worker) => worker,
        Err(e) => return error_response(e),
    };
    let events = match ctx.store.list_events(worker_id.as_str(), RECENT_EVENTS_LIMIT).await {
        Ok(events) => events,
        Err(e) => return error_response(e),
    };
    let recent_events = events
        .into_iter()
        .map(|e| serde_json::json!({ "event_type": e.event_type, "event_data": e.event_data, "timestamp_ms": e.timestamp_ms }))
        .collect();
    Response::WorkerStatus { worker: worker.map(Box::new), recent_events }
}

pub async fn spawn_worker_container<B, C, S, G, K, CS>(
    ctx: &ListenCtx<B, C, S, G, K, CS>,
    tags: Vec<String>,
    max_tasks: u32,
    max_memory_mb: u64,
    name: Option<String>,
) -> Response
where
    B: Bus,
    C: Cache,
    S: Store,
    G: IdGen,
    K: Clock,
    CS: ContainerSpawner,
{
    let request = ContainerSpawnRequest { tags, max_tasks, max_memory_mb, name };
    match ctx.container_spawner.spawn(request).await {
        Ok(spawned) => Response::ContainerSpawned {
            container_id: spawned.container_id,
            name: spawned.name,
            registered: spawned.registered,
        },
        Err(e) => error_response(e),
    }
}

#[cfg(test)]
#[path = "workers_tests.rs"]
mod tests;
