// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `assign_task`, `get_task_status`, `monitor_task_realtime` (§6).

use super::{error_response, ListenCtx};
use crate::container::ContainerSpawner;
use crate::protocol::Response;
use cp_adapters::bus::Bus;
use cp_adapters::cache::Cache;
use cp_core::id::IdGen;
use cp_core::{Clock, Priority, TaskId, WorkerId};
use cp_storage::Store;

/// Used when a caller omits `timeout_ms` (§6 `assign_task`); the Worker's
/// own task-level timeout handling still applies on top of this.
const DEFAULT_TASK_TIMEOUT_MS: u64 = 5 * 60 * 1000;

pub async fn assign_task<B, C, S, G, K, CS>(
    ctx: &ListenCtx<B, C, S, G, K, CS>,
    description: String,
    priority: Priority,
    worker_id: Option<WorkerId>,
    timeout_ms: Option<u64>,
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
    let result = ctx
        .runtime
        .scheduler
        .assign_task(description, priority, worker_id, timeout_ms.unwrap_or(DEFAULT_TASK_TIMEOUT_MS), None, now_ms)
        .await;
    match result {
        Ok((task_id, worker_id)) => Response::TaskAssigned { task_id, worker_id },
        Err(e) => error_response(e),
    }
}

pub async fn get_task_status<B, C, S, G, K, CS>(
    ctx: &ListenCtx<B, C, S, G, K, CS>,
    task_id: &TaskId,
    include_timeline: bool,
) -> Response
where
    B: Bus,
    C: Cache,
    S: Store,
    G: IdGen,
    K: Clock,
    CS: ContainerSpawner,
{
    let task = match ctx.store.get_task(task_id.as_str()).await {
        Ok(task) => task,
        Err(e) => return error_response(e),
    };
    let timeline = if include_timeline {
        match ctx.runtime.ingestor.task_timeline(task_id.as_str()).await {
            Ok(timeline) => timeline,
            Err(e) => return error_response(e),
        }
    } else {
        Vec::new()
    };
    let task = match task.map(|t| serde_json::to_value(t)).transpose() {
        Ok(task) => task,
        Err(e) => return error_response(e),
    };
    Response::TaskStatus { task, timeline }
}

/// A push stream has no counterpart over request/response stdio, so this
/// returns the cached timeline as a snapshot rather than streaming for
/// `duration_seconds` (§6, §9).
pub async fn monitor_task_realtime<B, C, S, G, K, CS>(
    ctx: &ListenCtx<B, C, S, G, K, CS>,
    task_id: &TaskId,
    _duration_seconds: u64,
) -> Response
where
    B: Bus,
    C: Cache,
    S: Store,
    G: IdGen,
    K: Clock,
    CS: ContainerSpawner,
{
    match ctx.runtime.ingestor.task_timeline(task_id.as_str()).await {
        Ok(records) => Response::TaskProgressStream { records },
        Err(e) => error_response(e),
    }
}

#[cfg(test)]
#[path = "tasks_tests.rs"]
mod tests;
