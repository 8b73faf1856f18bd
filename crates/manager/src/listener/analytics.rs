// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `get_worker_analytics` (§6). The durable store has no time-range
//! query, so `time_range` narrows nothing here — it is accepted and
//! echoed back so a caller can tell the aggregate is a whole-fleet
//! snapshot rather than silently ignoring the argument.

use super::ListenCtx;
use crate::container::ContainerSpawner;
use crate::protocol::{Response, TimeRange};
use cp_adapters::bus::Bus;
use cp_adapters::cache::Cache;
use cp_core::id::IdGen;
use cp_core::{Clock, WorkerStatus};
use cp_storage::Store;
use std::collections::HashMap;

pub async fn get_worker_analytics<B, C, S, G, K, CS>(ctx: &ListenCtx<B, C, S, G, K, CS>, time_range: Option<TimeRange>) -> Response
where
    B: Bus,
    C: Cache,
    S: Store,
    G: IdGen,
    K: Clock,
    CS: ContainerSpawner,
{
    let workers = match ctx.runtime.registry.list_workers().await {
        Ok(workers) => workers,
        Err(e) => return super::error_response(e),
    };

    let mut by_status: HashMap<&'static str, usize> = HashMap::new();
    for worker in &workers {
        *by_status.entry(status_label(worker.status)).or_insert(0) += 1;
    }

    let aggregates = serde_json::json!({
        "total_workers": workers.len(),
        "workers_by_status": by_status,
        "malformed_messages": ctx.runtime.ingestor.malformed_count(),
        "dropped_durable_writes": ctx.runtime.ingestor.dropped_count(),
        "buffered_durable_writes": ctx.runtime.ingestor.buffered_count(),
        "time_range": time_range,
    });
    Response::WorkerAnalytics { aggregates }
}

fn status_label(status: WorkerStatus) -> &'static str {
    match status {
        WorkerStatus::Initializing => "initializing",
        WorkerStatus::Idle => "idle",
        WorkerStatus::Busy => "busy",
        WorkerStatus::Unresponsive => "unresponsive",
        WorkerStatus::Offline => "offline",
    }
}

#[cfg(test)]
#[path = "analytics_tests.rs"]
mod tests;
