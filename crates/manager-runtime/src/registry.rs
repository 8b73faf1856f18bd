// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Registry reconciler (§4.3.1): the authoritative Worker view, kept
//! consistent across the durable store and the cache projection.

use crate::config::ManagerRuntimeConfig;
use crate::error::RegistryError;
use cp_adapters::cache::Cache;
use cp_core::{Clock, WorkerId, WorkerRecord, WorkerStatus};
use cp_storage::Store;
use std::time::Duration;
use tracing::{info, warn};

const ACTIVE_WORKERS_KEY: &str = "workers:active";

fn worker_cache_key(worker_id: &str) -> String {
    format!("worker:{worker_id}")
}

pub struct Registry<C: Cache, S: Store, K: Clock> {
    cache: C,
    store: S,
    clock: K,
    config: ManagerRuntimeConfig,
}

impl<C: Cache, S: Store, K: Clock> Registry<C, S, K> {
    pub fn new(cache: C, store: S, clock: K, config: ManagerRuntimeConfig) -> Self {
        Self { cache, store, clock, config }
    }

    /// Upsert a Worker into store and cache, adding it to the active set.
    /// Idempotent: applying the same registration twice yields one row and
    /// one set membership (§8).
    pub async fn register(&self, worker: &WorkerRecord) -> Result<(), RegistryError> {
        self.store.upsert_worker(worker).await?;
        self.write_cache_projection(worker).await?;
        self.cache.sadd(ACTIVE_WORKERS_KEY, worker.worker_id.as_str()).await?;
        info!(worker_id = %worker.worker_id, "worker registered");
        Ok(())
    }

    /// Apply a heartbeat: refresh `last_heartbeat_ms`, `current_load`, and
    /// `status` if the Worker reports a change (e.g. coming back from
    /// `unresponsive`).
    pub async fn heartbeat(
        &self,
        worker_id: &WorkerId,
        current_load: u32,
        last_heartbeat_ms: u64,
    ) -> Result<(), RegistryError> {
        let mut worker = self
            .get_worker(worker_id.as_str())
            .await?
            .ok_or_else(|| RegistryError::WorkerNotFound(worker_id.as_str().to_string()))?;
        worker.current_load = current_load;
        worker.last_heartbeat_ms = last_heartbeat_ms;
        if !worker.status.is_live() {
            worker.status = WorkerStatus::Idle;
        }
        self.store.upsert_worker(&worker).await?;
        self.write_cache_projection(&worker).await?;
        Ok(())
    }

    pub async fn set_status(&self, worker_id: &WorkerId, status: WorkerStatus) -> Result<(), RegistryError> {
        let mut worker = self
            .get_worker(worker_id.as_str())
            .await?
            .ok_or_else(|| RegistryError::WorkerNotFound(worker_id.as_str().to_string()))?;
        worker.status = status;
        self.store.upsert_worker(&worker).await?;
        self.write_cache_projection(&worker).await?;
        Ok(())
    }

    /// Merged view: cache projection preferred when fresher (§6 `list_workers`).
    pub async fn list_workers(&self) -> Result<Vec<WorkerRecord>, RegistryError> {
        let store_workers = self.store.list_workers().await?;
        let mut merged = Vec::with_capacity(store_workers.len());
        for worker in store_workers {
            let cached = self.read_cache_projection(worker.worker_id.as_str()).await?;
            merged.push(match cached {
                Some(cached) => worker.merge_preferring_newer_heartbeat(cached),
                None => worker,
            });
        }
        Ok(merged)
    }

    pub async fn get_worker(&self, worker_id: &str) -> Result<Option<WorkerRecord>, RegistryError> {
        let cached = self.read_cache_projection(worker_id).await?;
        let stored = self.store.get_worker(worker_id).await?;
        Ok(match (stored, cached) {
            (Some(stored), Some(cached)) => Some(stored.merge_preferring_newer_heartbeat(cached)),
            (Some(stored), None) => Some(stored),
            (None, Some(cached)) => Some(cached),
            (None, None) => None,
        })
    }

    async fn write_cache_projection(&self, worker: &WorkerRecord) -> Result<(), RegistryError> {
        let blob = serde_json::to_vec(worker).map_err(|e| RegistryError::WorkerNotFound(e.to_string()))?;
        self.cache.set(&worker_cache_key(worker.worker_id.as_str()), blob, None).await?;
        Ok(())
    }

    async fn read_cache_projection(&self, worker_id: &str) -> Result<Option<WorkerRecord>, RegistryError> {
        match self.cache.get(&worker_cache_key(worker_id)).await? {
            Some(bytes) => Ok(serde_json::from_slice(&bytes).ok()),
            None => Ok(None),
        }
    }

    /// One health-sweep pass (§4.3.1). Flips stale `{idle,busy}` Workers to
    /// `unresponsive`, and long-stale `unresponsive` Workers to `offline`.
    /// Returns the worker ids that just became `unresponsive`, so the
    /// caller (the Scheduler) can reassign their tasks.
    pub async fn sweep(&self) -> Result<Vec<WorkerId>, RegistryError> {
        let now = self.clock.epoch_ms();
        let mut newly_unresponsive = Vec::new();
        for worker in self.store.list_workers().await? {
            let age = Duration::from_millis(now.saturating_sub(worker.last_heartbeat_ms));
            if worker.status.is_live() && age >= self.config.worker_timeout {
                self.set_status(&worker.worker_id, WorkerStatus::Unresponsive).await?;
                warn!(worker_id = %worker.worker_id, "worker marked unresponsive");
                newly_unresponsive.push(worker.worker_id);
            } else if worker.status == WorkerStatus::Unresponsive
                && age >= self.config.worker_timeout + self.config.offline_grace
            {
                self.set_status(&worker.worker_id, WorkerStatus::Offline).await?;
                self.cache.srem(ACTIVE_WORKERS_KEY, worker.worker_id.as_str()).await?;
                info!(worker_id = %worker.worker_id, "worker marked offline");
            }
        }
        Ok(newly_unresponsive)
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
