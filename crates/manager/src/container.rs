// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Container spawning (§9 Open Question: treat `spawn_worker_container`
//! as a single external capability interface rather than baking a
//! specific orchestrator into the Scheduler/listener). A deployment
//! swaps [`ProcessContainerSpawner`] for a real container-runtime
//! adapter without touching the operator surface that calls it.

use async_trait::async_trait;
use std::process::Stdio;
use thiserror::Error;
use tokio::process::Command;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum ContainerSpawnError {
    #[error("spawn failed: {0}")]
    SpawnFailed(String),
}

#[derive(Debug, Clone)]
pub struct ContainerSpawnRequest {
    pub tags: Vec<String>,
    pub max_tasks: u32,
    pub max_memory_mb: u64,
    pub name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SpawnedContainer {
    pub container_id: String,
    pub name: String,
    /// Whether the spawned process had already registered itself with
    /// the Registry by the time `spawn` returned. A process-backed
    /// spawner never waits for this; a real orchestrator that blocks
    /// until the container reports ready could set it `true`.
    pub registered: bool,
}

/// Launches a new Worker instance with the given capacity/tag profile.
#[async_trait]
pub trait ContainerSpawner: Send + Sync + 'static {
    async fn spawn(&self, request: ContainerSpawnRequest) -> Result<SpawnedContainer, ContainerSpawnError>;
}

/// Launches the Worker binary as a plain child process, configured
/// through the same environment variables a real Worker reads at
/// startup (§6). This is the local/dev-grade implementation; a
/// production deployment swaps in an adapter that talks to its
/// container runtime instead.
pub struct ProcessContainerSpawner {
    worker_binary: String,
    extra_env: Vec<(String, String)>,
}

impl ProcessContainerSpawner {
    pub fn new(worker_binary: impl Into<String>, extra_env: Vec<(String, String)>) -> Self {
        Self { worker_binary: worker_binary.into(), extra_env }
    }
}

#[async_trait]
impl ContainerSpawner for ProcessContainerSpawner {
    async fn spawn(&self, request: ContainerSpawnRequest) -> Result<SpawnedContainer, ContainerSpawnError> {
        let container_id = Uuid::new_v4().to_string();
        let name = request.name.clone().unwrap_or_else(|| format!("worker-{container_id}"));

        let mut command = Command::new(&self.worker_binary);
        command
            .env("WORKER_ID", &name)
            .env("MAX_CONCURRENT_TASKS", request.max_tasks.to_string())
            .env("MAX_MEMORY_MB", request.max_memory_mb.to_string())
            .env("WORKER_TAGS", request.tags.join(","))
            .envs(self.extra_env.iter().cloned())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        command.spawn().map_err(|e| ContainerSpawnError::SpawnFailed(format!("{}: {e}", self.worker_binary)))?;

        Ok(SpawnedContainer { container_id, name, registered: false })
    }
}

#[cfg(test)]
#[path = "container_tests.rs"]
mod tests;
