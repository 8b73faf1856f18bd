// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent process supervision: spawning and controlling the opaque
//! external agent a Worker executes a Task with (§4.2).

mod process;

pub use process::ChildAgentProcess;

#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{AgentProcessCall, FakeAgentProcess};

use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;

#[derive(Debug, Error)]
pub enum AgentProcessError {
    #[error("spawn failed: {0}")]
    SpawnFailed(String),
    #[error("agent handle not found: {0}")]
    NotFound(String),
    #[error("kill failed: {0}")]
    KillFailed(String),
}

/// How a running agent process ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentOutcome {
    Exited { code: i32 },
    /// Killed after exceeding its deadline (SIGTERM -> SIGKILL escalation).
    TimedOut,
    /// Killed by explicit command/shutdown request.
    Killed,
}

/// One line the agent wrote to stdout or stderr, for marker parsing.
#[derive(Debug, Clone)]
pub struct AgentOutputLine {
    pub is_stderr: bool,
    pub line: String,
}

/// Static configuration for how the Worker launches its external agent,
/// set once at Worker startup (§6 credentials env vars).
#[derive(Debug, Clone)]
pub struct AgentProcessConfig {
    pub program: String,
    pub args: Vec<String>,
}

/// Configuration for spawning the external agent for one task.
#[derive(Debug, Clone)]
pub struct AgentSpawnConfig {
    pub task_id: String,
    pub worker_id: String,
    pub description: String,
    pub env: Vec<(String, String)>,
    pub cwd: Option<PathBuf>,
    pub timeout: Duration,
}

/// Handle to a running agent process. `output` yields lines as they are
/// written; the channel closes when the process exits.
pub struct AgentProcessHandle {
    pub task_id: String,
    pub output: mpsc::Receiver<AgentOutputLine>,
}

/// Adapter for spawning and supervising the external agent child process.
#[async_trait]
pub trait AgentProcess: Clone + Send + Sync + 'static {
    /// Spawn the agent for one task. Returns immediately with a handle
    /// streaming output; call `wait` to block until termination.
    async fn spawn(&self, config: AgentSpawnConfig) -> Result<AgentProcessHandle, AgentProcessError>;

    /// Block until the task's agent process exits, times out against its
    /// configured deadline (triggering SIGTERM -> SIGKILL escalation), or
    /// is killed externally.
    async fn wait(&self, task_id: &str) -> Result<AgentOutcome, AgentProcessError>;

    /// Send SIGTERM immediately, escalating to SIGKILL after `grace` if
    /// the process has not exited.
    async fn kill(&self, task_id: &str, grace: Duration) -> Result<(), AgentProcessError>;
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
