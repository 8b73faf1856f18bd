// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake agent process supervisor for deterministic Worker tests.

use super::{AgentOutcome, AgentOutputLine, AgentProcess, AgentProcessError, AgentProcessHandle, AgentSpawnConfig};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

#[derive(Debug, Clone)]
pub enum AgentProcessCall {
    Spawn { task_id: String },
    Kill { task_id: String },
}

struct FakeRun {
    outcome_tx: Option<oneshot::Sender<AgentOutcome>>,
    outcome_rx: Option<oneshot::Receiver<AgentOutcome>>,
    output_tx: mpsc::Sender<AgentOutputLine>,
}

#[derive(Clone)]
pub struct FakeAgentProcess {
    inner: Arc<Mutex<FakeAgentProcessState>>,
}

struct FakeAgentProcessState {
    runs: HashMap<String, FakeRun>,
    calls: Vec<AgentProcessCall>,
    spawn_error: Option<String>,
}

impl Default for FakeAgentProcess {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeAgentProcess {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(FakeAgentProcessState {
                runs: HashMap::new(),
                calls: Vec::new(),
                spawn_error: None,
            })),
        }
    }

    pub fn calls(&self) -> Vec<AgentProcessCall> {
        self.inner.lock().calls.clone()
    }

    pub fn set_spawn_error(&self, message: impl Into<String>) {
        self.inner.lock().spawn_error = Some(message.into());
    }

    /// Push one output line for a spawned task, as if the agent wrote it.
    pub async fn emit_line(&self, task_id: &str, is_stderr: bool, line: impl Into<String>) {
        let tx = {
            let inner = self.inner.lock();
            inner.runs.get(task_id).map(|r| r.output_tx.clone())
        };
        if let Some(tx) = tx {
            let _ = tx.send(AgentOutputLine { is_stderr, line: line.into() }).await;
        }
    }

    /// Simulate the agent exiting with `code`.
    pub fn finish(&self, task_id: &str, code: i32) {
        let mut inner = self.inner.lock();
        if let Some(run) = inner.runs.get_mut(task_id) {
            if let Some(tx) = run.outcome_tx.take() {
                let _ = tx.send(AgentOutcome::Exited { code });
            }
        }
    }
}

#[async_trait]
impl AgentProcess for FakeAgentProcess {
    async fn spawn(&self, config: AgentSpawnConfig) -> Result<AgentProcessHandle, AgentProcessError> {
        let mut inner = self.inner.lock();
        inner.calls.push(AgentProcessCall::Spawn { task_id: config.task_id.clone() });
        if let Some(message) = inner.spawn_error.take() {
            return Err(AgentProcessError::SpawnFailed(message));
        }
        let (output_tx, output_rx) = mpsc::channel(64);
        let (outcome_tx, outcome_rx) = oneshot::channel();
        inner.runs.insert(
            config.task_id.clone(),
            FakeRun {
                outcome_tx: Some(outcome_tx),
                outcome_rx: Some(outcome_rx),
                output_tx,
            },
        );
        Ok(AgentProcessHandle {
            task_id: config.task_id,
            output: output_rx,
        })
    }

    async fn wait(&self, task_id: &str) -> Result<AgentOutcome, AgentProcessError> {
        let outcome_rx = {
            let mut inner = self.inner.lock();
            inner
                .runs
                .get_mut(task_id)
                .and_then(|run| run.outcome_rx.take())
        };
        let outcome_rx = outcome_rx.ok_or_else(|| AgentProcessError::NotFound(task_id.to_string()))?;
        outcome_rx.await.map_err(|_| AgentProcessError::NotFound(task_id.to_string()))
    }

    async fn kill(&self, task_id: &str, _grace: Duration) -> Result<(), AgentProcessError> {
        let mut inner = self.inner.lock();
        inner.calls.push(AgentProcessCall::Kill { task_id: task_id.to_string() });
        match inner.runs.get_mut(task_id) {
            Some(run) => {
                if let Some(tx) = run.outcome_tx.take() {
                    let _ = tx.send(AgentOutcome::Killed);
                }
                Ok(())
            }
            None => Err(AgentProcessError::NotFound(task_id.to_string())),
        }
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
