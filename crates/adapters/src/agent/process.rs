// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Real agent process supervisor: spawns the external agent as a child
//! process and tracks it until exit.

use super::{AgentOutcome, AgentOutputLine, AgentProcess, AgentProcessConfig, AgentProcessError, AgentProcessHandle, AgentSpawnConfig};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, oneshot};

/// Execute the system `kill` binary with the given signal. Mirrors the
/// plain-subprocess signaling style used for daemon lifecycle control,
/// avoiding a dependency on process-signal FFI crates.
fn send_signal(signal: &str, pid: u32) -> bool {
    std::process::Command::new("kill")
        .args([signal, &pid.to_string()])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

struct RunningAgent {
    pid: u32,
    timeout: Duration,
    outcome_rx: Option<oneshot::Receiver<AgentOutcome>>,
    kill_tx: Option<oneshot::Sender<Duration>>,
}

/// Spawns the external agent configured by [`AgentProcessConfig`] as a
/// real OS process.
#[derive(Clone)]
pub struct ChildAgentProcess {
    config: AgentProcessConfig,
    running: Arc<Mutex<HashMap<String, RunningAgent>>>,
}

impl ChildAgentProcess {
    pub fn new(config: AgentProcessConfig) -> Self {
        Self {
            config,
            running: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

#[async_trait]
impl AgentProcess for ChildAgentProcess {
    async fn spawn(&self, spawn_config: AgentSpawnConfig) -> Result<AgentProcessHandle, AgentProcessError> {
        let mut command = Command::new(&self.config.program);
        command
            .args(&self.config.args)
            .arg(&spawn_config.description)
            .envs(spawn_config.env.iter().cloned())
            .env("TASK_ID", &spawn_config.task_id)
            .env("WORKER_ID", &spawn_config.worker_id)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(cwd) = &spawn_config.cwd {
            command.current_dir(cwd);
        }

        let mut child: Child = command
            .spawn()
            .map_err(|e| AgentProcessError::SpawnFailed(format!("{}: {e}", self.config.program)))?;
        let pid = child.id().ok_or_else(|| AgentProcessError::SpawnFailed("child exited immediately".into()))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| AgentProcessError::SpawnFailed("missing stdout pipe".into()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| AgentProcessError::SpawnFailed("missing stderr pipe".into()))?;
        let (output_tx, output_rx) = mpsc::channel(256);
        let (outcome_tx, outcome_rx) = oneshot::channel();
        let (kill_tx, kill_rx) = oneshot::channel();

        tokio::spawn(stream_lines(output_tx.clone(), stdout, false));
        tokio::spawn(stream_lines(output_tx, stderr, true));
        tokio::spawn(supervise(child, pid, spawn_config.timeout, kill_rx, outcome_tx));

        self.running.lock().insert(
            spawn_config.task_id.clone(),
            RunningAgent {
                pid,
                timeout: spawn_config.timeout,
                outcome_rx: Some(outcome_rx),
                kill_tx: Some(kill_tx),
            },
        );

        Ok(AgentProcessHandle {
            task_id: spawn_config.task_id,
            output: output_rx,
        })
    }

    async fn wait(&self, task_id: &str) -> Result<AgentOutcome, AgentProcessError> {
        let outcome_rx = {
            let mut running = self.running.lock();
            let agent = running
                .get_mut(task_id)
                .ok_or_else(|| AgentProcessError::NotFound(task_id.to_string()))?;
            agent.outcome_rx.take()
        };
        let outcome_rx = outcome_rx.ok_or_else(|| AgentProcessError::NotFound(task_id.to_string()))?;
        let outcome = outcome_rx
            .await
            .map_err(|_| AgentProcessError::NotFound(task_id.to_string()))?;
        self.running.lock().remove(task_id);
        Ok(outcome)
    }

    async fn kill(&self, task_id: &str, grace: Duration) -> Result<(), AgentProcessError> {
        let kill_tx = {
            let mut running = self.running.lock();
            running
                .get_mut(task_id)
                .and_then(|agent| agent.kill_tx.take())
        };
        match kill_tx {
            Some(tx) => {
                let _ = tx.send(grace);
                Ok(())
            }
            None => Err(AgentProcessError::NotFound(task_id.to_string())),
        }
    }
}

async fn stream_lines(tx: mpsc::Sender<AgentOutputLine>, reader: impl tokio::io::AsyncRead + Unpin, is_stderr: bool) {
    let mut lines = BufReader::new(reader).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if tx.send(AgentOutputLine { is_stderr, line }).await.is_err() {
                    break;
                }
            }
            Ok(None) => break,
            Err(e) => {
                tracing::warn!(error = %e, is_stderr, "agent output stream read error");
                break;
            }
        }
    }
}

/// Drives one child to completion: races its natural exit against the
/// task deadline and an explicit kill request, escalating SIGTERM ->
/// SIGKILL when either fires.
async fn supervise(
    mut child: Child,
    pid: u32,
    timeout: Duration,
    mut kill_rx: oneshot::Receiver<Duration>,
    outcome_tx: oneshot::Sender<AgentOutcome>,
) {
    let outcome = tokio::select! {
        status = child.wait() => {
            match status {
                Ok(status) => AgentOutcome::Exited { code: status.code().unwrap_or(-1) },
                Err(_) => AgentOutcome::Exited { code: -1 },
            }
        }
        _ = tokio::time::sleep(timeout) => {
            escalate(&mut child, pid, Duration::from_secs(10)).await;
            AgentOutcome::TimedOut
        }
        grace = &mut kill_rx => {
            escalate(&mut child, pid, grace.unwrap_or(Duration::from_secs(10))).await;
            AgentOutcome::Killed
        }
    };
    let _ = outcome_tx.send(outcome);
}

async fn escalate(child: &mut Child, pid: u32, grace: Duration) {
    send_signal("-TERM", pid);
    if tokio::time::timeout(grace, child.wait()).await.is_err() {
        send_signal("-KILL", pid);
        let _ = child.wait().await;
    }
}
