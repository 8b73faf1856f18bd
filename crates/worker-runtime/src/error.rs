// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error taxonomy for the Worker runtime (§10.4).

use cp_adapters::agent::AgentProcessError;
use cp_core::AdapterError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkerRuntimeError {
    #[error(transparent)]
    Adapter(#[from] AdapterError),

    #[error(transparent)]
    AgentProcess(#[from] AgentProcessError),

    #[error("task {0} not found among active tasks")]
    TaskNotFound(String),

    #[error("malformed message on {subject}: {reason}")]
    Malformed { subject: String, reason: String },
}
