// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-subsystem error types for the Manager control plane (§10.4).

use cp_core::AdapterError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("adapter error: {0}")]
    Adapter(#[from] AdapterError),
    #[error("worker not found: {0}")]
    WorkerNotFound(String),
}

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("adapter error: {0}")]
    Adapter(#[from] AdapterError),
    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),
    #[error("task not found: {0}")]
    TaskNotFound(String),
    #[error("no worker available for task {0}")]
    NoWorkerAvailable(String),
    #[error("serialization error: {0}")]
    Serialization(String),
}

#[derive(Debug, Error)]
pub enum RpcBrokerError {
    #[error("adapter error: {0}")]
    Adapter(#[from] AdapterError),
    #[error("pending rpc not found: {0}")]
    NotFound(String),
    #[error("malformed rpc payload: {0}")]
    Malformed(String),
}

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("adapter error: {0}")]
    Adapter(#[from] AdapterError),
    #[error("malformed message on {subject}: {reason}")]
    Malformed { subject: String, reason: String },
}
