// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tunables for the Worker event loop (§10.2). Every interval named in
//! §4.2 is a field here, never a hardcoded constant.

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct WorkerRuntimeConfig {
    pub heartbeat_interval: Duration,
    pub progress_report_interval: Duration,
    pub shutdown_deadline: Duration,
    /// Timeout for the registration request-reply round trip.
    pub registration_ack_timeout: Duration,
    /// TTL on the `task:<id>:claimed` cache key (§9 Open Question:
    /// unified with `timeout_ms` rather than the source's bare 60 s).
    pub claim_grace: Duration,
    /// SIGTERM -> SIGKILL escalation window used on forced termination.
    pub kill_grace: Duration,
}

impl Default for WorkerRuntimeConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(10),
            progress_report_interval: Duration::from_secs(5),
            shutdown_deadline: Duration::from_secs(30),
            registration_ack_timeout: Duration::from_secs(10),
            claim_grace: Duration::from_secs(60),
            kill_grace: Duration::from_secs(10),
        }
    }
}
