// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tunables for the Manager control plane subsystems (§10.2). Every
//! interval or deadline named in §1-9 is a field here, never a hardcoded
//! constant.

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ManagerRuntimeConfig {
    pub health_check_interval: Duration,
    pub worker_timeout: Duration,
    pub offline_grace: Duration,
    pub dispatch_ack_deadline: Duration,
    pub retry_limit: u32,
    pub question_deadline: Duration,
    pub bus_reply_timeout: Duration,
    pub shutdown_deadline: Duration,
    pub durable_buffer_limit: usize,
    /// TTL for the `task:<id>:progress` and `task:<id>:timeline` cache
    /// projections (§6).
    pub progress_cache_ttl: Duration,
    /// Bound on `task:<id>:timeline`'s length; older entries fall off.
    pub timeline_max_len: i64,
}

impl Default for ManagerRuntimeConfig {
    fn default() -> Self {
        Self {
            health_check_interval: Duration::from_secs(10),
            worker_timeout: Duration::from_secs(30),
            offline_grace: Duration::from_secs(60),
            dispatch_ack_deadline: Duration::from_secs(15),
            retry_limit: 3,
            question_deadline: Duration::from_secs(29),
            bus_reply_timeout: Duration::from_secs(30),
            shutdown_deadline: Duration::from_secs(30),
            durable_buffer_limit: 1_000,
            progress_cache_ttl: Duration::from_secs(3_600),
            timeline_max_len: 200,
        }
    }
}
