// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker entity: identity, capabilities, and lifecycle status (§3).

use crate::id::WorkerId;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Lifecycle status of a Worker.
///
/// Transitions: `Initializing -> Idle -> Busy <-> Idle -> Offline`
/// (graceful) or `-> Unresponsive` (heartbeat timeout) `-> Offline`
/// (after the offline grace period). A Worker never re-enters
/// `Initializing` once registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerStatus {
    Initializing,
    Idle,
    Busy,
    Offline,
    Unresponsive,
}

impl WorkerStatus {
    /// Whether the registry sweeper should consider this Worker a
    /// dispatch candidate.
    pub fn is_live(&self) -> bool {
        matches!(self, WorkerStatus::Idle | WorkerStatus::Busy)
    }
}

impl std::fmt::Display for WorkerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            WorkerStatus::Initializing => "initializing",
            WorkerStatus::Idle => "idle",
            WorkerStatus::Busy => "busy",
            WorkerStatus::Offline => "offline",
            WorkerStatus::Unresponsive => "unresponsive",
        };
        write!(f, "{s}")
    }
}

/// Declared capacity and feature tags a Worker registers with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerCapabilities {
    pub max_concurrent_tasks: u32,
    pub max_memory_mb: u32,
    #[serde(default)]
    pub feature_tags: HashSet<String>,
}

impl WorkerCapabilities {
    /// Whether this Worker satisfies the capability tags a task requires.
    pub fn satisfies(&self, required_tags: &HashSet<String>) -> bool {
        required_tags.is_subset(&self.feature_tags)
    }
}

/// Point-in-time host snapshot attached at registration and heartbeat.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkerSystemInfo {
    #[serde(default)]
    pub os: String,
    #[serde(default)]
    pub cpu_count: u32,
    #[serde(default)]
    pub total_memory_mb: u32,
}

/// Authoritative Worker record (§3, `workers` table + cache projection).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerRecord {
    pub worker_id: WorkerId,
    pub hostname: String,
    #[serde(default)]
    pub tags: HashSet<String>,
    pub capabilities: WorkerCapabilities,
    #[serde(default)]
    pub system_info: WorkerSystemInfo,
    pub status: WorkerStatus,
    pub registered_at_ms: u64,
    pub last_heartbeat_ms: u64,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    /// Number of tasks the Worker reported as currently active in its
    /// last heartbeat or registration. Used by the scheduler's ranking
    /// step without a second round-trip to the Worker.
    #[serde(default)]
    pub current_load: u32,
}

impl WorkerRecord {
    /// Merge rule for registry reconciliation: cache wins if its
    /// `last_heartbeat_ms` is newer, else the store wins. Ties (equal
    /// timestamps) prefer `other` since it is assumed to be the more
    /// recently read side in the caller's merge order.
    pub fn merge_preferring_newer_heartbeat(self, other: WorkerRecord) -> WorkerRecord {
        if other.last_heartbeat_ms >= self.last_heartbeat_ms {
            other
        } else {
            self
        }
    }

    pub fn is_dispatch_candidate(&self, required_tags: &HashSet<String>) -> bool {
        self.status == WorkerStatus::Idle
            && self.current_load < self.capabilities.max_concurrent_tasks
            && self.capabilities.satisfies(required_tags)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(heartbeat_ms: u64) -> WorkerRecord {
        WorkerRecord {
            worker_id: WorkerId::new("w1"),
            hostname: "host".into(),
            tags: HashSet::new(),
            capabilities: WorkerCapabilities {
                max_concurrent_tasks: 2,
                max_memory_mb: 1024,
                feature_tags: HashSet::new(),
            },
            system_info: WorkerSystemInfo::default(),
            status: WorkerStatus::Idle,
            registered_at_ms: 0,
            last_heartbeat_ms: heartbeat_ms,
            metadata: HashMap::new(),
            current_load: 0,
        }
    }

    #[test]
    fn merge_prefers_newer_heartbeat() {
        let cache = record(100);
        let store = record(50);
        let merged = store.merge_preferring_newer_heartbeat(cache);
        assert_eq!(merged.last_heartbeat_ms, 100);
    }

    #[test]
    fn merge_prefers_store_when_cache_is_stale() {
        let cache = record(10);
        let store = record(50);
        let merged = cache.merge_preferring_newer_heartbeat(store);
        assert_eq!(merged.last_heartbeat_ms, 50);
    }

    #[test]
    fn capability_subset_check() {
        let mut caps = WorkerCapabilities {
            max_concurrent_tasks: 1,
            max_memory_mb: 512,
            feature_tags: HashSet::new(),
        };
        caps.feature_tags.insert("browser".to_string());
        let mut required = HashSet::new();
        required.insert("browser".to_string());
        assert!(caps.satisfies(&required));
        required.insert("gpu".to_string());
        assert!(!caps.satisfies(&required));
    }
}
