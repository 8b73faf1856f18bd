// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session entity: an optional grouping of Tasks under one long-lived
//! Worker run (§3).

use crate::id::{SessionId, WorkerId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Open,
    Closed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub session_id: SessionId,
    pub worker_id: WorkerId,
    pub started_at_ms: u64,
    #[serde(default)]
    pub ended_at_ms: Option<u64>,
    #[serde(default)]
    pub tasks_completed: u32,
    pub status: SessionStatus,
}

impl Session {
    pub fn open(session_id: SessionId, worker_id: WorkerId, started_at_ms: u64) -> Self {
        Self {
            session_id,
            worker_id,
            started_at_ms,
            ended_at_ms: None,
            tasks_completed: 0,
            status: SessionStatus::Open,
        }
    }

    pub fn close(&mut self, ended_at_ms: u64) {
        self.ended_at_ms = Some(ended_at_ms);
        self.status = SessionStatus::Closed;
    }
}
