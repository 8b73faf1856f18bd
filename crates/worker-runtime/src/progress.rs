// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Output-marker parsing and progress estimation (§4.2 "Execution").
//!
//! The external agent is opaque; the Worker only ever reads its stdout
//! and stderr lines looking for a handful of observable keywords. This
//! is heuristic by nature — it never rejects a line it doesn't
//! recognize, it just doesn't count it.

use serde::Serialize;

/// Per-task counters accumulated from parsed output lines, reported as
/// the `metrics` field of a progress message (§6, opaque JSON blob).
#[derive(Debug, Clone, Default, Serialize)]
pub struct TaskCounters {
    pub tool_calls: u32,
    pub navigations: u32,
    pub screenshots: u32,
    pub errors: u32,
}

impl TaskCounters {
    /// Folds one output line's observable markers into the running
    /// counters. `is_stderr` lines always count as an error regardless of
    /// content, since a well-behaved agent writes diagnostics there.
    pub fn record_line(&mut self, line: &str, is_stderr: bool) {
        if is_stderr {
            self.errors += 1;
            return;
        }
        let lower = line.to_ascii_lowercase();
        if lower.contains("error") {
            self.errors += 1;
        }
        if lower.contains("tool:") || lower.contains("tool_call") {
            self.tool_calls += 1;
        }
        if lower.contains("navigate") || lower.contains("page:") {
            self.navigations += 1;
        }
        if lower.contains("screenshot") {
            self.screenshots += 1;
        }
    }

    pub fn to_metrics(&self) -> serde_json::Value {
        serde_json::json!({
            "tool_calls": self.tool_calls,
            "navigations": self.navigations,
            "screenshots": self.screenshots,
            "errors": self.errors,
        })
    }
}

/// A monotonic, never-complete-until-terminal estimate (§8 invariant:
/// `percent_complete` is non-decreasing until the terminal event). Caps
/// at 99 so the only way a Task reports 100 is the terminal completion
/// message itself.
pub fn estimate_percent_complete(elapsed_ms: u64, timeout_ms: u64) -> u8 {
    if timeout_ms == 0 {
        return 99;
    }
    let ratio = (elapsed_ms.saturating_mul(99)) / timeout_ms;
    ratio.min(99) as u8
}
