// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized Bus subject construction (§6, §9).
//!
//! Every subject string in the system is built by one of these functions.
//! Nothing outside this module should format a subject by hand, so a
//! typo'd literal becomes a compile error at the call site instead of a
//! silent routing bug at runtime.

use crate::id::{TaskId, WorkerId};

pub const WORKER_REGISTER: &str = "remote.worker.register";
pub const WORKER_HEARTBEAT: &str = "remote.worker.heartbeat";
pub const TASK_COMPLETION: &str = "task.completion";

pub fn worker_task(worker_id: &WorkerId) -> String {
    format!("worker.task.{worker_id}")
}

pub fn task_rejected(task_id: &TaskId) -> String {
    format!("task.rejected.{task_id}")
}

pub fn task_progress(task_id: &TaskId) -> String {
    format!("task.progress.{task_id}")
}

pub fn worker_progress_realtime(worker_id: &WorkerId) -> String {
    format!("worker.progress.realtime.{worker_id}")
}

pub fn task_event(event_type: &str) -> String {
    format!("task.event.{event_type}")
}

pub fn task_event_wildcard() -> &'static str {
    "task.event.*"
}

pub fn manager_question(worker_id: &WorkerId) -> String {
    format!("manager.question.{worker_id}")
}

pub fn manager_next_task(worker_id: &WorkerId) -> String {
    format!("manager.next_task.{worker_id}")
}

pub fn manager_end_session(worker_id: &WorkerId) -> String {
    format!("manager.end_session.{worker_id}")
}

/// `worker_id` of `"all"` addresses every subscribed Worker.
pub fn worker_broadcast(worker_id: &str) -> String {
    format!("worker.broadcast.{worker_id}")
}

pub fn worker_broadcast_all() -> String {
    worker_broadcast("all")
}

pub fn worker_command(worker_id: &WorkerId) -> String {
    format!("worker.command.{worker_id}")
}

/// Wildcard subjects the Manager's progress/analytics ingestor subscribes
/// to (§4.3.4): one segment wildcarded to catch every Worker or Task.
pub fn ingestor_wildcards() -> [&'static str; 7] {
    [
        "task.progress.*",
        "worker.progress.realtime.*",
        "task.event.*",
        "task.completion",
        "manager.question.*",
        "manager.next_task.*",
        "manager.end_session.*",
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn worker_scoped_subjects_embed_the_worker_id() {
        let worker_id = WorkerId::new("w1");
        assert_eq!(worker_task(&worker_id), "worker.task.w1");
        assert_eq!(worker_command(&worker_id), "worker.command.w1");
        assert_eq!(manager_question(&worker_id), "manager.question.w1");
    }

    #[test]
    fn task_scoped_subjects_embed_the_task_id() {
        let task_id = TaskId::new("t1");
        assert_eq!(task_rejected(&task_id), "task.rejected.t1");
        assert_eq!(task_progress(&task_id), "task.progress.t1");
    }

    #[test]
    fn broadcast_all_targets_the_all_keyword() {
        assert_eq!(worker_broadcast_all(), "worker.broadcast.all");
    }
}
