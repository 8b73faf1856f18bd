// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `list_pending_questions`, `answer_worker_question`,
//! `assign_task_to_waiting_worker`, `approve_session_end` (§6).

use super::{error_response, ListenCtx};
use crate::container::ContainerSpawner;
use crate::protocol::Response;
use cp_adapters::bus::Bus;
use cp_adapters::cache::Cache;
use cp_core::id::IdGen;
use cp_core::{Clock, Priority, QuestionId, WorkerId};
use cp_storage::Store;
use tracing::{info, warn};

/// Used when `assign_task_to_waiting_worker` has no explicit timeout to
/// carry forward; mirrors [`super::tasks`]'s default.
const DEFAULT_TASK_TIMEOUT_MS: u64 = 5 * 60 * 1000;

/// `filter`, when present, is matched against the asking Worker's id
/// (§6's wording leaves the filter's shape open; a Worker id is the one
/// field every Pending RPC carries that an operator would plausibly want
/// to narrow by).
pub async fn list_pending_questions<B, C, S, G, K, CS>(ctx: &ListenCtx<B, C, S, G, K, CS>, filter: Option<&str>) -> Response
where
    B: Bus,
    C: Cache,
    S: Store,
    G: IdGen,
    K: Clock,
    CS: ContainerSpawner,
{
    let pending = match ctx.runtime.rpc_broker.list_pending_questions().await {
        Ok(pending) => pending,
        Err(e) => return error_response(e),
    };
    let questions = pending
        .into_iter()
        .filter(|p| match filter {
            Some(worker_id) => p.worker_id.as_str() == worker_id,
            None => true,
        })
        .map(|p| serde_json::to_value(p).unwrap_or(serde_json::Value::Null))
        .collect();
    Response::PendingQuestions { questions }
}

pub async fn answer_worker_question<B, C, S, G, K, CS>(
    ctx: &ListenCtx<B, C, S, G, K, CS>,
    question_id: &str,
    answer: &str,
    guidance_type: Option<&str>,
) -> Response
where
    B: Bus,
    C: Cache,
    S: Store,
    G: IdGen,
    K: Clock,
    CS: ContainerSpawner,
{
    let now_ms = ctx.clock.epoch_ms();
    let question_id = QuestionId::new(question_id);
    match ctx.runtime.rpc_broker.answer_question(&question_id, answer, guidance_type, now_ms).await {
        Ok(found) => Response::QuestionAnswered { found },
        Err(e) => error_response(e),
    }
}

pub async fn assign_task_to_waiting_worker<B, C, S, G, K, CS>(
    ctx: &ListenCtx<B, C, S, G, K, CS>,
    worker_id: WorkerId,
    description: String,
    priority: Priority,
) -> Response
where
    B: Bus,
    C: Cache,
    S: Store,
    G: IdGen,
    K: Clock,
    CS: ContainerSpawner,
{
    let now_ms = ctx.clock.epoch_ms();
    let result = ctx
        .runtime
        .scheduler
        .assign_task(description, priority, Some(worker_id.clone()), DEFAULT_TASK_TIMEOUT_MS, None, now_ms)
        .await;
    let (task_id, worker_id) = match result {
        Ok(pair) => pair,
        Err(e) => return error_response(e),
    };
    if let Some(worker_id) = &worker_id {
        if let Err(e) = ctx.runtime.rpc_broker.take_next_task_request(worker_id).await {
            warn!(error = %e, worker_id = %worker_id, "failed to clear waiting-worker record after dispatch");
        }
    }
    Response::TaskAssigned { task_id, worker_id }
}

pub async fn approve_session_end<B, C, S, G, K, CS>(
    ctx: &ListenCtx<B, C, S, G, K, CS>,
    worker_id: WorkerId,
    approved: bool,
    reason: Option<String>,
    final_instructions: Option<String>,
) -> Response
where
    B: Bus,
    C: Cache,
    S: Store,
    G: IdGen,
    K: Clock,
    CS: ContainerSpawner,
{
    if let Some(reason) = &reason {
        info!(worker_id = %worker_id, reason, "operator decision on session-end request");
    }
    let now_ms = ctx.clock.epoch_ms();
    match ctx.runtime.rpc_broker.approve_session_end(&worker_id, approved, final_instructions.as_deref(), now_ms).await {
        Ok(found) => Response::SessionEndApproved { found },
        Err(e) => error_response(e),
    }
}

#[cfg(test)]
#[path = "questions_tests.rs"]
mod tests;
