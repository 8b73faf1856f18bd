// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Operator-surface dispatch (§6). A stdio process has exactly one
//! peer, so there is no accept loop here — `run_stdio` reads one
//! [`Request`] at a time from its reader and writes one [`Response`] at
//! a time to its writer, handing each request to the submodule that
//! owns its tool.

mod analytics;
mod broadcast;
mod questions;
mod tasks;
mod workers;

use crate::container::ContainerSpawner;
use crate::protocol::{self, Request, Response};
use cp_adapters::bus::Bus;
use cp_adapters::cache::Cache;
use cp_core::id::IdGen;
use cp_core::Clock;
use cp_manager_runtime::ManagerRuntime;
use cp_storage::Store;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Notify;
use tracing::{debug, info, warn};

/// Shared context every operator-tool handler reads from.
///
/// `bus` and `store` are direct handles onto the same adapters
/// [`ManagerRuntime`] was constructed with (cheap to clone — both traits
/// require it), kept here because the runtime's subsystems don't expose
/// raw bus publishes or entity lookups (`get_task`, `list_events`,
/// `get_session`) that a few operator tools need directly.
pub struct ListenCtx<B: Bus, C: Cache, S: Store, G: IdGen, K: Clock, CS: ContainerSpawner> {
    pub runtime: Arc<ManagerRuntime<B, C, S, G, K>>,
    pub bus: B,
    pub store: S,
    pub container_spawner: CS,
    pub clock: K,
    pub shutdown: Arc<Notify>,
}

#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error(transparent)]
    Protocol(#[from] protocol::ProtocolError),
}

/// Serves requests from `reader` until EOF or a `Shutdown` request,
/// writing one response per request to `writer`.
pub async fn run_stdio<B, C, S, G, K, CS, R, W>(
    ctx: Arc<ListenCtx<B, C, S, G, K, CS>>,
    reader: &mut R,
    writer: &mut W,
) -> Result<(), ConnectionError>
where
    B: Bus,
    C: Cache,
    S: Store,
    G: IdGen,
    K: Clock,
    CS: ContainerSpawner,
    R: tokio::io::AsyncBufReadExt + Unpin,
    W: tokio::io::AsyncWriteExt + Unpin,
{
    loop {
        let request = match protocol::read_request(reader).await? {
            Some(request) => request,
            None => return Ok(()),
        };
        if matches!(request, Request::Ping) {
            debug!(?request, "received request");
        } else {
            info!(?request, "received request");
        }

        let is_shutdown = matches!(request, Request::Shutdown);
        let response = handle_request(&ctx, request).await;
        protocol::write_response(writer, &response).await?;
        if is_shutdown {
            return Ok(());
        }
    }
}

async fn handle_request<B, C, S, G, K, CS>(ctx: &ListenCtx<B, C, S, G, K, CS>, request: Request) -> Response
where
    B: Bus,
    C: Cache,
    S: Store,
    G: IdGen,
    K: Clock,
    CS: ContainerSpawner,
{
    match request {
        Request::Ping => Response::Pong,
        Request::Shutdown => {
            ctx.shutdown.notify_one();
            Response::ShuttingDown
        }
        Request::ListWorkers { status_filter, include_stats } => {
            workers::list_workers(ctx, status_filter, include_stats).await
        }
        Request::GetWorkerStatus { worker_id } => workers::get_worker_status(ctx, &worker_id).await,
        Request::SpawnWorkerContainer { tags, max_tasks, max_memory_mb, name } => {
            workers::spawn_worker_container(ctx, tags, max_tasks, max_memory_mb, name).await
        }
        Request::AssignTask { description, priority, worker_id, timeout_ms } => {
            tasks::assign_task(ctx, description, priority, worker_id, timeout_ms).await
        }
        Request::GetTaskStatus { task_id, include_timeline } => tasks::get_task_status(ctx, &task_id, include_timeline).await,
        Request::MonitorTaskRealtime { task_id, duration_seconds } => {
            tasks::monitor_task_realtime(ctx, &task_id, duration_seconds).await
        }
        Request::ListPendingQuestions { filter } => questions::list_pending_questions(ctx, filter.as_deref()).await,
        Request::AnswerWorkerQuestion { question_id, answer, guidance_type } => {
            questions::answer_worker_question(ctx, &question_id, &answer, guidance_type.as_deref()).await
        }
        Request::AssignTaskToWaitingWorker { worker_id, description, priority } => {
            questions::assign_task_to_waiting_worker(ctx, worker_id, description, priority).await
        }
        Request::ApproveSessionEnd { worker_id, approved, reason, final_instructions } => {
            questions::approve_session_end(ctx, worker_id, approved, reason, final_instructions).await
        }
        Request::Broadcast { message, target_session_ids } => broadcast::broadcast(ctx, message, target_session_ids).await,
        Request::GetWorkerAnalytics { time_range } => analytics::get_worker_analytics(ctx, time_range).await,
    }
}

/// Uniform `{success: false, error}` carrier (§7).
pub(crate) fn error_response(message: impl std::fmt::Display) -> Response {
    warn!(error = %message, "operator request failed");
    Response::Error { error: message.to_string() }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
