// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Interactive RPC broker (§4.3.3): the three symmetric Worker-initiated
//! flows (question, next-task request, session-end request), each
//! resolved exactly once — by operator action, by timeout, or by Manager
//! shutdown.

use crate::config::ManagerRuntimeConfig;
use crate::error::RpcBrokerError;
use cp_adapters::bus::Bus;
use cp_adapters::cache::Cache;
use cp_core::{PendingRpc, PendingRpcKind, QuestionId, Session, SessionId, WorkerId};
use cp_storage::store::QuestionRow;
use cp_storage::Store;
use parking_lot::Mutex;
use std::collections::HashMap;

const PENDING_QUESTIONS_KEY: &str = "pending_questions";
const NEXT_TASK_REQUESTS_KEY: &str = "next_task_requests";
const END_SESSION_REQUESTS_KEY: &str = "end_session_requests";

/// Reply transport handles, kept in-process only (never persisted — §3,
/// §9 "blocking wait-for-reply" note). Bounded by the number of
/// in-flight RPCs; every entry is removed the moment its RPC resolves.
#[derive(Default)]
struct ReplyHandles {
    questions: HashMap<QuestionId, String>,
    /// `(reply_to, session_id)` — the session id is needed again at
    /// approval time to close the durable row (§3).
    end_session: HashMap<WorkerId, (String, String)>,
}

pub struct RpcBroker<B: Bus, C: Cache, S: Store> {
    bus: B,
    cache: C,
    store: S,
    config: ManagerRuntimeConfig,
    handles: Mutex<ReplyHandles>,
}

impl<B: Bus, C: Cache, S: Store> RpcBroker<B, C, S> {
    pub fn new(bus: B, cache: C, store: S, config: ManagerRuntimeConfig) -> Self {
        Self {
            bus,
            cache,
            store,
            config,
            handles: Mutex::new(ReplyHandles::default()),
        }
    }

    /// A Worker's question arrives with an inline reply address.
    pub async fn submit_question(
        &self,
        question_id: QuestionId,
        worker_id: WorkerId,
        session_id: Option<String>,
        question: String,
        question_type: Option<String>,
        context: serde_json::Value,
        reply_to: String,
        now_ms: u64,
    ) -> Result<(), RpcBrokerError> {
        let pending = PendingRpc {
            question_id: question_id.clone(),
            kind: PendingRpcKind::Question,
            worker_id: worker_id.clone(),
            session_id: session_id.clone(),
            payload: serde_json::json!({ "question": question, "question_type": question_type, "context": context }),
            received_at_ms: now_ms,
            deadline_ms: now_ms + self.config.question_deadline.as_millis() as u64,
        };
        self.cache
            .hset(PENDING_QUESTIONS_KEY, question_id.as_str(), encode(&pending)?)
            .await?;
        self.store
            .upsert_question(&QuestionRow {
                question_id: question_id.as_str().to_string(),
                worker_id: worker_id.as_str().to_string(),
                question,
                question_type,
                context: pending.payload.clone(),
                asked_at_ms: now_ms,
                answer: None,
                answered_by: None,
                answered_at_ms: None,
            })
            .await?;
        self.handles.lock().questions.insert(question_id, reply_to);
        Ok(())
    }

    pub async fn list_pending_questions(&self) -> Result<Vec<PendingRpc>, RpcBrokerError> {
        let entries = self.cache.hgetall(PENDING_QUESTIONS_KEY).await?;
        entries.into_iter().map(|(_, bytes)| decode(&bytes)).collect()
    }

    /// Operator `answer(question_id, payload)`. Replying on a stale handle
    /// (timeout already fired) is a no-op: returns `Ok(false)`.
    pub async fn answer_question(
        &self,
        question_id: &QuestionId,
        answer: &str,
        guidance_type: Option<&str>,
        now_ms: u64,
    ) -> Result<bool, RpcBrokerError> {
        let reply_to = match self.handles.lock().questions.remove(question_id) {
            Some(handle) => handle,
            None => return Ok(false),
        };
        self.resolve_question(question_id, &reply_to, answer, "manager", guidance_type, now_ms)
            .await?;
        Ok(true)
    }

    /// Called periodically by the Manager's timer loop: fires a
    /// synthesized reply for every question past its deadline.
    pub async fn expire_questions(&self, now_ms: u64) -> Result<usize, RpcBrokerError> {
        let mut expired = 0;
        for pending in self.list_pending_questions().await? {
            if !pending.is_expired(now_ms) {
                continue;
            }
            let reply_to = self.handles.lock().questions.remove(&pending.question_id);
            if let Some(reply_to) = reply_to {
                self.resolve_question(
                    &pending.question_id,
                    &reply_to,
                    "",
                    "system",
                    Some("timeout"),
                    now_ms,
                )
                .await?;
                expired += 1;
            } else {
                // Handle already gone (answered concurrently); just drop the
                // stale cache/store bookkeeping.
                self.cache.hdel(PENDING_QUESTIONS_KEY, pending.question_id.as_str()).await?;
            }
        }
        Ok(expired)
    }

    async fn resolve_question(
        &self,
        question_id: &QuestionId,
        reply_to: &str,
        answer: &str,
        answered_by: &str,
        guidance_type: Option<&str>,
        now_ms: u64,
    ) -> Result<(), RpcBrokerError> {
        let payload = serde_json::json!({
            "answer": answer,
            "guidance_type": guidance_type,
            "answered_by": answered_by,
        });
        let bytes = serde_json::to_vec(&payload).map_err(|e| RpcBrokerError::Malformed(e.to_string()))?;
        self.bus.reply(reply_to, bytes).await?;
        self.store
            .answer_question(question_id.as_str(), answer, answered_by, now_ms)
            .await?;
        self.cache.hdel(PENDING_QUESTIONS_KEY, question_id.as_str()).await?;
        Ok(())
    }

    /// A Worker asks for its next task. Acknowledged immediately with
    /// `status=waiting` so the Worker never blocks on this RPC; the
    /// Scheduler later consults [`Self::take_next_task_request`].
    pub async fn submit_next_task_request(
        &self,
        worker_id: &WorkerId,
        requested_at_ms: u64,
        reply_to: &str,
    ) -> Result<(), RpcBrokerError> {
        let ack = serde_json::json!({ "status": "waiting" });
        let bytes = serde_json::to_vec(&ack).map_err(|e| RpcBrokerError::Malformed(e.to_string()))?;
        self.bus.reply(reply_to, bytes).await?;
        let record = serde_json::json!({ "requested_at_ms": requested_at_ms });
        let encoded = serde_json::to_vec(&record).map_err(|e| RpcBrokerError::Malformed(e.to_string()))?;
        self.cache.hset(NEXT_TASK_REQUESTS_KEY, worker_id.as_str(), encoded).await?;
        Ok(())
    }

    pub async fn waiting_workers(&self) -> Result<Vec<WorkerId>, RpcBrokerError> {
        let entries = self.cache.hgetall(NEXT_TASK_REQUESTS_KEY).await?;
        Ok(entries.into_iter().map(|(worker_id, _)| WorkerId::new(worker_id)).collect())
    }

    pub async fn take_next_task_request(&self, worker_id: &WorkerId) -> Result<(), RpcBrokerError> {
        self.cache.hdel(NEXT_TASK_REQUESTS_KEY, worker_id.as_str()).await?;
        Ok(())
    }

    /// A Worker proposes ending its session. Opens the durable session
    /// row if this is the first time it's been seen (§3 "opened on
    /// interactive spawn" — nothing upstream of this RPC currently opens
    /// one, so the end-session request is the backstop that guarantees a
    /// row exists before approval can close it).
    pub async fn submit_end_session_request(
        &self,
        worker_id: WorkerId,
        session_id: String,
        reason: Option<String>,
        requested_at_ms: u64,
        reply_to: String,
    ) -> Result<(), RpcBrokerError> {
        if self.store.get_session(&session_id).await?.is_none() {
            let session = Session::open(SessionId::new(session_id.clone()), worker_id.clone(), requested_at_ms);
            self.store.upsert_session(&session).await?;
        }
        let record = serde_json::json!({ "session_id": session_id, "reason": reason, "requested_at_ms": requested_at_ms });
        let encoded = serde_json::to_vec(&record).map_err(|e| RpcBrokerError::Malformed(e.to_string()))?;
        self.cache.hset(END_SESSION_REQUESTS_KEY, worker_id.as_str(), encoded).await?;
        self.handles.lock().end_session.insert(worker_id, (reply_to, session_id));
        Ok(())
    }

    /// Operator `approve(worker_id, approved, reason, final_instructions)`.
    /// On `approved = true`, closes the durable session row (§3, §4.3.3).
    pub async fn approve_session_end(
        &self,
        worker_id: &WorkerId,
        approved: bool,
        final_instructions: Option<&str>,
        now_ms: u64,
    ) -> Result<bool, RpcBrokerError> {
        let (reply_to, session_id) = match self.handles.lock().end_session.remove(worker_id) {
            Some(handle) => handle,
            None => return Ok(false),
        };
        if approved {
            if let Some(mut session) = self.store.get_session(&session_id).await? {
                session.close(now_ms);
                self.store.upsert_session(&session).await?;
            }
        }
        let payload = serde_json::json!({ "approved": approved, "final_instructions": final_instructions });
        let bytes = serde_json::to_vec(&payload).map_err(|e| RpcBrokerError::Malformed(e.to_string()))?;
        self.bus.reply(&reply_to, bytes).await?;
        self.cache.hdel(END_SESSION_REQUESTS_KEY, worker_id.as_str()).await?;
        Ok(true)
    }

    /// Graceful Manager shutdown (§10.6): every outstanding handle gets a
    /// synthesized `shutdown` response before the process exits.
    pub async fn shutdown(&self) -> Result<(), RpcBrokerError> {
        let (questions, end_session) = {
            let mut handles = self.handles.lock();
            (std::mem::take(&mut handles.questions), std::mem::take(&mut handles.end_session))
        };
        let payload = serde_json::to_vec(&serde_json::json!({ "status": "shutdown" }))
            .map_err(|e| RpcBrokerError::Malformed(e.to_string()))?;
        for (question_id, reply_to) in questions {
            self.bus.reply(&reply_to, payload.clone()).await?;
            self.cache.hdel(PENDING_QUESTIONS_KEY, question_id.as_str()).await?;
        }
        for (worker_id, (reply_to, _session_id)) in end_session {
            self.bus.reply(&reply_to, payload.clone()).await?;
            self.cache.hdel(END_SESSION_REQUESTS_KEY, worker_id.as_str()).await?;
        }
        Ok(())
    }
}

fn encode(pending: &PendingRpc) -> Result<Vec<u8>, RpcBrokerError> {
    serde_json::to_vec(pending).map_err(|e| RpcBrokerError::Malformed(e.to_string()))
}

fn decode(bytes: &[u8]) -> Result<PendingRpc, RpcBrokerError> {
    serde_json::from_slice(bytes).map_err(|e| RpcBrokerError::Malformed(e.to_string()))
}

#[cfg(test)]
#[path = "rpc_broker_tests.rs"]
mod tests;
