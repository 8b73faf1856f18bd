// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Postgres-backed `Store` implementation.

use crate::error::classify;
use crate::store::{EventRow, QuestionRow, Store};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use cp_core::{
    AdapterError, Priority, ProgressRecord, Session, SessionId, SessionStatus, Task, TaskId, TaskStatus,
    WorkerCapabilities, WorkerId, WorkerRecord, WorkerStatus, WorkerSystemInfo,
};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use std::collections::{HashMap, HashSet};
use std::time::Duration;

fn ms_to_dt(ms: u64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(ms as i64).single().unwrap_or_else(Utc::now)
}

fn dt_to_ms(dt: DateTime<Utc>) -> u64 {
    dt.timestamp_millis().max(0) as u64
}

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, AdapterError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(10))
            .connect(url)
            .await
            .map_err(|e| classify("connect", e))?;
        Ok(Self { pool })
    }

    pub async fn run_migrations(&self) -> Result<(), AdapterError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AdapterError::unavailable(format!("migrate: {e}")))
    }

    fn worker_status_str(status: WorkerStatus) -> &'static str {
        match status {
            WorkerStatus::Initializing => "initializing",
            WorkerStatus::Idle => "idle",
            WorkerStatus::Busy => "busy",
            WorkerStatus::Offline => "offline",
            WorkerStatus::Unresponsive => "unresponsive",
        }
    }

    fn parse_worker_status(s: &str) -> WorkerStatus {
        match s {
            "idle" => WorkerStatus::Idle,
            "busy" => WorkerStatus::Busy,
            "offline" => WorkerStatus::Offline,
            "unresponsive" => WorkerStatus::Unresponsive,
            _ => WorkerStatus::Initializing,
        }
    }

    fn task_status_str(status: TaskStatus) -> &'static str {
        match status {
            TaskStatus::Pending => "pending",
            TaskStatus::Assigned => "assigned",
            TaskStatus::Running => "running",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
            TaskStatus::Rejected => "rejected",
            TaskStatus::Timeout => "timeout",
        }
    }

    fn parse_task_status(s: &str) -> TaskStatus {
        match s {
            "assigned" => TaskStatus::Assigned,
            "running" => TaskStatus::Running,
            "completed" => TaskStatus::Completed,
            "failed" => TaskStatus::Failed,
            "rejected" => TaskStatus::Rejected,
            "timeout" => TaskStatus::Timeout,
            _ => TaskStatus::Pending,
        }
    }

    fn priority_str(priority: Priority) -> &'static str {
        match priority {
            Priority::Low => "low",
            Priority::Normal => "normal",
            Priority::High => "high",
            Priority::Urgent => "urgent",
        }
    }

    fn parse_priority(s: &str) -> Priority {
        match s {
            "low" => Priority::Low,
            "high" => Priority::High,
            "urgent" => Priority::Urgent,
            _ => Priority::Normal,
        }
    }
}

#[async_trait]
impl Store for PgStore {
    async fn upsert_worker(&self, worker: &WorkerRecord) -> Result<(), AdapterError> {
        let tags: Vec<&String> = worker.tags.iter().collect();
        sqlx::query(
            r#"
            INSERT INTO workers (worker_id, hostname, status, capabilities, system_info, tags, metadata, current_load, registered_at, last_heartbeat, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, now())
            ON CONFLICT (worker_id) DO UPDATE SET
                hostname = EXCLUDED.hostname,
                status = EXCLUDED.status,
                capabilities = EXCLUDED.capabilities,
                system_info = EXCLUDED.system_info,
                tags = EXCLUDED.tags,
                metadata = EXCLUDED.metadata,
                current_load = EXCLUDED.current_load,
                last_heartbeat = GREATEST(workers.last_heartbeat, EXCLUDED.last_heartbeat),
                updated_at = now()
            "#,
        )
        .bind(worker.worker_id.as_str())
        .bind(&worker.hostname)
        .bind(Self::worker_status_str(worker.status))
        .bind(serde_json::to_value(&worker.capabilities).unwrap_or_default())
        .bind(serde_json::to_value(&worker.system_info).unwrap_or_default())
        .bind(serde_json::to_value(tags).unwrap_or_default())
        .bind(serde_json::to_value(&worker.metadata).unwrap_or_default())
        .bind(worker.current_load as i32)
        .bind(ms_to_dt(worker.registered_at_ms))
        .bind(ms_to_dt(worker.last_heartbeat_ms))
        .execute(&self.pool)
        .await
        .map_err(|e| classify("upsert_worker", e))?;
        Ok(())
    }

    async fn get_worker(&self, worker_id: &str) -> Result<Option<WorkerRecord>, AdapterError> {
        let row = sqlx::query("SELECT * FROM workers WHERE worker_id = $1")
            .bind(worker_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| classify("get_worker", e))?;
        Ok(row.map(|r| row_to_worker(&r)))
    }

    async fn list_workers(&self) -> Result<Vec<WorkerRecord>, AdapterError> {
        let rows = sqlx::query("SELECT * FROM workers")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| classify("list_workers", e))?;
        Ok(rows.iter().map(row_to_worker).collect())
    }

    async fn upsert_task(&self, task: &Task) -> Result<(), AdapterError> {
        sqlx::query(
            r#"
            INSERT INTO tasks (task_id, description, status, priority, assigned_worker, session_id, created_at, started_at, completed_at, execution_time_ms, timeout_ms, retry_count, error_message, result_blob, analytics, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, now())
            ON CONFLICT (task_id) DO UPDATE SET
                status = EXCLUDED.status,
                assigned_worker = EXCLUDED.assigned_worker,
                started_at = EXCLUDED.started_at,
                completed_at = EXCLUDED.completed_at,
                execution_time_ms = EXCLUDED.execution_time_ms,
                retry_count = EXCLUDED.retry_count,
                error_message = EXCLUDED.error_message,
                result_blob = EXCLUDED.result_blob,
                analytics = EXCLUDED.analytics,
                updated_at = now()
            "#,
        )
        .bind(task.task_id.as_str())
        .bind(&task.description)
        .bind(Self::task_status_str(task.status))
        .bind(Self::priority_str(task.priority))
        .bind(task.assigned_worker.as_ref().map(|w| w.as_str().to_string()))
        .bind(task.session_id.clone())
        .bind(ms_to_dt(task.created_at_ms))
        .bind(task.started_at_ms.map(ms_to_dt))
        .bind(task.completed_at_ms.map(ms_to_dt))
        .bind(task.completed_at_ms.zip(task.started_at_ms).map(|(c, s)| (c.saturating_sub(s)) as i64))
        .bind(task.timeout_ms as i64)
        .bind(task.retry_count as i32)
        .bind(task.error_message.clone())
        .bind(task.result_blob.clone())
        .bind(task.analytics.clone())
        .execute(&self.pool)
        .await
        .map_err(|e| classify("upsert_task", e))?;
        Ok(())
    }

    async fn get_task(&self, task_id: &str) -> Result<Option<Task>, AdapterError> {
        let row = sqlx::query("SELECT * FROM tasks WHERE task_id = $1")
            .bind(task_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| classify("get_task", e))?;
        Ok(row.map(|r| row_to_task(&r)))
    }

    async fn list_pending_tasks(&self) -> Result<Vec<Task>, AdapterError> {
        let rows = sqlx::query("SELECT * FROM tasks WHERE status = 'pending' ORDER BY created_at ASC")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| classify("list_pending_tasks", e))?;
        Ok(rows.iter().map(row_to_task).collect())
    }

    async fn list_active_tasks_for_worker(&self, worker_id: &str) -> Result<Vec<Task>, AdapterError> {
        let rows = sqlx::query(
            "SELECT * FROM tasks WHERE assigned_worker = $1 AND status IN ('assigned', 'running') ORDER BY created_at ASC",
        )
        .bind(worker_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| classify("list_active_tasks_for_worker", e))?;
        Ok(rows.iter().map(row_to_task).collect())
    }

    async fn append_progress(&self, record: &ProgressRecord) -> Result<(), AdapterError> {
        sqlx::query(
            "INSERT INTO task_progress (task_id, worker_id, phase, percent_complete, metrics, timestamp) VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(record.task_id.as_str())
        .bind(record.worker_id.as_str())
        .bind(record.phase.clone())
        .bind(record.percent_complete as i16)
        .bind(record.metrics.clone())
        .bind(ms_to_dt(record.reported_at_ms))
        .execute(&self.pool)
        .await
        .map_err(|e| classify("append_progress", e))?;
        Ok(())
    }

    async fn list_progress(&self, task_id: &str) -> Result<Vec<ProgressRecord>, AdapterError> {
        let rows = sqlx::query("SELECT * FROM task_progress WHERE task_id = $1 ORDER BY id ASC")
            .bind(task_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| classify("list_progress", e))?;
        rows.iter()
            .map(|r| -> Result<ProgressRecord, AdapterError> {
                Ok(ProgressRecord {
                    task_id: TaskId::new(r.try_get::<String, _>("task_id").map_err(|e| classify("list_progress", e))?),
                    worker_id: WorkerId::new(r.try_get::<String, _>("worker_id").map_err(|e| classify("list_progress", e))?),
                    phase: r.try_get("phase").ok(),
                    percent_complete: r.try_get::<i16, _>("percent_complete").unwrap_or(0) as u8,
                    metrics: r.try_get("metrics").unwrap_or(serde_json::Value::Null),
                    reported_at_ms: dt_to_ms(r.try_get("timestamp").map_err(|e| classify("list_progress", e))?),
                })
            })
            .collect()
    }

    async fn append_event(&self, event: &EventRow) -> Result<(), AdapterError> {
        sqlx::query("INSERT INTO events (worker_id, event_type, event_data, timestamp) VALUES ($1, $2, $3, $4)")
            .bind(&event.worker_id)
            .bind(&event.event_type)
            .bind(event.event_data.clone())
            .bind(ms_to_dt(event.timestamp_ms))
            .execute(&self.pool)
            .await
            .map_err(|e| classify("append_event", e))?;
        Ok(())
    }

    async fn list_events(&self, worker_id: &str, limit: i64) -> Result<Vec<EventRow>, AdapterError> {
        let rows = sqlx::query("SELECT * FROM events WHERE worker_id = $1 ORDER BY id DESC LIMIT $2")
            .bind(worker_id)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| classify("list_events", e))?;
        rows.iter()
            .map(|r| -> Result<EventRow, AdapterError> {
                Ok(EventRow {
                    worker_id: r.try_get("worker_id").map_err(|e| classify("list_events", e))?,
                    event_type: r.try_get("event_type").map_err(|e| classify("list_events", e))?,
                    event_data: r.try_get("event_data").unwrap_or(serde_json::Value::Null),
                    timestamp_ms: dt_to_ms(r.try_get("timestamp").map_err(|e| classify("list_events", e))?),
                })
            })
            .collect()
    }

    async fn upsert_question(&self, question: &QuestionRow) -> Result<(), AdapterError> {
        sqlx::query(
            r#"
            INSERT INTO questions (question_id, worker_id, question, question_type, context, asked_at, answer, answered_by, answered_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, now())
            ON CONFLICT (question_id) DO UPDATE SET
                answer = EXCLUDED.answer,
                answered_by = EXCLUDED.answered_by,
                answered_at = EXCLUDED.answered_at,
                updated_at = now()
            "#,
        )
        .bind(&question.question_id)
        .bind(&question.worker_id)
        .bind(&question.question)
        .bind(question.question_type.clone())
        .bind(question.context.clone())
        .bind(ms_to_dt(question.asked_at_ms))
        .bind(question.answer.clone())
        .bind(question.answered_by.clone())
        .bind(question.answered_at_ms.map(ms_to_dt))
        .execute(&self.pool)
        .await
        .map_err(|e| classify("upsert_question", e))?;
        Ok(())
    }

    async fn answer_question(
        &self,
        question_id: &str,
        answer: &str,
        answered_by: &str,
        answered_at_ms: u64,
    ) -> Result<(), AdapterError> {
        sqlx::query(
            "UPDATE questions SET answer = $2, answered_by = $3, answered_at = $4, updated_at = now() WHERE question_id = $1",
        )
        .bind(question_id)
        .bind(answer)
        .bind(answered_by)
        .bind(ms_to_dt(answered_at_ms))
        .execute(&self.pool)
        .await
        .map_err(|e| classify("answer_question", e))?;
        Ok(())
    }

    async fn upsert_session(&self, session: &Session) -> Result<(), AdapterError> {
        let status = match session.status {
            SessionStatus::Open => "open",
            SessionStatus::Closed => "closed",
        };
        sqlx::query(
            r#"
            INSERT INTO sessions (session_id, worker_id, started_at, ended_at, tasks_completed, status, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, now())
            ON CONFLICT (session_id) DO UPDATE SET
                ended_at = EXCLUDED.ended_at,
                tasks_completed = EXCLUDED.tasks_completed,
                status = EXCLUDED.status,
                updated_at = now()
            "#,
        )
        .bind(session.session_id.as_str())
        .bind(session.worker_id.as_str())
        .bind(ms_to_dt(session.started_at_ms))
        .bind(session.ended_at_ms.map(ms_to_dt))
        .bind(session.tasks_completed as i32)
        .bind(status)
        .execute(&self.pool)
        .await
        .map_err(|e| classify("upsert_session", e))?;
        Ok(())
    }

    async fn get_session(&self, session_id: &str) -> Result<Option<Session>, AdapterError> {
        let row = sqlx::query("SELECT * FROM sessions WHERE session_id = $1")
            .bind(session_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| classify("get_session", e))?;
        Ok(row.map(|r| Session {
            session_id: SessionId::new(r.try_get::<String, _>("session_id").unwrap_or_default()),
            worker_id: WorkerId::new(r.try_get::<String, _>("worker_id").unwrap_or_default()),
            started_at_ms: dt_to_ms(r.try_get("started_at").unwrap_or_else(|_| Utc::now())),
            ended_at_ms: r.try_get::<Option<DateTime<Utc>>, _>("ended_at").ok().flatten().map(dt_to_ms),
            tasks_completed: r.try_get::<i32, _>("tasks_completed").unwrap_or(0) as u32,
            status: match r.try_get::<String, _>("status").as_deref() {
                Ok("closed") => SessionStatus::Closed,
                _ => SessionStatus::Open,
            },
        }))
    }
}

fn row_to_worker(r: &sqlx::postgres::PgRow) -> WorkerRecord {
    let tags: Vec<String> = r.try_get::<serde_json::Value, _>("tags").ok().and_then(|v| serde_json::from_value(v).ok()).unwrap_or_default();
    let capabilities: WorkerCapabilities = r
        .try_get::<serde_json::Value, _>("capabilities")
        .ok()
        .and_then(|v| serde_json::from_value(v).ok())
        .unwrap_or(WorkerCapabilities {
            max_concurrent_tasks: 0,
            max_memory_mb: 0,
            feature_tags: HashSet::new(),
        });
    let system_info: WorkerSystemInfo = r
        .try_get::<serde_json::Value, _>("system_info")
        .ok()
        .and_then(|v| serde_json::from_value(v).ok())
        .unwrap_or_default();
    let metadata: HashMap<String, String> = r
        .try_get::<serde_json::Value, _>("metadata")
        .ok()
        .and_then(|v| serde_json::from_value(v).ok())
        .unwrap_or_default();

    WorkerRecord {
        worker_id: WorkerId::new(r.try_get::<String, _>("worker_id").unwrap_or_default()),
        hostname: r.try_get("hostname").unwrap_or_default(),
        tags: tags.into_iter().collect(),
        capabilities,
        system_info,
        status: PgStore::parse_worker_status(&r.try_get::<String, _>("status").unwrap_or_default()),
        registered_at_ms: dt_to_ms(r.try_get("registered_at").unwrap_or_else(|_| Utc::now())),
        last_heartbeat_ms: dt_to_ms(r.try_get("last_heartbeat").unwrap_or_else(|_| Utc::now())),
        metadata,
        current_load: r.try_get::<i32, _>("current_load").unwrap_or(0) as u32,
    }
}

fn row_to_task(r: &sqlx::postgres::PgRow) -> Task {
    Task {
        task_id: TaskId::new(r.try_get::<String, _>("task_id").unwrap_or_default()),
        description: r.try_get("description").unwrap_or_default(),
        priority: PgStore::parse_priority(&r.try_get::<String, _>("priority").unwrap_or_default()),
        assigned_worker: r.try_get::<Option<String>, _>("assigned_worker").ok().flatten().map(WorkerId::new),
        status: PgStore::parse_task_status(&r.try_get::<String, _>("status").unwrap_or_default()),
        created_at_ms: dt_to_ms(r.try_get("created_at").unwrap_or_else(|_| Utc::now())),
        started_at_ms: r.try_get::<Option<DateTime<Utc>>, _>("started_at").ok().flatten().map(dt_to_ms),
        completed_at_ms: r.try_get::<Option<DateTime<Utc>>, _>("completed_at").ok().flatten().map(dt_to_ms),
        timeout_ms: r.try_get::<i64, _>("timeout_ms").unwrap_or(0) as u64,
        retry_count: r.try_get::<i32, _>("retry_count").unwrap_or(0) as u32,
        result_blob: r.try_get("result_blob").ok(),
        error_message: r.try_get("error_message").ok(),
        analytics: r.try_get("analytics").unwrap_or(serde_json::Value::Null),
        session_id: r.try_get("session_id").ok(),
    }
}
