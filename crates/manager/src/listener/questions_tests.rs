use super::*;
use crate::container::{ContainerSpawnError, ContainerSpawnRequest, SpawnedContainer};
use cp_adapters::bus::FakeBus;
use cp_adapters::cache::FakeCache;
use cp_core::id::IdGen;
use cp_core::{FakeClock, WorkerCapabilities, WorkerRecord, WorkerStatus, WorkerSystemInfo};
use cp_manager_runtime::{ManagerRuntime, ManagerRuntimeConfig};
use cp_storage::FakeStore;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

#[derive(Clone, Default)]
struct CountingIdGen(Arc<AtomicU64>);

impl IdGen for CountingIdGen {
    fn next(&self) -> String {
        format!("q{}", self.0.fetch_add(1, Ordering::SeqCst))
    }
}

#[derive(Clone, Default)]
struct FakeContainerSpawner;

#[async_trait::async_trait]
impl ContainerSpawner for FakeContainerSpawner {
    async fn spawn(&self, _request: ContainerSpawnRequest) -> Result<SpawnedContainer, ContainerSpawnError> {
        Ok(SpawnedContainer { container_id: "c1".into(), name: "w".into(), registered: false })
    }
}

fn ctx() -> ListenCtx<FakeBus, FakeCache, FakeStore, CountingIdGen, FakeClock, FakeContainerSpawner> {
    let store = FakeStore::new();
    let bus = FakeBus::new();
    let runtime = Arc::new(ManagerRuntime::new(
        bus.clone(),
        FakeCache::new(),
        store.clone(),
        FakeClock::new(1_000),
        CountingIdGen::default(),
        ManagerRuntimeConfig::default(),
    ));
    ListenCtx {
        runtime,
        bus,
        store,
        container_spawner: FakeContainerSpawner,
        clock: FakeClock::new(1_000),
        shutdown: Arc::new(Notify::new()),
    }
}

#[tokio::test]
async fn answering_an_unknown_question_reports_not_found() {
    let ctx = ctx();
    let response = answer_worker_question(&ctx, "ghost", "42", None).await;
    assert_eq!(response, Response::QuestionAnswered { found: false });
}

#[tokio::test]
async fn submitted_question_is_listed_and_answerable() {
    let ctx = ctx();
    ctx.runtime
        .rpc_broker
        .submit_question(
            QuestionId::new("q1"),
            WorkerId::new("w1"),
            None,
            "should I proceed?".into(),
            None,
            serde_json::Value::Null,
            "inbox.reply".into(),
            1_000,
        )
        .await
        .expect("submit question");

    let response = list_pending_questions(&ctx, None).await;
    let Response::PendingQuestions { questions } = response else { panic!("expected PendingQuestions response") };
    assert_eq!(questions.len(), 1);

    let filtered = list_pending_questions(&ctx, Some("someone-else")).await;
    let Response::PendingQuestions { questions } = filtered else { panic!("expected PendingQuestions response") };
    assert!(questions.is_empty());

    let response = answer_worker_question(&ctx, "q1", "yes", Some("approval")).await;
    assert_eq!(response, Response::QuestionAnswered { found: true });
}

#[tokio::test]
async fn assign_task_to_waiting_worker_clears_the_wait_record() {
    let ctx = ctx();
    ctx.runtime
        .registry
        .register(&WorkerRecord {
            worker_id: WorkerId::new("w1"),
            hostname: "host".into(),
            tags: Default::default(),
            capabilities: WorkerCapabilities { max_concurrent_tasks: 2, max_memory_mb: 512, feature_tags: Default::default() },
            system_info: WorkerSystemInfo::default(),
            status: WorkerStatus::Idle,
            registered_at_ms: 0,
            last_heartbeat_ms: 1_000,
            metadata: Default::default(),
            current_load: 0,
        })
        .await
        .expect("register");
    ctx.runtime.rpc_broker.submit_next_task_request(&WorkerId::new("w1"), 1_000, "inbox.reply").await.expect("submit");
    assert_eq!(ctx.runtime.rpc_broker.waiting_workers().await.expect("waiting"), vec![WorkerId::new("w1")]);

    let response = assign_task_to_waiting_worker(&ctx, WorkerId::new("w1"), "next thing".into(), Priority::Normal).await;
    let Response::TaskAssigned { worker_id, .. } = response else { panic!("expected TaskAssigned response") };
    assert_eq!(worker_id, Some(WorkerId::new("w1")));
    assert!(ctx.runtime.rpc_broker.waiting_workers().await.expect("waiting").is_empty());
}

#[tokio::test]
async fn approving_an_unknown_session_end_reports_not_found() {
    let ctx = ctx();
    let response = approve_session_end(&ctx, WorkerId::new("ghost"), true, None, None).await;
    assert_eq!(response, Response::SessionEndApproved { found: false });
}

#[tokio::test]
async fn approving_a_submitted_session_end_request_succeeds() {
    let ctx = ctx();
    ctx.runtime
        .rpc_broker
        .submit_end_session_request(WorkerId::new("w1"), "s1".into(), Some("done".into()), 1_000, "inbox.reply".into())
        .await
        .expect("submit");

    let response = approve_session_end(&ctx, WorkerId::new("w1"), true, Some("looks good".into()), Some("wrap up".into())).await;
    assert_eq!(response, Response::SessionEndApproved { found: true });
}
