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
        format!("t{}", self.0.fetch_add(1, Ordering::SeqCst))
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

async fn register_idle_worker(ctx: &ListenCtx<FakeBus, FakeCache, FakeStore, CountingIdGen, FakeClock, FakeContainerSpawner>, id: &str) {
    ctx.runtime
        .registry
        .register(&WorkerRecord {
            worker_id: WorkerId::new(id),
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
}

#[tokio::test]
async fn assign_task_picks_an_idle_worker() {
    let ctx = ctx();
    register_idle_worker(&ctx, "w1").await;

    let response = assign_task(&ctx, "do a thing".into(), Priority::Normal, None, None).await;
    let Response::TaskAssigned { worker_id, .. } = response else { panic!("expected TaskAssigned response") };
    assert_eq!(worker_id, Some(WorkerId::new("w1")));
}

#[tokio::test]
async fn assign_task_with_no_workers_stays_pending() {
    let ctx = ctx();
    let response = assign_task(&ctx, "do a thing".into(), Priority::Normal, None, Some(60_000)).await;
    let Response::TaskAssigned { worker_id, .. } = response else { panic!("expected TaskAssigned response") };
    assert_eq!(worker_id, None);
}

#[tokio::test]
async fn get_task_status_reports_unknown_task_as_none() {
    let ctx = ctx();
    let response = get_task_status(&ctx, &TaskId::new("ghost"), false).await;
    let Response::TaskStatus { task, timeline } = response else { panic!("expected TaskStatus response") };
    assert!(task.is_none());
    assert!(timeline.is_empty());
}

#[tokio::test]
async fn get_task_status_finds_assigned_task() {
    let ctx = ctx();
    register_idle_worker(&ctx, "w1").await;
    let Response::TaskAssigned { task_id, .. } = assign_task(&ctx, "do a thing".into(), Priority::Normal, None, None).await
    else {
        panic!("expected TaskAssigned response")
    };

    let response = get_task_status(&ctx, &task_id, false).await;
    let Response::TaskStatus { task, .. } = response else { panic!("expected TaskStatus response") };
    assert!(task.is_some());
}

#[tokio::test]
async fn monitor_task_realtime_returns_empty_timeline_for_fresh_task() {
    let ctx = ctx();
    register_idle_worker(&ctx, "w1").await;
    let Response::TaskAssigned { task_id, .. } = assign_task(&ctx, "do a thing".into(), Priority::Normal, None, None).await
    else {
        panic!("expected TaskAssigned response")
    };

    let response = monitor_task_realtime(&ctx, &task_id, 5).await;
    let Response::TaskProgressStream { records } = response else { panic!("expected TaskProgressStream response") };
    assert!(records.is_empty());
}
