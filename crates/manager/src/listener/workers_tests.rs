use super::*;
use crate::container::{ContainerSpawnError, SpawnedContainer};
use cp_adapters::bus::FakeBus;
use cp_adapters::cache::FakeCache;
use cp_core::id::IdGen;
use cp_core::{FakeClock, WorkerCapabilities, WorkerRecord, WorkerSystemInfo};
use cp_manager_runtime::{ManagerRuntime, ManagerRuntimeConfig};
use cp_storage::store::EventRow;
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
    async fn spawn(&self, request: ContainerSpawnRequest) -> Result<SpawnedContainer, ContainerSpawnError> {
        Ok(SpawnedContainer {
            container_id: "c1".into(),
            name: request.name.unwrap_or_else(|| "worker-fake".into()),
            registered: false,
        })
    }
}

fn ctx() -> (ListenCtx<FakeBus, FakeCache, FakeStore, CountingIdGen, FakeClock, FakeContainerSpawner>, FakeStore) {
    let store = FakeStore::new();
    let bus = FakeBus::new();
    let runtime = Arc::new(ManagerRuntime::new(
        bus.clone(),
        FakeCache::new(),
        store.clone(),
        FakeClock::new(0),
        CountingIdGen::default(),
        ManagerRuntimeConfig::default(),
    ));
    let ctx = ListenCtx {
        runtime,
        bus,
        store: store.clone(),
        container_spawner: FakeContainerSpawner,
        clock: FakeClock::new(0),
        shutdown: Arc::new(Notify::new()),
    };
    (ctx, store)
}

fn worker(id: &str) -> WorkerRecord {
    WorkerRecord {
        worker_id: WorkerId::new(id),
        hostname: "host".into(),
        tags: Default::default(),
        capabilities: WorkerCapabilities { max_concurrent_tasks: 2, max_memory_mb: 512, feature_tags: Default::default() },
        system_info: WorkerSystemInfo::default(),
        status: WorkerStatus::Idle,
        registered_at_ms: 0,
        last_heartbeat_ms: 0,
        metadata: Default::default(),
        current_load: 0,
    }
}

#[tokio::test]
async fn list_workers_filters_by_status() {
    let (ctx, _store) = ctx();
    ctx.runtime.registry.register(&worker("w1")).await.expect("register");
    let mut busy = worker("w2");
    busy.status = WorkerStatus::Busy;
    ctx.runtime.registry.register(&busy).await.expect("register");
    ctx.runtime.registry.set_status(&WorkerId::new("w2"), WorkerStatus::Busy).await.expect("set status");

    let response = list_workers(&ctx, Some(WorkerStatus::Busy), false).await;
    let Response::Workers { workers } = response else { panic!("expected Workers response") };
    assert_eq!(workers.len(), 1);
    assert_eq!(workers[0].worker_id, WorkerId::new("w2"));
}

#[tokio::test]
async fn get_worker_status_reports_recent_events() {
    let (ctx, store) = ctx();
    ctx.runtime.registry.register(&worker("w1")).await.expect("register");
    cp_storage::Store::append_event(
        &store,
        &EventRow { worker_id: "w1".into(), event_type: "started".into(), event_data: serde_json::Value::Null, timestamp_ms: 5 },
    )
    .await
    .expect("append event");

    let response = get_worker_status(&ctx, &WorkerId::new("w1")).await;
    let Response::WorkerStatus { worker, recent_events } = response else { panic!("expected WorkerStatus response") };
    assert!(worker.is_some());
    assert_eq!(recent_events.len(), 1);
}

#[tokio::test]
async fn get_worker_status_for_unknown_worker_returns_none() {
    let (ctx, _store) = ctx();
    let response = get_worker_status(&ctx, &WorkerId::new("ghost")).await;
    let Response::WorkerStatus { worker, .. } = response else { panic!("expected WorkerStatus response") };
    assert!(worker.is_none());
}

#[tokio::test]
async fn spawn_worker_container_returns_spawner_output() {
    let (ctx, _store) = ctx();
    let response = spawn_worker_container(&ctx, vec!["gpu".into()], 4, 2048, Some("worker-a".into())).await;
    let Response::ContainerSpawned { container_id, name, registered } = response else {
        panic!("expected ContainerSpawned response")
    };
    assert_eq!(container_id, "c1");
    assert_eq!(name, "worker-a");
    assert!(!registered);
}
