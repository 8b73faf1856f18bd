use super::*;
use crate::container::{ContainerSpawnError, ContainerSpawnRequest, SpawnedContainer};
use cp_adapters::bus::FakeBus;
use cp_adapters::cache::FakeCache;
use cp_core::id::IdGen;
use cp_core::{FakeClock, WorkerCapabilities, WorkerId, WorkerRecord, WorkerSystemInfo};
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

#[tokio::test]
async fn analytics_counts_workers_by_status() {
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

    let response = get_worker_analytics(&ctx, None).await;
    let Response::WorkerAnalytics { aggregates } = response else { panic!("expected WorkerAnalytics response") };
    assert_eq!(aggregates["total_workers"], 1);
    assert_eq!(aggregates["workers_by_status"]["idle"], 1);
}

#[tokio::test]
async fn analytics_echoes_the_requested_time_range() {
    let ctx = ctx();
    let range = TimeRange { since_ms: 10, until_ms: 20 };
    let response = get_worker_analytics(&ctx, Some(range)).await;
    let Response::WorkerAnalytics { aggregates } = response else { panic!("expected WorkerAnalytics response") };
    assert_eq!(aggregates["time_range"]["since_ms"], 10);
    assert_eq!(aggregates["time_range"]["until_ms"], 20);
}
