use super::*;
use crate::container::{ContainerSpawnError, ContainerSpawnRequest, SpawnedContainer};
use cp_adapters::bus::FakeBus;
use cp_adapters::cache::FakeCache;
use cp_core::id::IdGen;
use cp_core::{FakeClock, Session, SessionStatus, WorkerStatus};
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

fn ctx() -> (ListenCtx<FakeBus, FakeCache, FakeStore, CountingIdGen, FakeClock, FakeContainerSpawner>, FakeStore) {
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
    let ctx = ListenCtx {
        runtime,
        bus,
        store: store.clone(),
        container_spawner: FakeContainerSpawner,
        clock: FakeClock::new(1_000),
        shutdown: Arc::new(Notify::new()),
    };
    (ctx, store)
}

#[tokio::test]
async fn broadcast_with_no_targets_reaches_every_registered_worker() {
    let (ctx, _store) = ctx();
    ctx.runtime
        .registry
        .register(&cp_core::WorkerRecord {
            worker_id: WorkerId::new("w1"),
            hostname: "host".into(),
            tags: Default::default(),
            capabilities: cp_core::WorkerCapabilities { max_concurrent_tasks: 2, max_memory_mb: 512, feature_tags: Default::default() },
            system_info: cp_core::WorkerSystemInfo::default(),
            status: WorkerStatus::Idle,
            registered_at_ms: 0,
            last_heartbeat_ms: 1_000,
            metadata: Default::default(),
            current_load: 0,
        })
        .await
        .expect("register");

    let response = broadcast(&ctx, "stand down".into(), Vec::new()).await;
    assert_eq!(response, Response::Broadcast { recipients_count: 1 });
}

#[tokio::test]
async fn broadcast_resolves_target_sessions_to_workers() {
    let (ctx, store) = ctx();
    cp_storage::Store::upsert_session(
        &store,
        &Session {
            session_id: cp_core::SessionId::new("s1"),
            worker_id: WorkerId::new("w1"),
            started_at_ms: 0,
            ended_at_ms: None,
            tasks_completed: 0,
            status: SessionStatus::Open,
        },
    )
    .await
    .expect("upsert session");

    let response = broadcast(&ctx, "hello".into(), vec!["s1".into()]).await;
    assert_eq!(response, Response::Broadcast { recipients_count: 1 });
}

#[tokio::test]
async fn broadcast_skips_unknown_sessions() {
    let (ctx, _store) = ctx();
    let response = broadcast(&ctx, "hello".into(), vec!["ghost-session".into()]).await;
    assert_eq!(response, Response::Broadcast { recipients_count: 0 });
}
