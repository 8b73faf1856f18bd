use super::*;
use cp_adapters::cache::FakeCache;
use cp_core::{FakeClock, WorkerCapabilities, WorkerSystemInfo};
use cp_storage::FakeStore;
use std::collections::HashSet;

fn worker(id: &str, heartbeat_ms: u64) -> WorkerRecord {
    WorkerRecord {
        worker_id: WorkerId::new(id),
        hostname: "host-1".into(),
        tags: HashSet::new(),
        capabilities: WorkerCapabilities {
            max_concurrent_tasks: 2,
            max_memory_mb: 1024,
            feature_tags: HashSet::new(),
        },
        system_info: WorkerSystemInfo::default(),
        status: WorkerStatus::Idle,
        registered_at_ms: heartbeat_ms,
        last_heartbeat_ms: heartbeat_ms,
        metadata: Default::default(),
        current_load: 0,
    }
}

fn registry() -> Registry<FakeCache, FakeStore, FakeClock> {
    Registry::new(FakeCache::new(), FakeStore::new(), FakeClock::new(0), ManagerRuntimeConfig::default())
}

#[tokio::test]
async fn duplicate_registration_collapses_to_one_row() {
    let reg = registry();
    reg.register(&worker("w1", 0)).await.unwrap();
    reg.register(&worker("w1", 10)).await.unwrap();
    let workers = reg.list_workers().await.unwrap();
    assert_eq!(workers.len(), 1);
    assert_eq!(workers[0].last_heartbeat_ms, 10);
}

#[tokio::test]
async fn heartbeat_refreshes_load_and_timestamp() {
    let reg = registry();
    reg.register(&worker("w1", 0)).await.unwrap();
    reg.heartbeat(&WorkerId::new("w1"), 1, 500).await.unwrap();
    let fetched = reg.get_worker("w1").await.unwrap().unwrap();
    assert_eq!(fetched.current_load, 1);
    assert_eq!(fetched.last_heartbeat_ms, 500);
}

#[tokio::test]
async fn sweep_marks_stale_worker_unresponsive_then_offline() {
    let cache = FakeCache::new();
    let store = FakeStore::new();
    let clock = FakeClock::new(0);
    let config = ManagerRuntimeConfig::default();
    let reg = Registry::new(cache, store, clock.clone(), config.clone());
    reg.register(&worker("w1", 0)).await.unwrap();

    clock.set_ms(config.worker_timeout.as_millis() as u64);
    let unresponsive = reg.sweep().await.unwrap();
    assert_eq!(unresponsive, vec![WorkerId::new("w1")]);
    assert_eq!(reg.get_worker("w1").await.unwrap().unwrap().status, WorkerStatus::Unresponsive);

    clock.set_ms((config.worker_timeout + config.offline_grace).as_millis() as u64);
    reg.sweep().await.unwrap();
    assert_eq!(reg.get_worker("w1").await.unwrap().unwrap().status, WorkerStatus::Offline);
}

#[tokio::test]
async fn live_worker_is_left_alone_by_sweep() {
    let cache = FakeCache::new();
    let store = FakeStore::new();
    let clock = FakeClock::new(0);
    let reg = Registry::new(cache, store, clock.clone(), ManagerRuntimeConfig::default());
    reg.register(&worker("w1", 0)).await.unwrap();
    clock.advance_ms(1_000);
    let unresponsive = reg.sweep().await.unwrap();
    assert!(unresponsive.is_empty());
}
