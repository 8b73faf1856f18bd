use super::*;
use cp_adapters::bus::FakeBus;
use cp_adapters::cache::FakeCache;
use cp_core::{id::IdGen, FakeClock, TaskStatus, WorkerCapabilities, WorkerRecord, WorkerStatus, WorkerSystemInfo};
use cp_storage::FakeStore;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Clone, Default)]
struct CountingIdGen(std::sync::Arc<AtomicU64>);

impl IdGen for CountingIdGen {
    fn next(&self) -> String {
        format!("t{}", self.0.fetch_add(1, Ordering::SeqCst))
    }
}

fn worker_record(id: &str, status: WorkerStatus, current_load: u32, heartbeat_ms: u64) -> WorkerRecord {
    WorkerRecord {
        worker_id: WorkerId::new(id),
        hostname: "host".into(),
        tags: HashSet::new(),
        capabilities: WorkerCapabilities {
            max_concurrent_tasks: 2,
            max_memory_mb: 1024,
            feature_tags: HashSet::new(),
        },
        system_info: WorkerSystemInfo::default(),
        status,
        registered_at_ms: 0,
        last_heartbeat_ms: heartbeat_ms,
        metadata: Default::default(),
        current_load,
    }
}

fn harness() -> (
    Scheduler<FakeBus, FakeCache, FakeStore, CountingIdGen, FakeClock>,
    Arc<Registry<FakeCache, FakeStore, FakeClock>>,
    FakeStore,
    FakeBus,
) {
    let bus = FakeBus::new();
    let cache = FakeCache::new();
    let store = FakeStore::new();
    let clock = FakeClock::new(0);
    let registry = Arc::new(Registry::new(cache, store.clone(), clock, ManagerRuntimeConfig::default()));
    let scheduler = Scheduler::new(
        bus.clone(),
        store.clone(),
        registry.clone(),
        CountingIdGen::default(),
        ManagerRuntimeConfig::default(),
    );
    (scheduler, registry, store, bus)
}

#[tokio::test]
async fn assigns_to_the_only_idle_worker() {
    let (scheduler, registry, store, _bus) = harness();
    registry.register(&worker_record("w1", WorkerStatus::Idle, 0, 0)).await.unwrap();

    let (task_id, target) = scheduler
        .assign_task("echo hi".into(), Priority::Normal, None, 1_000, None, 0)
        .await
        .unwrap();

    assert_eq!(target, Some(WorkerId::new("w1")));
    let task = store.get_task(task_id.as_str()).await.unwrap().unwrap();
    assert_eq!(task.status, TaskStatus::Assigned);
    assert_eq!(task.assigned_worker, Some(WorkerId::new("w1")));
}

#[tokio::test]
async fn picks_least_loaded_worker() {
    let (scheduler, registry, _store, _bus) = harness();
    registry.register(&worker_record("busy", WorkerStatus::Idle, 1, 0)).await.unwrap();
    registry.register(&worker_record("free", WorkerStatus::Idle, 0, 0)).await.unwrap();

    let (_task_id, target) = scheduler
        .assign_task("echo hi".into(), Priority::Normal, None, 1_000, None, 0)
        .await
        .unwrap();

    assert_eq!(target, Some(WorkerId::new("free")));
}

#[tokio::test]
async fn no_candidate_leaves_task_pending() {
    let (scheduler, _registry, store, _bus) = harness();

    let (task_id, target) = scheduler
        .assign_task("echo hi".into(), Priority::Normal, None, 1_000, None, 0)
        .await
        .unwrap();

    assert_eq!(target, None);
    assert_eq!(store.get_task(task_id.as_str()).await.unwrap().unwrap().status, TaskStatus::Pending);
}

#[tokio::test]
async fn rejection_requeues_until_retry_limit_then_fails() {
    let (scheduler, registry, store, _bus) = harness();
    registry.register(&worker_record("full", WorkerStatus::Busy, 2, 0)).await.unwrap();
    let (task_id, _target) = scheduler
        .assign_task(
            "echo hi".into(),
            Priority::Normal,
            Some(WorkerId::new("full")),
            1_000,
            None,
            0,
        )
        .await
        .unwrap();

    for attempt in 0..ManagerRuntimeConfig::default().retry_limit {
        scheduler.handle_rejection(&task_id, "queue_full", attempt as u64).await.unwrap();
    }

    let task = store.get_task(task_id.as_str()).await.unwrap().unwrap();
    assert_eq!(task.status, TaskStatus::Failed);
    assert_eq!(task.error_message.as_deref(), Some("queue_full"));
}

#[tokio::test]
async fn ack_deadline_requeues_unconfirmed_dispatch() {
    let (scheduler, registry, store, _bus) = harness();
    registry.register(&worker_record("w1", WorkerStatus::Idle, 0, 0)).await.unwrap();
    let (task_id, target) = scheduler
        .assign_task("echo hi".into(), Priority::Normal, None, 1_000, None, 0)
        .await
        .unwrap();
    assert!(target.is_some());

    let deadline_ms = ManagerRuntimeConfig::default().dispatch_ack_deadline.as_millis() as u64;
    let requeued = scheduler.check_ack_deadlines(deadline_ms).await.unwrap();
    assert_eq!(requeued, 1);
    assert_eq!(store.get_task(task_id.as_str()).await.unwrap().unwrap().status, TaskStatus::Pending);
}

#[tokio::test]
async fn confirmed_dispatch_is_not_touched_by_ack_deadline() {
    let (scheduler, registry, store, _bus) = harness();
    registry.register(&worker_record("w1", WorkerStatus::Idle, 0, 0)).await.unwrap();
    let (task_id, _target) = scheduler
        .assign_task("echo hi".into(), Priority::Normal, None, 1_000, None, 0)
        .await
        .unwrap();
    scheduler.handle_confirmation(&task_id, 10).await.unwrap();

    let deadline_ms = ManagerRuntimeConfig::default().dispatch_ack_deadline.as_millis() as u64;
    let requeued = scheduler.check_ack_deadlines(deadline_ms).await.unwrap();
    assert_eq!(requeued, 0);
    assert_eq!(store.get_task(task_id.as_str()).await.unwrap().unwrap().status, TaskStatus::Running);
}

#[tokio::test]
async fn worker_death_reassigns_its_active_tasks() {
    let (scheduler, registry, store, _bus) = harness();
    registry.register(&worker_record("w1", WorkerStatus::Idle, 0, 0)).await.unwrap();
    let (task_id, _target) = scheduler
        .assign_task("echo hi".into(), Priority::Normal, None, 1_000, None, 0)
        .await
        .unwrap();
    scheduler.handle_confirmation(&task_id, 10).await.unwrap();

    scheduler.reassign_for_unresponsive(&WorkerId::new("w1"), 100).await.unwrap();

    let task = store.get_task(task_id.as_str()).await.unwrap().unwrap();
    assert_eq!(task.status, TaskStatus::Pending);
    assert_eq!(task.retry_count, 1);
    assert_eq!(task.assigned_worker, None);
}

#[tokio::test]
async fn dispatch_pending_drains_queue_in_priority_then_fifo_order() {
    let (scheduler, registry, store, _bus) = harness();
    let (low_id, target) = scheduler
        .assign_task("low".into(), Priority::Low, None, 1_000, None, 0)
        .await
        .unwrap();
    assert_eq!(target, None);
    let (urgent_id, target) = scheduler
        .assign_task("urgent".into(), Priority::Urgent, None, 1_000, None, 1)
        .await
        .unwrap();
    assert_eq!(target, None);

    registry.register(&worker_record("w1", WorkerStatus::Idle, 0, 0)).await.unwrap();
    let dispatched = scheduler.dispatch_pending(10).await.unwrap();
    assert_eq!(dispatched, 1);

    assert_eq!(store.get_task(urgent_id.as_str()).await.unwrap().unwrap().status, TaskStatus::Assigned);
    assert_eq!(store.get_task(low_id.as_str()).await.unwrap().unwrap().status, TaskStatus::Pending);
}
