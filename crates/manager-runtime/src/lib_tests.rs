use super::*;
use cp_adapters::bus::FakeBus;
use cp_adapters::cache::FakeCache;
use cp_core::{FakeClock, Priority};
use cp_storage::FakeStore;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

#[derive(Clone, Default)]
struct CountingIdGen(Arc<AtomicU64>);

impl IdGen for CountingIdGen {
    fn next(&self) -> String {
        format!("t{}", self.0.fetch_add(1, AtomicOrdering::SeqCst))
    }
}

fn runtime() -> ManagerRuntime<FakeBus, FakeCache, FakeStore, CountingIdGen, FakeClock> {
    runtime_with_store().0
}

fn runtime_with_store() -> (ManagerRuntime<FakeBus, FakeCache, FakeStore, CountingIdGen, FakeClock>, FakeStore) {
    let store = FakeStore::new();
    let runtime = ManagerRuntime::new(
        FakeBus::new(),
        FakeCache::new(),
        store.clone(),
        FakeClock::new(0),
        CountingIdGen::default(),
        ManagerRuntimeConfig::default(),
    );
    (runtime, store)
}

fn worker(id: &str) -> cp_core::WorkerRecord {
    cp_core::WorkerRecord {
        worker_id: WorkerId::new(id),
        hostname: "host".into(),
        tags: Default::default(),
        capabilities: cp_core::WorkerCapabilities {
            max_concurrent_tasks: 2,
            max_memory_mb: 1024,
            feature_tags: Default::default(),
        },
        system_info: Default::default(),
        status: cp_core::WorkerStatus::Idle,
        registered_at_ms: 0,
        last_heartbeat_ms: 0,
        metadata: Default::default(),
        current_load: 0,
    }
}

#[tokio::test]
async fn task_completion_frees_worker_and_drains_pending_queue() {
    let (runtime, store) = runtime_with_store();
    runtime.registry.register(&worker("w1")).await.unwrap();

    let (first_id, target) = runtime
        .scheduler
        .assign_task("first".into(), Priority::Normal, None, 1_000, None, 0)
        .await
        .unwrap();
    assert_eq!(target, Some(WorkerId::new("w1")));
    let (second_id, target) = runtime
        .scheduler
        .assign_task("second".into(), Priority::Normal, None, 1_000, None, 1)
        .await
        .unwrap();
    assert_eq!(target, None);

    let completion = cp_core::BusMessage::TaskCompletion {
        task_id: first_id,
        worker_id: WorkerId::new("w1"),
        success: true,
        result_blob: None,
        error_message: None,
        execution_time_ms: 5,
        completed_at_ms: 10,
    };
    let envelope = cp_adapters::bus::BusEnvelope {
        subject: "task.completion".into(),
        payload: serde_json::to_vec(&completion).unwrap(),
        reply_to: None,
    };
    runtime.handle_analytics_message(&envelope, 10).await.unwrap();

    // The second task should have been picked up by the freed worker.
    let second_task = cp_storage::Store::get_task(&store, second_id.as_str()).await.unwrap().unwrap();
    assert_eq!(second_task.status, cp_core::TaskStatus::Assigned);
    assert_eq!(second_task.assigned_worker, Some(WorkerId::new("w1")));
}

#[tokio::test]
async fn periodic_sweep_reassigns_unresponsive_workers_tasks() {
    let runtime = runtime();
    runtime.registry.register(&worker("w1")).await.unwrap();
    let (task_id, target) = runtime
        .scheduler
        .assign_task("echo hi".into(), Priority::Normal, None, 1_000, None, 0)
        .await
        .unwrap();
    assert!(target.is_some());
    runtime.scheduler.handle_confirmation(&task_id, 1).await.unwrap();

    let deadline_ms = ManagerRuntimeConfig::default().worker_timeout.as_millis() as u64 + 1;
    let report = runtime.run_periodic_sweep(deadline_ms).await.unwrap();
    assert_eq!(report.newly_unresponsive, 1);
}

#[tokio::test]
async fn shutdown_with_no_pending_rpcs_is_a_no_op() {
    let runtime = runtime();
    runtime.shutdown().await.unwrap();
}
