use super::*;
use cp_adapters::agent::FakeAgentProcess;
use cp_adapters::bus::FakeBus;
use cp_adapters::cache::FakeCache;
use cp_core::{CommandKind, FakeClock, Priority, TaskId, WorkerCapabilities, WorkerId};
use cp_worker_runtime::{WorkerIdentity, WorkerRuntimeConfig};
use std::collections::HashSet;

fn test_runtime(worker_id: &str) -> (Arc<WorkerRuntime<FakeBus, FakeCache, FakeAgentProcess, FakeClock>>, FakeBus) {
    let bus = FakeBus::new();
    let identity = WorkerIdentity {
        worker_id: WorkerId::new(worker_id),
        hostname: "host-1".to_string(),
        tags: HashSet::new(),
        capabilities: WorkerCapabilities { max_concurrent_tasks: 2, max_memory_mb: 1024, feature_tags: HashSet::new() },
        agent_env: Vec::new(),
    };
    let runtime = Arc::new(WorkerRuntime::new(
        bus.clone(),
        FakeCache::new(),
        FakeAgentProcess::new(),
        FakeClock::new(1_000),
        identity,
        WorkerRuntimeConfig::default(),
    ));
    (runtime, bus)
}

#[tokio::test]
async fn direct_assignment_on_the_task_subject_is_accepted() {
    let (runtime, bus) = test_runtime("worker-1");
    let handles = spawn_all(runtime.clone(), bus.clone(), FakeClock::new(1_000)).await.expect("subscriptions should succeed");

    let message = BusMessage::TaskAssignment {
        task_id: TaskId::new("task-1"),
        description: "do the thing".to_string(),
        priority: Priority::Normal,
        timeout_ms: 5_000,
        session_id: None,
        assigned_at_ms: 1_000,
    };
    bus.publish(&subject::worker_task(runtime.worker_id()), serde_json::to_vec(&message).expect("encode should succeed"))
        .await
        .expect("publish should succeed");

    tokio::time::sleep(std::time::Duration::from_millis(30)).await;
    assert_eq!(runtime.active_task_count(), 1);

    for handle in handles {
        handle.abort();
    }
}

#[tokio::test]
async fn broadcast_assignment_on_the_all_subject_is_claimed() {
    let (runtime, bus) = test_runtime("worker-1");
    let handles = spawn_all(runtime.clone(), bus.clone(), FakeClock::new(1_000)).await.expect("subscriptions should succeed");

    let message = BusMessage::TaskAssignment {
        task_id: TaskId::new("task-1"),
        description: "do the thing".to_string(),
        priority: Priority::Normal,
        timeout_ms: 5_000,
        session_id: None,
        assigned_at_ms: 1_000,
    };
    bus.publish(&subject::worker_broadcast_all(), serde_json::to_vec(&message).expect("encode should succeed"))
        .await
        .expect("publish should succeed");

    tokio::time::sleep(std::time::Duration::from_millis(30)).await;
    assert_eq!(runtime.active_task_count(), 1);

    for handle in handles {
        handle.abort();
    }
}

#[tokio::test]
async fn pause_command_on_the_command_subject_zeroes_capacity() {
    let (runtime, bus) = test_runtime("worker-1");
    let handles = spawn_all(runtime.clone(), bus.clone(), FakeClock::new(1_000)).await.expect("subscriptions should succeed");

    let message = BusMessage::WorkerCommand {
        worker_id: runtime.worker_id().clone(),
        command: CommandKind::Pause,
        payload: serde_json::Value::Null,
        issued_at_ms: 1_000,
    };
    bus.publish(&subject::worker_command(runtime.worker_id()), serde_json::to_vec(&message).expect("encode should succeed"))
        .await
        .expect("publish should succeed");

    tokio::time::sleep(std::time::Duration::from_millis(30)).await;
    assert_eq!(runtime.effective_capacity(), 0);

    for handle in handles {
        handle.abort();
    }
}
