use super::*;
use std::time::Duration;

fn spawn_config(task_id: &str) -> AgentSpawnConfig {
    AgentSpawnConfig {
        task_id: task_id.to_string(),
        worker_id: "w1".to_string(),
        description: "echo hi".to_string(),
        env: vec![],
        cwd: None,
        timeout: Duration::from_secs(30),
    }
}

#[tokio::test]
async fn spawn_then_finish_resolves_wait() {
    let agent = FakeAgentProcess::new();
    agent.spawn(spawn_config("t1")).await.unwrap();
    agent.finish("t1", 0);
    let outcome = agent.wait("t1").await.unwrap();
    assert_eq!(outcome, AgentOutcome::Exited { code: 0 });
}

#[tokio::test]
async fn kill_resolves_wait_with_killed_outcome() {
    let agent = FakeAgentProcess::new();
    agent.spawn(spawn_config("t1")).await.unwrap();
    agent.kill("t1", Duration::from_secs(10)).await.unwrap();
    let outcome = agent.wait("t1").await.unwrap();
    assert_eq!(outcome, AgentOutcome::Killed);
}

#[tokio::test]
async fn emitted_lines_are_observable_on_the_handle() {
    let agent = FakeAgentProcess::new();
    let mut handle = agent.spawn(spawn_config("t1")).await.unwrap();
    agent.emit_line("t1", false, "tool_call: navigate").await;
    let line = handle.output.recv().await.unwrap();
    assert_eq!(line.line, "tool_call: navigate");
    assert!(!line.is_stderr);
}

#[tokio::test]
async fn spawn_error_is_surfaced() {
    let agent = FakeAgentProcess::new();
    agent.set_spawn_error("budget exceeded");
    let err = agent.spawn(spawn_config("t1")).await.unwrap_err();
    assert!(matches!(err, AgentProcessError::SpawnFailed(_)));
}
