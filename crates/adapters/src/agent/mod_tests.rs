use super::*;
use std::time::Duration;

#[tokio::test]
async fn fake_agent_process_satisfies_the_trait() {
    async fn round_trip<A: AgentProcess>(agent: &A) {
        let handle = agent
            .spawn(AgentSpawnConfig {
                task_id: "t1".to_string(),
                worker_id: "w1".to_string(),
                description: "do the thing".to_string(),
                env: vec![],
                cwd: None,
                timeout: Duration::from_secs(5),
            })
            .await
            .unwrap();
        assert_eq!(handle.task_id, "t1");
    }
    round_trip(&FakeAgentProcess::new()).await;
}
