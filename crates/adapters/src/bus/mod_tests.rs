use super::*;

#[tokio::test]
async fn fake_bus_satisfies_the_bus_trait() {
    async fn publish_something<B: Bus>(bus: &B) {
        bus.publish("worker.command.w1", b"ping".to_vec()).await.unwrap();
    }
    publish_something(&FakeBus::new()).await;
}
