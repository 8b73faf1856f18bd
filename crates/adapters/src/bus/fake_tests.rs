use super::*;
use cp_core::AdapterErrorKind;

#[tokio::test]
async fn subscriber_receives_matching_publish() {
    let bus = FakeBus::new();
    let mut rx = bus.subscribe("worker.task.w1").await.unwrap();
    bus.publish("worker.task.w1", b"hello".to_vec()).await.unwrap();
    let envelope = rx.recv().await.unwrap();
    assert_eq!(envelope.payload, b"hello");
}

#[tokio::test]
async fn wildcard_pattern_matches_one_segment() {
    let bus = FakeBus::new();
    let mut rx = bus.subscribe("task.progress.*").await.unwrap();
    bus.publish("task.progress.t1", b"p".to_vec()).await.unwrap();
    assert!(rx.recv().await.is_some());
}

#[tokio::test]
async fn wildcard_does_not_match_extra_segments() {
    let bus = FakeBus::new();
    let mut rx = bus.subscribe("task.progress.*").await.unwrap();
    bus.publish("task.progress.t1.extra", b"p".to_vec()).await.unwrap();
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn request_returns_programmed_response() {
    let bus = FakeBus::new();
    bus.set_request_response("manager.question.w1", b"answer".to_vec());
    let reply = bus
        .request("manager.question.w1", b"q".to_vec(), std::time::Duration::from_millis(10))
        .await
        .unwrap();
    assert_eq!(reply, b"answer");
}

#[tokio::test]
async fn request_without_programmed_response_times_out() {
    let bus = FakeBus::new();
    let err = bus
        .request("manager.question.w1", b"q".to_vec(), std::time::Duration::from_millis(10))
        .await
        .unwrap_err();
    assert_eq!(err.kind, AdapterErrorKind::Timeout);
}

#[tokio::test]
async fn calls_are_recorded() {
    let bus = FakeBus::new();
    bus.publish("x", vec![]).await.unwrap();
    assert_eq!(bus.calls().len(), 1);
}
