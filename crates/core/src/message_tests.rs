use super::*;

#[test]
fn serde_tag_matches_wire_name() {
    let msg = BusMessage::TaskRejected {
        task_id: TaskId::new("t1"),
        worker_id: WorkerId::new("w1"),
        reason: "at capacity".into(),
        rejected_at_ms: 10,
    };
    let value = serde_json::to_value(&msg).unwrap();
    assert_eq!(value["type"], "task:rejected");
    assert_eq!(value["reason"], "at capacity");
}

#[test]
fn unknown_type_tag_deserializes_to_custom() {
    let raw = serde_json::json!({"type": "future:thing", "whatever": 1});
    let msg: BusMessage = serde_json::from_value(raw).unwrap();
    assert!(matches!(msg, BusMessage::Custom));
}

#[test]
fn worker_id_accessor_covers_worker_scoped_variants() {
    let msg = BusMessage::WorkerHeartbeat {
        worker_id: WorkerId::new("w1"),
        current_load: 2,
        system_info: WorkerSystemInfo::default(),
        sent_at_ms: 0,
    };
    assert_eq!(msg.worker_id(), Some(&WorkerId::new("w1")));
    assert_eq!(msg.name(), "worker:heartbeat");
}

#[test]
fn broadcast_has_no_single_worker_id() {
    let msg = BusMessage::WorkerBroadcast {
        message: "pause for maintenance".into(),
        target_session_ids: vec![],
        sent_at_ms: 0,
    };
    assert_eq!(msg.worker_id(), None);
}

#[test]
fn roundtrips_through_json() {
    let msg = BusMessage::TaskCompletion {
        task_id: TaskId::new("t1"),
        worker_id: WorkerId::new("w1"),
        success: true,
        result_blob: Some(serde_json::json!({"ok": true})),
        error_message: None,
        execution_time_ms: 1200,
        completed_at_ms: 5000,
    };
    let json_str = serde_json::to_string(&msg).unwrap();
    let parsed: BusMessage = serde_json::from_str(&json_str).unwrap();
    assert_eq!(parsed.name(), "task:completion");
}
