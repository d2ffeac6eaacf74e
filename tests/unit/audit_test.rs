//! Tests for audit sink

use std::sync::Arc;

use bpark_engine::builders::EngineBuilder;
use bpark_engine::config::EngineConfig;
use bpark_engine::core::{build_audit_event, AuditSink, EngineEvent, InMemoryAuditSink, Role};
use bpark_engine::util::{ManualClock, SpotId};
use parking_lot::Mutex;

use crate::common::{at, profile};

fn entered(order_id: u64) -> EngineEvent {
    EngineEvent::Entered {
        order_id,
        subscriber_id: 1,
        spot: SpotId(1),
    }
}

#[test]
fn test_in_memory_audit_sink() {
    let mut sink = InMemoryAuditSink::new(10);
    sink.record(build_audit_event(&entered(1), at(1, 8, 0)));

    let events = sink.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].order_id, Some(1));
    assert_eq!(events[0].subscriber_id, Some(1));
    assert_eq!(events[0].action, "enter");
}

#[test]
fn test_audit_sink_overflow() {
    let mut sink = InMemoryAuditSink::new(2);
    for id in 1..=3 {
        sink.record(build_audit_event(&entered(id), at(1, 8, 0)));
    }
    let events = sink.events();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].order_id, Some(2));
    assert_eq!(events[1].order_id, Some(3));
}

#[test]
fn test_build_audit_event() {
    let event = build_audit_event(
        &EngineEvent::AvailabilityChanged {
            available: 4,
            total: 10,
        },
        at(1, 9, 0),
    );
    assert_eq!(event.action, "availability");
    assert_eq!(event.order_id, None);
    assert_eq!(event.created_at, at(1, 9, 0));
    assert!(!event.event_id.is_empty());
    let payload = event.payload.expect("payload");
    assert!(payload.contains("\"event\":\"availability_changed\""));
}

#[test]
fn test_engine_writes_audit_trail() {
    let sink = Arc::new(Mutex::new(InMemoryAuditSink::new(100)));
    let engine = EngineBuilder::new(EngineConfig::default())
        .with_clock(Arc::new(ManualClock::new(at(1, 8, 0))))
        .with_audit(Box::new(sink.clone()))
        .build()
        .expect("engine");
    let sub = engine
        .register_subscriber(profile("Noa", Role::Subscriber))
        .expect("register");
    let (code, _) = engine.enter_spontaneous(sub.id).expect("enter");
    engine.exit(&code).expect("exit");

    let actions: Vec<_> = sink.lock().events().into_iter().map(|e| e.action).collect();
    assert_eq!(actions, ["enter", "availability", "exit", "availability"]);
}
