//! Audit sink implementations.
//!
//! Every published engine event is also written to the attached audit sink,
//! giving an append-only trail of session transitions.

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::NaiveDateTime;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::core::EngineEvent;
use crate::util::{OrderId, SubscriberId};

/// Audit event structure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Event identifier.
    pub event_id: String,
    /// Related order, if any.
    pub order_id: Option<OrderId>,
    /// Related subscriber, if any.
    pub subscriber_id: Option<SubscriberId>,
    /// Action taken (reserve, enter, activate, extend, exit, cancel, expire).
    pub action: String,
    /// Engine time of the transition.
    pub created_at: NaiveDateTime,
    /// Serialized event body.
    pub payload: Option<String>,
}

/// Audit sink abstraction.
pub trait AuditSink: Send {
    /// Record an audit event.
    fn record(&mut self, event: AuditEvent);
}

/// In-memory audit sink for testing and dev.
#[derive(Debug)]
pub struct InMemoryAuditSink {
    events: VecDeque<AuditEvent>,
    max_events: usize,
}

impl InMemoryAuditSink {
    /// Create a new in-memory sink with a bounded buffer.
    pub fn new(max_events: usize) -> Self {
        Self {
            events: VecDeque::with_capacity(max_events),
            max_events,
        }
    }

    /// Retrieve a snapshot of stored events.
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.iter().cloned().collect()
    }
}

impl AuditSink for InMemoryAuditSink {
    fn record(&mut self, event: AuditEvent) {
        if self.max_events == 0 {
            return;
        }
        if self.events.len() >= self.max_events {
            self.events.pop_front();
        }
        self.events.push_back(event);
    }
}

/// Shared sink, so the owner can read events back while the engine writes.
impl<S: AuditSink> AuditSink for Arc<Mutex<S>> {
    fn record(&mut self, event: AuditEvent) {
        self.lock().record(event);
    }
}

/// Sink that mirrors audit events into the tracing pipeline.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&mut self, event: AuditEvent) {
        tracing::info!(
            target: "bpark_engine::audit",
            event_id = %event.event_id,
            order_id = ?event.order_id,
            subscriber_id = ?event.subscriber_id,
            action = %event.action,
            at = %event.created_at,
            "audit"
        );
    }
}

/// Helper to build an audit event from an engine event.
pub fn build_audit_event(event: &EngineEvent, at: NaiveDateTime) -> AuditEvent {
    AuditEvent {
        event_id: uuid::Uuid::new_v4().to_string(),
        order_id: event.order_id(),
        subscriber_id: event.subscriber_id(),
        action: event.action().to_string(),
        created_at: at,
        payload: serde_json::to_string(event).ok(),
    }
}
