//! In-memory store backend.

use std::collections::BTreeMap;

use parking_lot::Mutex;

use crate::core::{EngineResult, LoadedState, Session, StoreBackend, Subscriber};
use crate::util::{OrderId, SubscriberId};

/// Keeps the latest version of every record in memory.
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    sessions: Mutex<BTreeMap<OrderId, Session>>,
    subscribers: Mutex<BTreeMap<SubscriberId, Subscriber>>,
}

impl InMemoryBackend {
    /// Create an empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored sessions.
    pub fn session_count(&self) -> usize {
        self.sessions.lock().len()
    }

    /// Latest stored version of an order.
    pub fn session(&self, id: OrderId) -> Option<Session> {
        self.sessions.lock().get(&id).cloned()
    }

    /// Latest stored version of a subscriber.
    pub fn subscriber(&self, id: SubscriberId) -> Option<Subscriber> {
        self.subscribers.lock().get(&id).cloned()
    }
}

impl StoreBackend for InMemoryBackend {
    fn load(&self) -> EngineResult<LoadedState> {
        Ok(LoadedState {
            sessions: self.sessions.lock().values().cloned().collect(),
            subscribers: self.subscribers.lock().values().cloned().collect(),
        })
    }

    fn persist_session(&self, session: &Session) -> EngineResult<()> {
        self.sessions.lock().insert(session.order_id, session.clone());
        Ok(())
    }

    fn persist_subscriber(&self, subscriber: &Subscriber) -> EngineResult<()> {
        self.subscribers
            .lock()
            .insert(subscriber.id, subscriber.clone());
        Ok(())
    }
}
