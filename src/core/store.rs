//! Session store.
//!
//! Every session lives behind its own `parking_lot::Mutex`, so operations on
//! one order exclude each other without blocking unrelated orders. Writers
//! work on a draft copy and commit only when the closure, the invariant check
//! and the backend write all succeed.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::core::{EngineError, EngineResult, Session, Subscriber};
use crate::util::{OrderId, ParkingCode, SubscriberId};

/// Attempts at drawing an unused parking code before giving up.
const CODE_ATTEMPTS: usize = 64;

/// Records recovered from a backend at startup.
#[derive(Debug, Default)]
pub struct LoadedState {
    /// Latest version of each session.
    pub sessions: Vec<Session>,
    /// Latest version of each subscriber.
    pub subscribers: Vec<Subscriber>,
}

/// Durability backend behind the session store.
pub trait StoreBackend: Send + Sync {
    /// Read back everything persisted so far.
    fn load(&self) -> EngineResult<LoadedState>;
    /// Persist the new version of a session.
    fn persist_session(&self, session: &Session) -> EngineResult<()>;
    /// Persist the new version of a subscriber.
    fn persist_subscriber(&self, subscriber: &Subscriber) -> EngineResult<()>;
}

#[derive(Debug, Default)]
struct Index {
    sessions: BTreeMap<OrderId, Arc<Mutex<Session>>>,
    by_code: HashMap<ParkingCode, OrderId>,
    by_subscriber: HashMap<SubscriberId, Vec<OrderId>>,
}

/// Authoritative table of parking sessions.
pub struct SessionStore {
    index: RwLock<Index>,
    next_order: AtomicU64,
    backend: Arc<dyn StoreBackend>,
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("sessions", &self.len())
            .field("next_order", &self.next_order.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl SessionStore {
    /// Empty store writing through to `backend`.
    pub fn new(backend: Arc<dyn StoreBackend>) -> Self {
        Self {
            index: RwLock::new(Index::default()),
            next_order: AtomicU64::new(1),
            backend,
        }
    }

    /// Backend handle.
    pub fn backend(&self) -> &Arc<dyn StoreBackend> {
        &self.backend
    }

    /// Re-index sessions loaded from the backend.
    pub(crate) fn restore(&self, sessions: Vec<Session>) -> EngineResult<()> {
        let mut index = self.index.write();
        let mut max_id = 0;
        for session in sessions {
            session.check_invariants().map_err(EngineError::Internal)?;
            let id = session.order_id;
            if index
                .by_code
                .insert(session.parking_code.clone(), id)
                .is_some_and(|other| other != id)
            {
                return Err(EngineError::Internal(format!(
                    "parking code {} shared by several orders",
                    session.parking_code
                )));
            }
            let owned = index.by_subscriber.entry(session.subscriber_id).or_default();
            if !owned.contains(&id) {
                owned.push(id);
                owned.sort_unstable();
            }
            index.sessions.insert(id, Arc::new(Mutex::new(session)));
            max_id = max_id.max(id);
        }
        self.next_order.store(max_id + 1, Ordering::Release);
        Ok(())
    }

    /// Create a session with a fresh order id and an unused parking code.
    pub fn insert_with<F>(&self, build: F) -> EngineResult<Session>
    where
        F: FnOnce(OrderId, ParkingCode) -> Session,
    {
        let mut index = self.index.write();
        let mut rng = rand::rng();
        let code = (0..CODE_ATTEMPTS)
            .map(|_| ParkingCode::generate(&mut rng))
            .find(|code| !index.by_code.contains_key(code))
            .ok_or_else(|| EngineError::Internal("parking code space exhausted".into()))?;
        let id = self.next_order.fetch_add(1, Ordering::AcqRel);
        let session = build(id, code);
        if session.order_id != id {
            return Err(EngineError::Internal("session built with foreign order id".into()));
        }
        session.check_invariants().map_err(EngineError::Internal)?;
        self.backend.persist_session(&session)?;

        index.by_code.insert(session.parking_code.clone(), id);
        index
            .by_subscriber
            .entry(session.subscriber_id)
            .or_default()
            .push(id);
        index
            .sessions
            .insert(id, Arc::new(Mutex::new(session.clone())));
        Ok(session)
    }

    fn entry(&self, id: OrderId) -> Option<Arc<Mutex<Session>>> {
        self.index.read().sessions.get(&id).cloned()
    }

    /// Copy of one session.
    pub fn get(&self, id: OrderId) -> Option<Session> {
        self.entry(id).map(|slot| slot.lock().clone())
    }

    /// Order id for a parking code.
    pub fn order_for_code(&self, code: &ParkingCode) -> EngineResult<OrderId> {
        self.index
            .read()
            .by_code
            .get(code)
            .copied()
            .ok_or(EngineError::CodeNotFound)
    }

    /// Copy of the session carrying `code`.
    pub fn find_by_code(&self, code: &ParkingCode) -> EngineResult<Session> {
        let id = self.order_for_code(code)?;
        self.get(id).ok_or(EngineError::CodeNotFound)
    }

    /// Apply `f` to a draft of the session and commit it atomically.
    ///
    /// The session lock is held for the whole call; nothing is written when
    /// `f` fails, the draft breaks an invariant, or the backend refuses it.
    /// A draft equal to the current record is not sent to the backend.
    pub fn update<T, F>(&self, id: OrderId, f: F) -> EngineResult<T>
    where
        F: FnOnce(&mut Session) -> EngineResult<T>,
    {
        let slot = self.entry(id).ok_or(EngineError::CodeNotFound)?;
        let mut current = slot.lock();
        let mut draft = current.clone();
        let out = f(&mut draft)?;
        if draft.order_id != current.order_id || draft.parking_code != current.parking_code {
            return Err(EngineError::Internal(format!(
                "order {id}: identity fields changed during update"
            )));
        }
        if draft == *current {
            return Ok(out);
        }
        draft.check_invariants().map_err(EngineError::Internal)?;
        self.backend.persist_session(&draft)?;
        *current = draft;
        Ok(out)
    }

    /// Sessions owned by a subscriber, in creation order.
    pub fn for_subscriber(&self, subscriber: SubscriberId) -> Vec<Session> {
        let slots: Vec<_> = {
            let index = self.index.read();
            index
                .by_subscriber
                .get(&subscriber)
                .map(|ids| {
                    ids.iter()
                        .filter_map(|id| index.sessions.get(id).cloned())
                        .collect()
                })
                .unwrap_or_default()
        };
        slots.iter().map(|slot| slot.lock().clone()).collect()
    }

    /// Copies of the given orders, skipping unknown ids.
    pub fn get_many(&self, ids: &[OrderId]) -> Vec<Session> {
        ids.iter().filter_map(|id| self.get(*id)).collect()
    }

    /// Copy of every session, ordered by order id. Each record is cloned
    /// under its own lock, so no record is ever torn.
    pub fn snapshot(&self) -> Vec<Session> {
        let slots: Vec<_> = self.index.read().sessions.values().cloned().collect();
        slots.iter().map(|slot| slot.lock().clone()).collect()
    }

    /// Number of sessions matching `pred`, each checked under its own lock.
    pub fn count_matching<P>(&self, pred: P) -> usize
    where
        P: Fn(&Session) -> bool,
    {
        let slots: Vec<_> = self.index.read().sessions.values().cloned().collect();
        slots.iter().filter(|slot| pred(&slot.lock())).count()
    }

    /// Number of sessions ever created.
    pub fn len(&self) -> usize {
        self.index.read().sessions.len()
    }

    /// Whether the store holds no session.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
