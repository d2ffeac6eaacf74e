//! Engine facade.
//!
//! [`Engine`] owns the spot pool, session store, subscriber registry and
//! reservation scheduler. Admission, lifecycle and reporting operations are
//! implemented in their own modules as further `impl Engine` blocks. There
//! is no global state: callers hold an `Engine` (usually in an `Arc`) and
//! pass a [`RequestContext`] describing who is asking.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{NaiveDateTime, NaiveTime};
use crossbeam_channel::Receiver;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::config::{LotConfig, PolicyConfig};
use crate::core::{
    build_audit_event, AuditSink, Availability, ContactUpdate, EngineError, EngineEvent, EngineResult, EventBus,
    ReservationScheduler, Role, Session, SessionStatus, SessionStore, SpotPool, StoreBackend,
    Subscriber, SubscriberProfile, SubscriberRegistry,
};
use crate::util::{Clock, OrderId, SubscriberId};

/// Front end a request arrived through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    /// Subscriber application.
    #[default]
    App,
    /// On-site kiosk.
    Kiosk,
    /// Attendant or manager desk.
    Desk,
}

/// Identity of the caller, supplied per request by the transport layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestContext {
    /// Authenticated caller.
    pub caller: SubscriberId,
    /// Caller's role.
    pub role: Role,
    /// Front end in use.
    #[serde(default)]
    pub channel: Channel,
}

impl RequestContext {
    /// Context for a subscriber acting on their own behalf.
    pub const fn subscriber(caller: SubscriberId) -> Self {
        Self {
            caller,
            role: Role::Subscriber,
            channel: Channel::App,
        }
    }

    /// Context for a kiosk session opened by `caller`.
    pub const fn kiosk(caller: SubscriberId) -> Self {
        Self {
            caller,
            role: Role::Subscriber,
            channel: Channel::Kiosk,
        }
    }

    /// Context for a staff member.
    pub const fn staff(caller: SubscriberId, role: Role) -> Self {
        Self {
            caller,
            role,
            channel: Channel::Desk,
        }
    }

    /// Subscribers may only act on themselves; staff may act on anyone.
    pub fn authorize_subscriber(&self, subscriber: SubscriberId) -> EngineResult<()> {
        if self.role.is_staff() || self.caller == subscriber {
            Ok(())
        } else {
            Err(EngineError::Forbidden(format!(
                "subscriber {} may not act for subscriber {subscriber}",
                self.caller
            )))
        }
    }

    /// Require one of the listed roles.
    pub fn require_role(&self, allowed: &[Role]) -> EngineResult<()> {
        if allowed.contains(&self.role) {
            Ok(())
        } else {
            Err(EngineError::Forbidden(format!(
                "role {:?} may not perform this operation",
                self.role
            )))
        }
    }
}

/// Aggregate status for dashboards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemStatus {
    /// Spot availability.
    pub availability: Availability,
    /// Sessions currently occupying a spot.
    pub active_sessions: usize,
    /// Reservations awaiting activation.
    pub pending_reservations: usize,
    /// Registered subscribers.
    pub subscribers: usize,
    /// Engine time of the snapshot.
    pub at: NaiveDateTime,
}

/// Parking-session admission and lifecycle engine.
pub struct Engine {
    pub(super) policy: PolicyConfig,
    pub(super) pool: SpotPool,
    pub(super) store: SessionStore,
    pub(super) registry: SubscriberRegistry,
    pub(super) scheduler: ReservationScheduler,
    pub(super) clock: Arc<dyn Clock>,
    pub(super) events: EventBus,
    audit: Option<Mutex<Box<dyn AuditSink>>>,
    /// Serializes walk-in admissions so the per-subscriber check and the
    /// session insert cannot interleave.
    pub(super) admission_lock: Mutex<()>,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("pool", &self.pool)
            .field("store", &self.store)
            .field("scheduler", &self.scheduler)
            .finish_non_exhaustive()
    }
}

impl Engine {
    /// Build an engine over `backend`, rebuilding pool occupancy and slot
    /// counters from whatever the backend already holds.
    pub fn new(
        lot: &LotConfig,
        policy: PolicyConfig,
        backend: Arc<dyn StoreBackend>,
        clock: Arc<dyn Clock>,
    ) -> EngineResult<Self> {
        policy.validate().map_err(EngineError::InvalidRequest)?;
        if lot.total_spots == 0 {
            return Err(EngineError::InvalidRequest(
                "total_spots must be greater than 0".into(),
            ));
        }
        let loaded = backend.load()?;
        let engine = Self {
            pool: SpotPool::new(lot.total_spots),
            store: SessionStore::new(backend),
            registry: SubscriberRegistry::new(),
            scheduler: ReservationScheduler::new(&policy, lot.total_spots),
            events: EventBus::new(policy.event_buffer),
            policy,
            clock,
            audit: None,
            admission_lock: Mutex::new(()),
        };

        engine.registry.restore(loaded.subscribers);
        let sessions = loaded.sessions;
        let today = engine.clock.now().date().and_time(NaiveTime::MIN);
        for session in &sessions {
            if session.status == SessionStatus::Active {
                let spot = session.spot.ok_or_else(|| {
                    EngineError::Internal(format!(
                        "order {}: active without spot",
                        session.order_id
                    ))
                })?;
                engine.pool.restore(spot)?;
            }
            if let Some(slot) = session.estimated_start {
                if session.status != SessionStatus::Cancelled && slot >= today {
                    engine.scheduler.restore(slot);
                }
            }
            if engine.registry.contains(session.subscriber_id) {
                engine
                    .registry
                    .record_order(session.subscriber_id, session.order_id, |_| Ok(()))?;
            }
        }
        let restored = sessions.len();
        engine.store.restore(sessions)?;
        if restored > 0 {
            let availability = engine.pool.availability();
            tracing::info!(
                sessions = restored,
                available = availability.available,
                total = availability.total,
                "engine state restored"
            );
        }
        Ok(engine)
    }

    /// Attach an audit sink.
    #[must_use]
    pub fn with_audit(mut self, audit: Box<dyn AuditSink>) -> Self {
        self.audit = Some(Mutex::new(audit));
        self
    }

    /// Active policy.
    pub const fn policy(&self) -> &PolicyConfig {
        &self.policy
    }

    /// Engine time.
    pub fn now(&self) -> NaiveDateTime {
        self.clock.now()
    }

    /// Spot pool.
    pub const fn pool(&self) -> &SpotPool {
        &self.pool
    }

    /// Session store.
    pub const fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Subscriber registry.
    pub const fn registry(&self) -> &SubscriberRegistry {
        &self.registry
    }

    /// Reservation scheduler.
    pub const fn scheduler(&self) -> &ReservationScheduler {
        &self.scheduler
    }

    /// Current availability.
    pub fn availability(&self) -> Availability {
        self.pool.availability()
    }

    /// Subscribe to engine events.
    pub fn subscribe(&self) -> Receiver<EngineEvent> {
        self.events.subscribe()
    }

    /// Publish an event and write it to the audit trail.
    pub(super) fn emit(&self, event: EngineEvent) {
        if let Some(audit) = &self.audit {
            audit.lock().record(build_audit_event(&event, self.clock.now()));
        }
        self.events.publish(&event);
    }

    /// Publish the current availability.
    pub(super) fn emit_availability(&self) {
        let a = self.pool.availability();
        self.emit(EngineEvent::AvailabilityChanged {
            available: a.available,
            total: a.total,
        });
    }

    /// Ensure the subscriber exists.
    pub(super) fn require_subscriber(&self, id: SubscriberId) -> EngineResult<()> {
        if self.registry.contains(id) {
            Ok(())
        } else {
            Err(EngineError::UnknownSubscriber(id))
        }
    }

    /// Append an order to its owner's history and persist the owner.
    pub(super) fn attach_order(&self, subscriber: SubscriberId, order: OrderId) {
        let backend = self.store.backend();
        if let Err(e) = self
            .registry
            .record_order(subscriber, order, |sub| backend.persist_subscriber(sub))
        {
            tracing::error!(subscriber, order, error = %e, "history append failed");
        }
    }

    /// Register a new subscriber.
    pub fn register_subscriber(&self, profile: SubscriberProfile) -> EngineResult<Subscriber> {
        let sub = self.registry.register(profile)?;
        self.store.backend().persist_subscriber(&sub)?;
        tracing::info!(subscriber = sub.id, role = ?sub.role, "subscriber registered");
        Ok(sub)
    }

    /// Register a subscriber with a fixed id and code unless already present.
    pub fn seed_subscriber(
        &self,
        id: SubscriberId,
        subscriber_code: String,
        profile: SubscriberProfile,
    ) -> EngineResult<Subscriber> {
        if let Ok(existing) = self.registry.get(id) {
            return Ok(existing);
        }
        let sub = Subscriber::from_profile(id, subscriber_code, profile);
        self.registry.insert(sub.clone())?;
        self.store.backend().persist_subscriber(&sub)?;
        Ok(sub)
    }

    /// Update a subscriber's contact fields.
    pub fn update_subscriber(
        &self,
        id: SubscriberId,
        update: ContactUpdate,
    ) -> EngineResult<Subscriber> {
        let backend = self.store.backend();
        self.registry
            .update_contact(id, update, |sub| backend.persist_subscriber(sub))
    }

    /// Look up a subscriber.
    pub fn subscriber(&self, id: SubscriberId) -> EngineResult<Subscriber> {
        self.registry.get(id)
    }

    /// Every session the subscriber has made, oldest first.
    pub fn history(&self, id: SubscriberId) -> EngineResult<Vec<Session>> {
        let sub = self.registry.get(id)?;
        Ok(self.store.get_many(&sub.history))
    }

    /// Sessions currently occupying a spot.
    pub fn active_sessions(&self) -> Vec<Session> {
        self.store
            .snapshot()
            .into_iter()
            .filter(Session::is_currently_parked)
            .collect()
    }

    /// Dashboard status.
    pub fn system_status(&self) -> SystemStatus {
        let sessions = self.store.snapshot();
        SystemStatus {
            availability: self.pool.availability(),
            active_sessions: sessions
                .iter()
                .filter(|s| s.status == SessionStatus::Active)
                .count(),
            pending_reservations: sessions
                .iter()
                .filter(|s| s.status == SessionStatus::Reserved)
                .count(),
            subscribers: self.registry.len(),
            at: self.clock.now(),
        }
    }

    /// Cross-check the pool against the store: every active session holds a
    /// distinct occupied spot and the occupied count matches.
    pub fn check_consistency(&self) -> EngineResult<()> {
        let sessions = self.store.snapshot();
        let mut spots = HashSet::new();
        for s in sessions.iter().filter(|s| s.status == SessionStatus::Active) {
            let spot = s.spot.ok_or_else(|| {
                EngineError::Internal(format!("order {}: active without spot", s.order_id))
            })?;
            if !spots.insert(spot) {
                return Err(EngineError::Internal(format!(
                    "spot {spot} assigned to several active sessions"
                )));
            }
            if !self.pool.is_occupied(spot) {
                return Err(EngineError::Internal(format!(
                    "order {}: spot {spot} not marked occupied",
                    s.order_id
                )));
            }
        }
        for s in &sessions {
            s.check_invariants().map_err(EngineError::Internal)?;
        }
        let a = self.pool.availability();
        if a.available + a.occupied != a.total {
            return Err(EngineError::Internal("pool counters disagree".into()));
        }
        let active = u32::try_from(spots.len())
            .map_err(|_| EngineError::Internal("active session count overflow".into()))?;
        if a.occupied != active {
            return Err(EngineError::Internal(format!(
                "pool reports {} occupied but {active} sessions are active",
                a.occupied
            )));
        }
        Ok(())
    }
}
