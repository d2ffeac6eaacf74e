//! Publish/subscribe channel for engine notifications.
//!
//! Front ends subscribe and receive every state change as a typed
//! [`EngineEvent`]. Each subscriber gets its own bounded crossbeam channel; a
//! subscriber that stops draining loses events instead of stalling the
//! engine, and dropped receivers are pruned on the next publish.

use chrono::NaiveDateTime;
use crossbeam_channel::{Receiver, Sender, TrySendError};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::util::{OrderId, ParkingCode, SpotId, SubscriberId};

/// State change published by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EngineEvent {
    /// A slot was booked.
    Reserved {
        /// Order id.
        order_id: OrderId,
        /// Owner.
        subscriber_id: SubscriberId,
        /// Credential for the booking.
        parking_code: ParkingCode,
        /// Booked slot.
        slot: NaiveDateTime,
    },
    /// A walk-in was admitted.
    Entered {
        /// Order id.
        order_id: OrderId,
        /// Owner.
        subscriber_id: SubscriberId,
        /// Assigned spot.
        spot: SpotId,
    },
    /// A reservation started occupying a spot.
    Activated {
        /// Order id.
        order_id: OrderId,
        /// Owner.
        subscriber_id: SubscriberId,
        /// Assigned spot.
        spot: SpotId,
    },
    /// An active session was extended.
    Extended {
        /// Order id.
        order_id: OrderId,
        /// Owner.
        subscriber_id: SubscriberId,
        /// New expected exit.
        expected_exit: NaiveDateTime,
    },
    /// A session ended.
    Exited {
        /// Order id.
        order_id: OrderId,
        /// Owner.
        subscriber_id: SubscriberId,
        /// Freed spot.
        spot: SpotId,
        /// Left after the expected exit.
        late: bool,
    },
    /// A reservation was cancelled by its owner.
    Cancelled {
        /// Order id.
        order_id: OrderId,
        /// Owner.
        subscriber_id: SubscriberId,
    },
    /// A reservation lapsed unactivated.
    Expired {
        /// Order id.
        order_id: OrderId,
        /// Owner.
        subscriber_id: SubscriberId,
    },
    /// Free capacity changed.
    AvailabilityChanged {
        /// Spots free.
        available: u32,
        /// Facility capacity.
        total: u32,
    },
}

impl EngineEvent {
    /// Short action name used by the audit trail.
    pub const fn action(&self) -> &'static str {
        match self {
            Self::Reserved { .. } => "reserve",
            Self::Entered { .. } => "enter",
            Self::Activated { .. } => "activate",
            Self::Extended { .. } => "extend",
            Self::Exited { .. } => "exit",
            Self::Cancelled { .. } => "cancel",
            Self::Expired { .. } => "expire",
            Self::AvailabilityChanged { .. } => "availability",
        }
    }

    /// Order the event refers to, if any.
    pub const fn order_id(&self) -> Option<OrderId> {
        match self {
            Self::Reserved { order_id, .. }
            | Self::Entered { order_id, .. }
            | Self::Activated { order_id, .. }
            | Self::Extended { order_id, .. }
            | Self::Exited { order_id, .. }
            | Self::Cancelled { order_id, .. }
            | Self::Expired { order_id, .. } => Some(*order_id),
            Self::AvailabilityChanged { .. } => None,
        }
    }

    /// Subscriber the event refers to, if any.
    pub const fn subscriber_id(&self) -> Option<SubscriberId> {
        match self {
            Self::Reserved { subscriber_id, .. }
            | Self::Entered { subscriber_id, .. }
            | Self::Activated { subscriber_id, .. }
            | Self::Extended { subscriber_id, .. }
            | Self::Exited { subscriber_id, .. }
            | Self::Cancelled { subscriber_id, .. }
            | Self::Expired { subscriber_id, .. } => Some(*subscriber_id),
            Self::AvailabilityChanged { .. } => None,
        }
    }
}

/// Fan-out of engine events to any number of subscribers.
#[derive(Debug)]
pub struct EventBus {
    capacity: usize,
    subscribers: Mutex<Vec<Sender<EngineEvent>>>,
}

impl EventBus {
    /// Bus whose per-subscriber buffers hold `capacity` events.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            subscribers: Mutex::new(Vec::new()),
        }
    }

    /// Register a new subscriber.
    pub fn subscribe(&self) -> Receiver<EngineEvent> {
        let (tx, rx) = crossbeam_channel::bounded(self.capacity);
        self.subscribers.lock().push(tx);
        rx
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }

    /// Deliver `event` to every subscriber without blocking.
    pub fn publish(&self, event: &EngineEvent) {
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|tx| match tx.try_send(event.clone()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                tracing::debug!(action = event.action(), "event dropped for slow subscriber");
                true
            }
            Err(TrySendError::Disconnected(_)) => false,
        });
    }
}
