//! Parking session (order) records.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::util::{OrderId, ParkingCode, SpotId, SubscriberId};

/// How the session came to exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderKind {
    /// Walk-in arrival admitted on the spot.
    Spontaneous,
    /// Booked ahead for a time slot.
    Reserved,
}

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Booked, not yet activated.
    Reserved,
    /// Occupying a spot.
    Active,
    /// Exited on time.
    Completed,
    /// Exited after the expected exit time.
    CompletedLate,
    /// Reservation withdrawn or expired before activation.
    Cancelled,
}

impl SessionStatus {
    /// Terminal states never change again.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::CompletedLate | Self::Cancelled)
    }

    /// Completed either on time or late.
    pub const fn is_finished(self) -> bool {
        matches!(self, Self::Completed | Self::CompletedLate)
    }
}

/// A parking session as held by the session store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Unique order id.
    pub order_id: OrderId,
    /// Credential handed to the subscriber.
    pub parking_code: ParkingCode,
    /// Owning subscriber.
    pub subscriber_id: SubscriberId,
    /// Spontaneous or reserved.
    pub kind: OrderKind,
    /// Current lifecycle state.
    pub status: SessionStatus,
    /// When the record was created.
    pub created_at: NaiveDateTime,
    /// Booked slot start, reserved sessions only.
    pub estimated_start: Option<NaiveDateTime>,
    /// Moment the session started occupying a spot.
    pub entry_time: Option<NaiveDateTime>,
    /// Moment the vehicle left.
    pub exit_time: Option<NaiveDateTime>,
    /// Entry plus booked duration plus extensions.
    pub expected_exit: Option<NaiveDateTime>,
    /// Set once at exit.
    pub is_late: bool,
    /// Set by the first successful extension and never cleared.
    pub is_extended: bool,
    /// Hours granted across all extensions.
    pub extension_hours: u32,
    /// Number of granted extensions.
    pub extension_count: u32,
    /// Spot held while active; kept afterwards for history.
    pub spot: Option<SpotId>,
}

impl Session {
    /// New booked session awaiting activation.
    pub fn reserved(
        order_id: OrderId,
        parking_code: ParkingCode,
        subscriber_id: SubscriberId,
        slot: NaiveDateTime,
        now: NaiveDateTime,
    ) -> Self {
        Self {
            order_id,
            parking_code,
            subscriber_id,
            kind: OrderKind::Reserved,
            status: SessionStatus::Reserved,
            created_at: now,
            estimated_start: Some(slot),
            entry_time: None,
            exit_time: None,
            expected_exit: None,
            is_late: false,
            is_extended: false,
            extension_hours: 0,
            extension_count: 0,
            spot: None,
        }
    }

    /// New walk-in session that is active from `now`.
    pub fn spontaneous(
        order_id: OrderId,
        parking_code: ParkingCode,
        subscriber_id: SubscriberId,
        spot: SpotId,
        now: NaiveDateTime,
        expected_exit: NaiveDateTime,
    ) -> Self {
        Self {
            order_id,
            parking_code,
            subscriber_id,
            kind: OrderKind::Spontaneous,
            status: SessionStatus::Active,
            created_at: now,
            estimated_start: None,
            entry_time: Some(now),
            exit_time: None,
            expected_exit: Some(expected_exit),
            is_late: false,
            is_extended: false,
            extension_hours: 0,
            extension_count: 0,
            spot: Some(spot),
        }
    }

    /// Minutes parked so far, or in total once exited. Zero before entry.
    pub fn duration_minutes(&self, now: NaiveDateTime) -> i64 {
        self.entry_time.map_or(0, |entry| {
            let end = self.exit_time.unwrap_or(now);
            (end - entry).num_minutes().max(0)
        })
    }

    /// Vehicle is in the facility right now.
    pub fn is_currently_parked(&self) -> bool {
        self.status == SessionStatus::Active && self.exit_time.is_none()
    }

    /// Whether the session was booked ahead.
    pub fn is_reservation(&self) -> bool {
        self.kind == OrderKind::Reserved
    }

    /// Check the record-level invariants. Returns a description of the first
    /// violation found.
    pub fn check_invariants(&self) -> Result<(), String> {
        let id = self.order_id;
        match self.status {
            SessionStatus::Reserved => {
                if self.entry_time.is_some() || self.exit_time.is_some() || self.spot.is_some() {
                    return Err(format!("order {id}: reserved session has entry, exit or spot"));
                }
                if self.estimated_start.is_none() {
                    return Err(format!("order {id}: reserved session without slot"));
                }
            }
            SessionStatus::Active => {
                if self.entry_time.is_none() || self.expected_exit.is_none() || self.spot.is_none() {
                    return Err(format!("order {id}: active session missing entry, expected exit or spot"));
                }
                if self.exit_time.is_some() {
                    return Err(format!("order {id}: active session has exit time"));
                }
            }
            SessionStatus::Completed | SessionStatus::CompletedLate => {
                let (Some(entry), Some(exit)) = (self.entry_time, self.exit_time) else {
                    return Err(format!("order {id}: finished session missing entry or exit"));
                };
                if exit < entry {
                    return Err(format!("order {id}: exit precedes entry"));
                }
                if self.is_late != (self.status == SessionStatus::CompletedLate) {
                    return Err(format!("order {id}: late flag disagrees with status"));
                }
            }
            SessionStatus::Cancelled => {
                if self.entry_time.is_some() || self.exit_time.is_some() {
                    return Err(format!("order {id}: cancelled session was activated"));
                }
            }
        }
        if self.is_extended != (self.extension_count > 0) {
            return Err(format!("order {id}: extension flag disagrees with count"));
        }
        Ok(())
    }
}
