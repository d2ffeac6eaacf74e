//! Admission control.
//!
//! Decides at arrival time whether a vehicle may take a spot. Walk-ins pass
//! the availability threshold and leave room for bookings due during their
//! stay; booked arrivals must fall inside the grace window around their slot.

use chrono::{NaiveDateTime, TimeDelta};

use crate::core::error::log_failure;
use crate::core::{Engine, EngineError, EngineEvent, EngineResult, Session, SessionStatus};
use crate::util::{OrderId, ParkingCode, SpotId, SubscriberId};

impl Engine {
    /// Admit a walk-in arrival. Returns the new session's parking code and
    /// the spot it was given.
    pub fn enter_spontaneous(&self, subscriber: SubscriberId) -> EngineResult<(ParkingCode, SpotId)> {
        self.try_enter_spontaneous(subscriber)
            .inspect_err(|e| log_failure("enter_spontaneous", e))
    }

    fn try_enter_spontaneous(&self, subscriber: SubscriberId) -> EngineResult<(ParkingCode, SpotId)> {
        self.require_subscriber(subscriber)?;
        let session = {
            let _admission = self.admission_lock.lock();
            self.ensure_not_parked(subscriber, None)?;
            let now = self.now();
            let held = self.arrivals_due(now);
            let spot = self.pool.try_admit(self.policy.min_available_percent, held)?;
            let expected_exit = now + self.session_length();
            let inserted = self.store.insert_with(|id, code| {
                Session::spontaneous(id, code, subscriber, spot, now, expected_exit)
            });
            match inserted {
                Ok(session) => session,
                Err(e) => {
                    self.give_back(spot);
                    return Err(e);
                }
            }
        };
        let spot = session.spot.ok_or_else(|| EngineError::Internal("walk-in without spot".into()))?;
        self.attach_order(subscriber, session.order_id);
        tracing::info!(order_id = session.order_id, subscriber, %spot, "walk-in admitted");
        self.emit(EngineEvent::Entered {
            order_id: session.order_id,
            subscriber_id: subscriber,
            spot,
        });
        self.emit_availability();
        Ok((session.parking_code, spot))
    }

    /// Activate a booked session on arrival and assign it a spot.
    pub fn activate_reservation(&self, code: &ParkingCode) -> EngineResult<SpotId> {
        self.try_activate(code)
            .inspect_err(|e| log_failure("activate_reservation", e))
    }

    fn try_activate(&self, code: &ParkingCode) -> EngineResult<SpotId> {
        let id = self.store.order_for_code(code)?;
        let subscriber = self
            .store
            .get(id)
            .ok_or(EngineError::CodeNotFound)?
            .subscriber_id;

        let admission = self.admission_lock.lock();
        self.ensure_not_parked(subscriber, Some(id))?;
        let now = self.now();
        let before = TimeDelta::minutes(self.policy.activation_grace_before_mins);
        let after = TimeDelta::minutes(self.policy.activation_grace_after_mins);
        let mut taken = None;
        let result = self.store.update(id, |s| {
            match s.status {
                SessionStatus::Reserved => {}
                SessionStatus::Active => return Err(EngineError::AlreadyActivated),
                SessionStatus::Cancelled => return Err(EngineError::AlreadyCancelled),
                SessionStatus::Completed | SessionStatus::CompletedLate => {
                    return Err(EngineError::AlreadyExited)
                }
            }
            let start = s
                .estimated_start
                .ok_or_else(|| EngineError::Internal(format!("order {id}: reserved without slot")))?;
            if now < start - before {
                return Err(EngineError::ActivationTooEarly);
            }
            if now > start + after {
                return Err(EngineError::WindowExpired);
            }
            let spot = self.pool.reserve_capacity()?;
            taken = Some(spot);
            s.status = SessionStatus::Active;
            s.entry_time = Some(now);
            s.expected_exit = Some(now + self.session_length());
            s.spot = Some(spot);
            Ok(spot)
        });
        let spot = match result {
            Ok(spot) => spot,
            Err(e) => {
                if let Some(spot) = taken {
                    self.give_back(spot);
                }
                return Err(e);
            }
        };
        drop(admission);

        tracing::info!(order_id = id, subscriber, %spot, "reservation activated");
        self.emit(EngineEvent::Activated {
            order_id: id,
            subscriber_id: subscriber,
            spot,
        });
        self.emit_availability();
        Ok(spot)
    }

    /// Booked sessions not yet activated whose activation window overlaps a
    /// stay of default length starting at `now`. A walk-in admitted now must
    /// leave a spot free for each of them.
    fn arrivals_due(&self, now: NaiveDateTime) -> u32 {
        let before = TimeDelta::minutes(self.policy.activation_grace_before_mins);
        let after = TimeDelta::minutes(self.policy.activation_grace_after_mins);
        let stay_end = now + self.session_length();
        let due = self.store.count_matching(|s| {
            s.status == SessionStatus::Reserved
                && s.estimated_start
                    .is_some_and(|start| start + after >= now && start - before < stay_end)
        });
        u32::try_from(due).unwrap_or(u32::MAX)
    }

    /// Fail with `AlreadyParked` if the subscriber occupies a spot through
    /// any order other than `except`.
    fn ensure_not_parked(&self, subscriber: SubscriberId, except: Option<OrderId>) -> EngineResult<()> {
        let parked = self
            .store
            .for_subscriber(subscriber)
            .iter()
            .any(|s| s.is_currently_parked() && Some(s.order_id) != except);
        if parked {
            Err(EngineError::AlreadyParked)
        } else {
            Ok(())
        }
    }

    pub(super) fn session_length(&self) -> TimeDelta {
        TimeDelta::hours(i64::from(self.policy.default_session_hours))
    }

    /// Return a spot taken by a transition that did not commit.
    pub(super) fn give_back(&self, spot: SpotId) {
        if let Err(e) = self.pool.release_capacity(spot) {
            tracing::error!(%spot, error = %e, "failed to return spot after aborted transition");
        }
    }
}
