//! Session lifecycle transitions after admission.
//!
//! `Reserved -> {Active, Cancelled}` and `Active -> {Completed, CompletedLate}`.
//! Every transition runs inside [`SessionStore::update`](crate::core::SessionStore::update),
//! so a refused or failed transition leaves the record untouched.

use chrono::{NaiveDateTime, NaiveTime, TimeDelta};
use serde::{Deserialize, Serialize};

use crate::core::error::log_failure;
use crate::core::{Engine, EngineError, EngineEvent, EngineResult, SessionStatus};
use crate::util::{OrderId, ParkingCode, SpotId, SubscriberId};

/// Outcome of a completed exit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExitReceipt {
    /// Finished order.
    pub order_id: OrderId,
    /// Spot that was freed.
    pub spot: SpotId,
    /// Exit time.
    pub exit_time: NaiveDateTime,
    /// Minutes between entry and exit.
    pub duration_minutes: i64,
    /// Exit happened after the expected exit time.
    pub late: bool,
}

impl Engine {
    /// Withdraw a reservation owned by `subscriber`.
    pub fn cancel(&self, subscriber: SubscriberId, code: &ParkingCode) -> EngineResult<()> {
        self.try_cancel(subscriber, code)
            .inspect_err(|e| log_failure("cancel", e))
    }

    fn try_cancel(&self, subscriber: SubscriberId, code: &ParkingCode) -> EngineResult<()> {
        let id = self.store.order_for_code(code)?;
        let slot = self.store.update(id, |s| {
            // Codes of other subscribers are indistinguishable from unknown ones.
            if s.subscriber_id != subscriber {
                return Err(EngineError::CodeNotFound);
            }
            if s.status != SessionStatus::Reserved {
                return Err(EngineError::NotCancellable);
            }
            s.status = SessionStatus::Cancelled;
            Ok(s.estimated_start)
        })?;
        if let Some(slot) = slot {
            self.scheduler.release(slot);
        }
        tracing::info!(order_id = id, subscriber, "reservation cancelled");
        self.emit(EngineEvent::Cancelled {
            order_id: id,
            subscriber_id: subscriber,
        });
        Ok(())
    }

    /// Push the expected exit of an active session back by `hours`.
    /// Returns the new expected exit time.
    pub fn extend(&self, code: &ParkingCode, hours: u32) -> EngineResult<NaiveDateTime> {
        self.try_extend(code, hours)
            .inspect_err(|e| log_failure("extend", e))
    }

    fn try_extend(&self, code: &ParkingCode, hours: u32) -> EngineResult<NaiveDateTime> {
        let max = self.policy.max_hours_per_extension;
        if hours == 0 || hours > max {
            return Err(EngineError::InvalidRequest(format!(
                "extension must be between 1 and {max} hours"
            )));
        }
        let id = self.store.order_for_code(code)?;
        let now = self.now();
        let window = TimeDelta::minutes(self.policy.extension_window_mins);
        let policy = &self.policy;
        let (subscriber, expected_exit) = self.store.update(id, |s| {
            if s.status != SessionStatus::Active {
                return Err(EngineError::ExtensionNotAllowed);
            }
            let expected = s
                .expected_exit
                .ok_or_else(|| EngineError::Internal(format!("order {id}: active without expected exit")))?;
            let remaining = expected - now;
            if remaining <= TimeDelta::zero() || remaining > window {
                return Err(EngineError::ExtensionNotAllowed);
            }
            if s.extension_hours + hours > policy.max_total_extension_hours
                || s.extension_count >= policy.max_extensions
            {
                return Err(EngineError::ExtensionLimitExceeded);
            }
            let extended = expected + TimeDelta::hours(i64::from(hours));
            s.expected_exit = Some(extended);
            s.extension_hours += hours;
            s.extension_count += 1;
            s.is_extended = true;
            Ok((s.subscriber_id, extended))
        })?;
        tracing::info!(order_id = id, subscriber, hours, %expected_exit, "session extended");
        self.emit(EngineEvent::Extended {
            order_id: id,
            subscriber_id: subscriber,
            expected_exit,
        });
        Ok(expected_exit)
    }

    /// Close an active session and free its spot.
    pub fn exit(&self, code: &ParkingCode) -> EngineResult<ExitReceipt> {
        self.try_exit(code).inspect_err(|e| log_failure("exit", e))
    }

    fn try_exit(&self, code: &ParkingCode) -> EngineResult<ExitReceipt> {
        let id = self.store.order_for_code(code)?;
        let now = self.now();
        let (subscriber, receipt) = self.store.update(id, |s| {
            match s.status {
                SessionStatus::Active => {}
                SessionStatus::Reserved => return Err(EngineError::NotActivated),
                SessionStatus::Cancelled => return Err(EngineError::AlreadyCancelled),
                SessionStatus::Completed | SessionStatus::CompletedLate => {
                    return Err(EngineError::AlreadyExited)
                }
            }
            let (Some(spot), Some(expected)) = (s.spot, s.expected_exit) else {
                return Err(EngineError::Internal(format!(
                    "order {id}: active without spot or expected exit"
                )));
            };
            let late = now > expected;
            s.exit_time = Some(now);
            s.is_late = late;
            s.status = if late {
                SessionStatus::CompletedLate
            } else {
                SessionStatus::Completed
            };
            let receipt = ExitReceipt {
                order_id: id,
                spot,
                exit_time: now,
                duration_minutes: s.duration_minutes(now),
                late,
            };
            Ok((s.subscriber_id, receipt))
        })?;
        self.give_back(receipt.spot);
        tracing::info!(
            order_id = id,
            subscriber,
            spot = %receipt.spot,
            minutes = receipt.duration_minutes,
            late = receipt.late,
            "session exited"
        );
        self.emit(EngineEvent::Exited {
            order_id: id,
            subscriber_id: subscriber,
            spot: receipt.spot,
            late: receipt.late,
        });
        self.emit_availability();
        Ok(receipt)
    }

    /// Parking code of the subscriber's current session: the active one if
    /// parked, otherwise the earliest reservation still open for activation.
    pub fn recover_code(&self, subscriber: SubscriberId) -> EngineResult<ParkingCode> {
        self.try_recover_code(subscriber)
            .inspect_err(|e| log_failure("recover_code", e))
    }

    fn try_recover_code(&self, subscriber: SubscriberId) -> EngineResult<ParkingCode> {
        self.require_subscriber(subscriber)?;
        let sessions = self.store.for_subscriber(subscriber);
        if let Some(active) = sessions.iter().find(|s| s.is_currently_parked()) {
            return Ok(active.parking_code.clone());
        }
        let open_from = self.now() - TimeDelta::minutes(self.policy.activation_grace_after_mins);
        sessions
            .iter()
            .filter(|s| s.status == SessionStatus::Reserved)
            .filter_map(|s| s.estimated_start.map(|start| (start, s)))
            .filter(|(start, _)| *start >= open_from)
            .min_by_key(|(start, s)| (*start, s.order_id))
            .map(|(_, s)| s.parking_code.clone())
            .ok_or(EngineError::NoActiveSession)
    }

    /// Cancel reservations whose activation window has closed and free their
    /// slot buckets. Returns how many were cancelled.
    pub fn prune_expired_reservations(&self) -> usize {
        let now = self.now();
        let after = TimeDelta::minutes(self.policy.activation_grace_after_mins);
        let expired: Vec<_> = self
            .store
            .snapshot()
            .into_iter()
            .filter(|s| s.status == SessionStatus::Reserved)
            .filter(|s| s.estimated_start.is_some_and(|start| now > start + after))
            .map(|s| s.order_id)
            .collect();

        let mut cancelled = 0;
        for id in expired {
            let outcome = self.store.update(id, |s| {
                // Re-checked under the lock; the session may have moved on.
                let skip = s.status != SessionStatus::Reserved
                    || s.estimated_start.is_none_or(|start| now <= start + after);
                if skip {
                    return Ok(None);
                }
                s.status = SessionStatus::Cancelled;
                Ok(Some((s.subscriber_id, s.estimated_start)))
            });
            match outcome {
                Ok(Some((subscriber, slot))) => {
                    if let Some(slot) = slot {
                        self.scheduler.release(slot);
                    }
                    self.emit(EngineEvent::Expired {
                        order_id: id,
                        subscriber_id: subscriber,
                    });
                    cancelled += 1;
                }
                Ok(None) => {}
                Err(e) => log_failure("prune_expired_reservations", &e),
            }
        }
        self.scheduler
            .prune_before(now.date().and_time(NaiveTime::MIN));
        if cancelled > 0 {
            tracing::warn!(cancelled, "expired reservations cancelled");
        }
        cancelled
    }
}
