//! Reservation scheduler.
//!
//! Bookings are taken for slot starts on a fixed grid within the advance
//! booking window. Each reservation commits one unit to every slot bucket
//! its planned stay covers; a bucket never holds more than the reservable
//! share of the facility, the rest being kept for walk-in arrivals.

use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, Timelike};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::config::PolicyConfig;
use crate::core::error::log_failure;
use crate::core::{Engine, EngineError, EngineEvent, EngineResult, Session};
use crate::util::{ParkingCode, SubscriberId};

const START_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%dT%H:%M:%S",
];

/// Remaining reservable units for one slot start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotAvailability {
    /// Slot start.
    pub start: NaiveDateTime,
    /// Reservations that can still be taken for this start.
    pub remaining: u32,
}

/// Tracks committed reservation units per slot bucket.
#[derive(Debug)]
pub struct ReservationScheduler {
    slot_minutes: u32,
    first_slot: NaiveTime,
    last_slot: NaiveTime,
    min_days: i64,
    max_days: i64,
    buckets_per_booking: u32,
    capacity: u32,
    buckets: Mutex<BTreeMap<NaiveDateTime, u32>>,
}

impl ReservationScheduler {
    /// Scheduler for a facility of `total_spots`.
    pub fn new(policy: &PolicyConfig, total_spots: u32) -> Self {
        let held_back =
            (u64::from(total_spots) * u64::from(policy.spontaneous_share_percent)).div_ceil(100);
        let capacity = u64::from(total_spots).saturating_sub(held_back).max(1);
        let stay_minutes = u64::from(policy.default_session_hours) * 60;
        let buckets_per_booking = stay_minutes.div_ceil(u64::from(policy.slot_minutes.max(1)));
        Self {
            slot_minutes: policy.slot_minutes,
            first_slot: policy.first_slot,
            last_slot: policy.last_slot,
            min_days: policy.booking_min_days,
            max_days: policy.booking_max_days,
            buckets_per_booking: u32::try_from(buckets_per_booking).unwrap_or(u32::MAX),
            capacity: u32::try_from(capacity).unwrap_or(u32::MAX),
            buckets: Mutex::new(BTreeMap::new()),
        }
    }

    /// Reservations a single bucket can hold.
    pub const fn reservable_capacity(&self) -> u32 {
        self.capacity
    }

    /// Parse a requested start such as `2024-05-02 09:15`.
    pub fn parse_start(raw: &str) -> EngineResult<NaiveDateTime> {
        let trimmed = raw.trim();
        START_FORMATS
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(trimmed, fmt).ok())
            .ok_or_else(|| {
                EngineError::InvalidRequest(format!("`{trimmed}` is not a date-time (YYYY-MM-DD HH:MM)"))
            })
    }

    fn check_day(&self, day: NaiveDate, now: NaiveDateTime) -> EngineResult<()> {
        let ahead = (day - now.date()).num_days();
        if ahead < self.min_days || ahead > self.max_days {
            return Err(EngineError::OutOfBookingWindow);
        }
        Ok(())
    }

    /// Booking-window check first, then slot grid.
    pub fn validate(&self, start: NaiveDateTime, now: NaiveDateTime) -> EngineResult<()> {
        self.check_day(start.date(), now)?;
        if start <= now {
            return Err(EngineError::OutOfBookingWindow);
        }
        let time = start.time();
        let on_grid = time.second() == 0
            && time.nanosecond() == 0
            && (time.hour() * 60 + time.minute()) % self.slot_minutes == 0;
        if !on_grid || time < self.first_slot || time > self.last_slot {
            return Err(EngineError::InvalidSlot);
        }
        Ok(())
    }

    fn covered(&self, start: NaiveDateTime) -> impl Iterator<Item = NaiveDateTime> {
        let step = i64::from(self.slot_minutes);
        (0..i64::from(self.buckets_per_booking)).map(move |i| start + TimeDelta::minutes(i * step))
    }

    /// Commit one unit to every bucket the booking covers, or none.
    pub fn commit(&self, start: NaiveDateTime) -> EngineResult<()> {
        let mut buckets = self.buckets.lock();
        if self
            .covered(start)
            .any(|b| buckets.get(&b).copied().unwrap_or(0) >= self.capacity)
        {
            return Err(EngineError::SlotUnavailable);
        }
        for bucket in self.covered(start) {
            *buckets.entry(bucket).or_insert(0) += 1;
        }
        Ok(())
    }

    /// Return the units a booking committed.
    pub fn release(&self, start: NaiveDateTime) {
        let mut buckets = self.buckets.lock();
        for bucket in self.covered(start) {
            let Some(count) = buckets.get_mut(&bucket) else {
                tracing::error!(%bucket, "slot bucket released below zero");
                continue;
            };
            *count -= 1;
            if *count == 0 {
                buckets.remove(&bucket);
            }
        }
    }

    /// Re-commit a booking loaded from the store, ignoring capacity.
    pub(crate) fn restore(&self, start: NaiveDateTime) {
        let mut buckets = self.buckets.lock();
        for bucket in self.covered(start) {
            *buckets.entry(bucket).or_insert(0) += 1;
        }
    }

    /// Bookings still possible for a slot start.
    pub fn remaining(&self, start: NaiveDateTime) -> u32 {
        let buckets = self.buckets.lock();
        self.covered(start)
            .map(|b| self.capacity.saturating_sub(buckets.get(&b).copied().unwrap_or(0)))
            .min()
            .unwrap_or(self.capacity)
    }

    /// Every slot on `date` with its remaining count.
    pub fn available_slots(&self, date: NaiveDate, now: NaiveDateTime) -> EngineResult<Vec<SlotAvailability>> {
        self.check_day(date, now)?;
        let step = TimeDelta::minutes(i64::from(self.slot_minutes));
        let last = date.and_time(self.last_slot);
        let mut start = date.and_time(self.first_slot);
        let mut slots = Vec::new();
        while start <= last {
            if start > now {
                slots.push(SlotAvailability {
                    start,
                    remaining: self.remaining(start),
                });
            }
            start += step;
        }
        Ok(slots)
    }

    /// Drop buckets that end before `cutoff`. Returns how many were dropped.
    pub fn prune_before(&self, cutoff: NaiveDateTime) -> usize {
        let mut buckets = self.buckets.lock();
        let keep = buckets.split_off(&cutoff);
        let dropped = buckets.len();
        *buckets = keep;
        dropped
    }

    /// Units committed to a bucket.
    pub fn committed(&self, bucket: NaiveDateTime) -> u32 {
        self.buckets.lock().get(&bucket).copied().unwrap_or(0)
    }
}

impl Engine {
    /// Book a slot for `subscriber` starting at `requested` and return the
    /// parking code of the new reservation.
    pub fn reserve(&self, subscriber: SubscriberId, requested: &str) -> EngineResult<ParkingCode> {
        self.try_reserve(subscriber, requested)
            .inspect_err(|e| log_failure("reserve", e))
    }

    fn try_reserve(&self, subscriber: SubscriberId, requested: &str) -> EngineResult<ParkingCode> {
        let start = ReservationScheduler::parse_start(requested)?;
        self.require_subscriber(subscriber)?;
        let now = self.now();
        self.scheduler.validate(start, now)?;
        self.scheduler.commit(start)?;
        let session = match self
            .store
            .insert_with(|id, code| Session::reserved(id, code, subscriber, start, now))
        {
            Ok(session) => session,
            Err(e) => {
                self.scheduler.release(start);
                return Err(e);
            }
        };
        self.attach_order(subscriber, session.order_id);
        tracing::info!(
            order_id = session.order_id,
            subscriber,
            slot = %start,
            "reservation created"
        );
        self.emit(EngineEvent::Reserved {
            order_id: session.order_id,
            subscriber_id: subscriber,
            parking_code: session.parking_code.clone(),
            slot: start,
        });
        Ok(session.parking_code)
    }

    /// Slots on `date` with the reservations still available for each.
    pub fn available_slots(&self, date: NaiveDate) -> EngineResult<Vec<SlotAvailability>> {
        self.scheduler
            .available_slots(date, self.now())
            .inspect_err(|e| log_failure("available_slots", e))
    }
}
