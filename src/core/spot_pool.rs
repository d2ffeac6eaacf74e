//! Spot pool with capacity accounting.
//!
//! Free spots live in an ordered set behind a `parking_lot::Mutex`, so every
//! reservation and release is serialized with its availability check. The
//! occupied count is mirrored in an `AtomicU32` for lock-free availability
//! reads from dashboards and the admission threshold pre-check.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU32, Ordering};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::core::{EngineError, EngineResult};
use crate::util::SpotId;

/// Point-in-time availability figures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Availability {
    /// Spots free right now.
    pub available: u32,
    /// Spots in use.
    pub occupied: u32,
    /// Facility capacity.
    pub total: u32,
}

impl Availability {
    /// Whether `available / total >= percent / 100`, in integer arithmetic.
    pub const fn meets_percent(&self, percent: u32) -> bool {
        (self.available as u64) * 100 >= (self.total as u64) * (percent as u64)
    }
}

/// Finite set of physical spots shared by all sessions.
#[derive(Debug)]
pub struct SpotPool {
    total: u32,
    /// Lock-free mirror of `total - free.len()`.
    occupied: AtomicU32,
    free: Mutex<BTreeSet<SpotId>>,
}

impl SpotPool {
    /// Pool with spots `1..=total`, all free.
    pub fn new(total: u32) -> Self {
        Self {
            total,
            occupied: AtomicU32::new(0),
            free: Mutex::new((1..=total).map(SpotId).collect()),
        }
    }

    /// Facility capacity.
    pub const fn total(&self) -> u32 {
        self.total
    }

    /// Spots in use (lock-free read).
    pub fn occupied(&self) -> u32 {
        self.occupied.load(Ordering::Acquire)
    }

    /// Spots free (lock-free read).
    pub fn available(&self) -> u32 {
        self.total.saturating_sub(self.occupied())
    }

    /// Availability snapshot.
    pub fn availability(&self) -> Availability {
        let occupied = self.occupied();
        Availability {
            available: self.total.saturating_sub(occupied),
            occupied,
            total: self.total,
        }
    }

    /// Whether a spot is currently taken.
    pub fn is_occupied(&self, spot: SpotId) -> bool {
        spot.0 >= 1 && spot.0 <= self.total && !self.free.lock().contains(&spot)
    }

    /// Take the lowest free spot.
    pub fn reserve_capacity(&self) -> EngineResult<SpotId> {
        let mut free = self.free.lock();
        let spot = free.pop_first().ok_or(EngineError::CapacityExceeded)?;
        self.occupied.fetch_add(1, Ordering::AcqRel);
        tracing::debug!(%spot, available = free.len(), "spot reserved");
        Ok(spot)
    }

    /// Take a spot only if, before taking it, at least `min_available_percent`
    /// of the facility is free and `held` spots stay free afterwards for
    /// booked arrivals. The check and the reservation happen under the same
    /// lock, so concurrent walk-ins cannot both pass on the last margin.
    pub fn try_admit(&self, min_available_percent: u32, held: u32) -> EngineResult<SpotId> {
        let mut free = self.free.lock();
        let available = u32::try_from(free.len())
            .map_err(|_| EngineError::Internal("free spot count overflow".into()))?;
        let snapshot = Availability {
            available,
            occupied: self.total - available,
            total: self.total,
        };
        if !snapshot.meets_percent(min_available_percent) || available <= held {
            return Err(EngineError::AdmissionDenied {
                available,
                total: self.total,
            });
        }
        let spot = free.pop_first().ok_or(EngineError::CapacityExceeded)?;
        self.occupied.fetch_add(1, Ordering::AcqRel);
        tracing::debug!(%spot, available = free.len(), "spot admitted");
        Ok(spot)
    }

    /// Return a spot to the pool.
    pub fn release_capacity(&self, spot: SpotId) -> EngineResult<()> {
        if spot.0 == 0 || spot.0 > self.total {
            return Err(EngineError::Internal(format!("release of unknown spot {spot}")));
        }
        let mut free = self.free.lock();
        if !free.insert(spot) {
            return Err(EngineError::Internal(format!("release of free spot {spot}")));
        }
        self.occupied.fetch_sub(1, Ordering::AcqRel);
        tracing::debug!(%spot, available = free.len(), "spot released");
        Ok(())
    }

    /// Mark a specific spot occupied while rebuilding state from the store.
    pub(crate) fn restore(&self, spot: SpotId) -> EngineResult<()> {
        let mut free = self.free.lock();
        if !free.remove(&spot) {
            return Err(EngineError::Internal(format!(
                "spot {spot} held by more than one active session or out of range"
            )));
        }
        self.occupied.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }
}
