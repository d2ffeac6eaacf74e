//! Read-side statistics over the session store.
//!
//! [`build`] is a pure function of a session snapshot so reports can be
//! computed and tested without an engine.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{Datelike, Months, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

use crate::core::error::log_failure;
use crate::core::{Availability, Engine, EngineError, EngineResult, Session, SessionStatus};

/// Report flavour requested by a manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportKind {
    /// Durations, lateness and extensions.
    ParkingTime,
    /// Subscriber activity and lateness.
    SubscriberStatus,
    /// Calendar-month summary.
    Monthly,
}

/// Half-open reporting period `[from, to)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportPeriod {
    /// Inclusive start.
    pub from: NaiveDateTime,
    /// Exclusive end.
    pub to: NaiveDateTime,
}

impl ReportPeriod {
    /// Period between two instants.
    pub fn new(from: NaiveDateTime, to: NaiveDateTime) -> EngineResult<Self> {
        if from >= to {
            return Err(EngineError::InvalidRequest(
                "report period must end after it starts".into(),
            ));
        }
        Ok(Self { from, to })
    }

    /// The whole calendar month.
    pub fn month(year: i32, month: u32) -> EngineResult<Self> {
        let first = NaiveDate::from_ymd_opt(year, month, 1)
            .ok_or_else(|| EngineError::InvalidRequest(format!("no such month {year}-{month:02}")))?;
        let next = first
            .checked_add_months(Months::new(1))
            .ok_or_else(|| EngineError::InvalidRequest("month out of range".into()))?;
        Self::new(first.and_time(NaiveTime::MIN), next.and_time(NaiveTime::MIN))
    }

    /// Whether `at` falls inside the period.
    pub fn contains(&self, at: NaiveDateTime) -> bool {
        self.from <= at && at < self.to
    }
}

/// Durations, lateness and extensions over parked sessions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParkingTimeStats {
    /// Orders that actually entered the facility.
    pub total_parkings: u32,
    /// Mean minutes parked over finished sessions.
    pub average_duration_minutes: f64,
    /// Shortest finished session.
    pub min_duration_minutes: i64,
    /// Longest finished session.
    pub max_duration_minutes: i64,
    /// Total hours parked over finished sessions.
    pub total_hours: i64,
    /// Finished sessions that left late.
    pub late_exits: u32,
    /// Late exits over finished sessions, in percent.
    pub late_exit_percentage: f64,
    /// Sessions extended at least once.
    pub extensions: u32,
    /// Parked sessions never extended.
    pub no_extensions: u32,
    /// Extended sessions over parked sessions, in percent.
    pub extension_percentage: f64,
    /// Entries per hour of day.
    pub hourly_entries: BTreeMap<u32, u32>,
    /// Late exits per hour of the expected exit.
    pub late_exits_by_hour: BTreeMap<u32, u32>,
    /// Minutes parked per entry day.
    pub minutes_per_day: BTreeMap<NaiveDate, i64>,
}

/// Subscriber activity over the period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriberStats {
    /// Distinct subscribers with an order in the period.
    pub active_subscribers: u32,
    /// Distinct subscribers with at least one late exit.
    pub late_subscribers: u32,
    /// Registered subscribers.
    pub total_subscribers: u32,
    /// Distinct subscribers per entry day.
    pub subscribers_per_day: BTreeMap<NaiveDate, u32>,
}

/// Aggregate statistics for one period.
///
/// Order counts and occupancy are always present. `parking_time` is filled
/// for [`ReportKind::ParkingTime`] and [`ReportKind::Monthly`], `subscribers`
/// for [`ReportKind::SubscriberStatus`] and [`ReportKind::Monthly`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParkingReport {
    /// Requested kind.
    pub kind: ReportKind,
    /// Covered period.
    pub period: ReportPeriod,
    /// When the report was computed.
    pub generated_at: NaiveDateTime,
    /// Orders in the period, any status.
    pub total_orders: u32,
    /// Orders per status.
    pub by_status: BTreeMap<String, u32>,
    /// Booked orders.
    pub reservations: u32,
    /// Walk-in orders.
    pub spontaneous_entries: u32,
    /// Booked orders that were activated.
    pub used_reservations: u32,
    /// Booked orders cancelled or expired.
    pub cancelled_reservations: u32,
    /// Booked orders still awaiting activation.
    pub pending_reservations: u32,
    /// Share of orders that were booked ahead, in percent.
    pub reservation_percentage: f64,
    /// Spots occupied when the report was computed.
    pub occupied: u32,
    /// Spots in the facility.
    pub total_spots: u32,
    /// Parking-time section.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parking_time: Option<ParkingTimeStats>,
    /// Subscriber section.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscribers: Option<SubscriberStats>,
}

impl ReportKind {
    const fn covers_parking_time(self) -> bool {
        matches!(self, Self::ParkingTime | Self::Monthly)
    }

    const fn covers_subscribers(self) -> bool {
        matches!(self, Self::SubscriberStatus | Self::Monthly)
    }
}

fn anchor(session: &Session) -> NaiveDateTime {
    session
        .entry_time
        .or(session.estimated_start)
        .unwrap_or(session.created_at)
}

#[allow(clippy::cast_precision_loss)]
fn percent(part: u32, whole: u32) -> f64 {
    if whole == 0 {
        0.0
    } else {
        f64::from(part) * 100.0 / f64::from(whole)
    }
}

fn count(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}

const fn status_label(status: SessionStatus) -> &'static str {
    match status {
        SessionStatus::Reserved => "reserved",
        SessionStatus::Active => "active",
        SessionStatus::Completed => "completed",
        SessionStatus::CompletedLate => "completed_late",
        SessionStatus::Cancelled => "cancelled",
    }
}

#[allow(clippy::cast_precision_loss)]
fn parking_time_stats(in_period: &[&Session], now: NaiveDateTime) -> ParkingTimeStats {
    let mut hourly_entries = BTreeMap::new();
    let mut late_exits_by_hour = BTreeMap::new();
    let mut minutes_per_day = BTreeMap::new();
    let mut durations = Vec::new();
    let (mut parked, mut late_exits, mut extended) = (0, 0, 0);

    for s in in_period {
        let Some(entry) = s.entry_time else { continue };
        parked += 1;
        if s.is_extended {
            extended += 1;
        }
        *hourly_entries.entry(entry.hour()).or_insert(0) += 1;
        if s.status.is_finished() {
            let minutes = s.duration_minutes(now);
            durations.push(minutes);
            *minutes_per_day.entry(entry.date()).or_insert(0) += minutes;
        }
        if s.is_late {
            late_exits += 1;
            let hour = s.expected_exit.map_or(0, |t| t.hour());
            *late_exits_by_hour.entry(hour).or_insert(0) += 1;
        }
    }

    let finished = count(durations.len());
    let total_minutes: i64 = durations.iter().sum();
    ParkingTimeStats {
        total_parkings: parked,
        average_duration_minutes: if durations.is_empty() {
            0.0
        } else {
            total_minutes as f64 / durations.len() as f64
        },
        min_duration_minutes: durations.iter().copied().min().unwrap_or(0),
        max_duration_minutes: durations.iter().copied().max().unwrap_or(0),
        total_hours: total_minutes / 60,
        late_exits,
        late_exit_percentage: percent(late_exits, finished),
        extensions: extended,
        no_extensions: parked - extended,
        extension_percentage: percent(extended, parked),
        hourly_entries,
        late_exits_by_hour,
        minutes_per_day,
    }
}

fn subscriber_stats(in_period: &[&Session], total_subscribers: usize) -> SubscriberStats {
    let mut day_subscribers: BTreeMap<NaiveDate, BTreeSet<u64>> = BTreeMap::new();
    let mut subscribers = BTreeSet::new();
    let mut late_subscribers = BTreeSet::new();
    for s in in_period {
        subscribers.insert(s.subscriber_id);
        if s.is_late {
            late_subscribers.insert(s.subscriber_id);
        }
        if let Some(entry) = s.entry_time {
            day_subscribers
                .entry(entry.date())
                .or_default()
                .insert(s.subscriber_id);
        }
    }
    SubscriberStats {
        active_subscribers: count(subscribers.len()),
        late_subscribers: count(late_subscribers.len()),
        total_subscribers: count(total_subscribers),
        subscribers_per_day: day_subscribers
            .into_iter()
            .map(|(day, subs)| (day, count(subs.len())))
            .collect(),
    }
}

/// Compute a report over `sessions`. `kind` decides which sections are
/// computed.
pub fn build(
    kind: ReportKind,
    period: ReportPeriod,
    sessions: &[Session],
    total_subscribers: usize,
    availability: Availability,
    now: NaiveDateTime,
) -> ParkingReport {
    let in_period: Vec<&Session> = sessions.iter().filter(|s| period.contains(anchor(s))).collect();

    let mut by_status = BTreeMap::new();
    let (mut reservations, mut used, mut cancelled, mut pending) = (0, 0, 0, 0);
    for s in &in_period {
        *by_status.entry(status_label(s.status).to_owned()).or_insert(0) += 1;
        if s.is_reservation() {
            reservations += 1;
            match s.status {
                SessionStatus::Reserved => pending += 1,
                SessionStatus::Cancelled => cancelled += 1,
                _ => used += 1,
            }
        }
    }

    let total_orders = count(in_period.len());
    ParkingReport {
        kind,
        period,
        generated_at: now,
        total_orders,
        by_status,
        reservations,
        spontaneous_entries: total_orders - reservations,
        used_reservations: used,
        cancelled_reservations: cancelled,
        pending_reservations: pending,
        reservation_percentage: percent(reservations, total_orders),
        occupied: availability.occupied,
        total_spots: availability.total,
        parking_time: kind
            .covers_parking_time()
            .then(|| parking_time_stats(&in_period, now)),
        subscribers: kind
            .covers_subscribers()
            .then(|| subscriber_stats(&in_period, total_subscribers)),
    }
}

impl Engine {
    /// Compute a report over the current store contents.
    pub fn report(&self, kind: ReportKind, period: ReportPeriod) -> EngineResult<ParkingReport> {
        if period.from >= period.to {
            let err = EngineError::InvalidRequest("report period must end after it starts".into());
            log_failure("report", &err);
            return Err(err);
        }
        let sessions = self.store.snapshot();
        Ok(build(
            kind,
            period,
            &sessions,
            self.registry.len(),
            self.pool.availability(),
            self.now(),
        ))
    }

    /// The calendar month containing engine time.
    pub fn current_month(&self) -> EngineResult<ReportPeriod> {
        let today = self.now().date();
        ReportPeriod::month(today.year(), today.month())
    }

    /// Monthly report for the calendar month containing engine time.
    pub fn current_month_report(&self) -> EngineResult<ParkingReport> {
        self.report(ReportKind::Monthly, self.current_month()?)
    }
}
