//! Engine configuration structures.

use std::path::PathBuf;

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

use crate::core::SubscriberProfile;
use crate::util::SubscriberId;

/// Physical facility description.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LotConfig {
    /// Number of spots.
    pub total_spots: u32,
}

impl Default for LotConfig {
    fn default() -> Self {
        Self { total_spots: 100 }
    }
}

/// Business policy knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Walk-ins are admitted only while at least this share of spots is free.
    pub min_available_percent: u32,
    /// Share of capacity held back from reservations for walk-in demand.
    pub spontaneous_share_percent: u32,
    /// Booked duration of every new session.
    pub default_session_hours: u32,
    /// Minutes before the booked start at which activation opens.
    pub activation_grace_before_mins: i64,
    /// Minutes after the booked start at which activation closes.
    pub activation_grace_after_mins: i64,
    /// Extensions are accepted when the remaining time is at most this long.
    pub extension_window_mins: i64,
    /// Largest single extension in hours.
    pub max_hours_per_extension: u32,
    /// Cap on hours granted across all extensions of one session.
    pub max_total_extension_hours: u32,
    /// Cap on the number of extensions of one session.
    pub max_extensions: u32,
    /// Earliest bookable day, counted from today.
    pub booking_min_days: i64,
    /// Latest bookable day, counted from today.
    pub booking_max_days: i64,
    /// Slot granularity in minutes.
    pub slot_minutes: u32,
    /// First bookable slot of the day.
    pub first_slot: NaiveTime,
    /// Last bookable slot of the day.
    pub last_slot: NaiveTime,
    /// Buffered events per subscriber before new events are dropped for it.
    pub event_buffer: usize,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            min_available_percent: 40,
            spontaneous_share_percent: 40,
            default_session_hours: 4,
            activation_grace_before_mins: 30,
            activation_grace_after_mins: 30,
            extension_window_mins: 60,
            max_hours_per_extension: 4,
            max_total_extension_hours: 4,
            max_extensions: 2,
            booking_min_days: 1,
            booking_max_days: 7,
            slot_minutes: 15,
            first_slot: NaiveTime::from_hms_opt(6, 0, 0).unwrap_or_default(),
            last_slot: NaiveTime::from_hms_opt(22, 45, 0).unwrap_or_default(),
            event_buffer: 256,
        }
    }
}

/// Session store backend selection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackendConfig {
    /// Volatile in-memory store for development/testing.
    #[default]
    InMemory,
    /// JSON-lines journal on disk.
    Journal {
        /// Journal file path.
        path: PathBuf,
    },
}

/// Subscriber registered at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriberSeed {
    /// Fixed id.
    pub id: SubscriberId,
    /// Login credential.
    pub subscriber_code: String,
    /// Profile fields.
    #[serde(flatten)]
    pub profile: SubscriberProfile,
}

/// Largest facility the engine accepts.
pub const MAX_TOTAL_SPOTS: u32 = 100_000;

/// Longest default stay, in hours.
pub const MAX_SESSION_HOURS: u32 = 24;

/// Root engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Facility description.
    #[serde(default)]
    pub lot: LotConfig,
    /// Business policy.
    #[serde(default)]
    pub policy: PolicyConfig,
    /// Store backend.
    #[serde(default)]
    pub store: StoreBackendConfig,
    /// Subscribers to register at startup if absent.
    #[serde(default)]
    pub subscribers: Vec<SubscriberSeed>,
}

impl PolicyConfig {
    /// Validate policy values.
    pub fn validate(&self) -> Result<(), String> {
        if self.min_available_percent > 100 {
            return Err("min_available_percent must be at most 100".into());
        }
        if self.spontaneous_share_percent >= 100 {
            return Err("spontaneous_share_percent must be below 100".into());
        }
        if self.default_session_hours == 0 || self.default_session_hours > MAX_SESSION_HOURS {
            return Err(format!(
                "default_session_hours must be between 1 and {MAX_SESSION_HOURS}"
            ));
        }
        if self.activation_grace_before_mins < 0 || self.activation_grace_after_mins < 0 {
            return Err("activation grace windows must not be negative".into());
        }
        if self.extension_window_mins <= 0 {
            return Err("extension_window_mins must be greater than 0".into());
        }
        if self.max_hours_per_extension == 0 {
            return Err("max_hours_per_extension must be greater than 0".into());
        }
        if self.booking_min_days < 0 || self.booking_max_days < self.booking_min_days {
            return Err("booking window must satisfy 0 <= min_days <= max_days".into());
        }
        if self.slot_minutes == 0 || 60 % self.slot_minutes != 0 {
            return Err("slot_minutes must divide an hour".into());
        }
        if self.first_slot > self.last_slot {
            return Err("first_slot must not be after last_slot".into());
        }
        if self.event_buffer == 0 {
            return Err("event_buffer must be greater than 0".into());
        }
        Ok(())
    }
}

impl EngineConfig {
    /// Validate the facility, the policy and the seeds.
    pub fn validate(&self) -> Result<(), String> {
        if self.lot.total_spots == 0 || self.lot.total_spots > MAX_TOTAL_SPOTS {
            return Err(format!("total_spots must be between 1 and {MAX_TOTAL_SPOTS}"));
        }
        self.policy
            .validate()
            .map_err(|e| format!("policy invalid: {e}"))?;
        if let StoreBackendConfig::Journal { path } = &self.store {
            if path.as_os_str().is_empty() {
                return Err("journal path must not be empty".into());
            }
        }
        let mut ids: Vec<_> = self.subscribers.iter().map(|s| s.id).collect();
        ids.sort_unstable();
        if ids.windows(2).any(|w| w[0] == w[1]) {
            return Err("subscriber seeds must have unique ids".into());
        }
        if self.subscribers.iter().any(|s| s.id == 0) {
            return Err("subscriber seed ids start at 1".into());
        }
        Ok(())
    }

    /// Parse engine configuration from a JSON string and validate.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Build configuration from the environment.
    ///
    /// Loads `.env` if present, reads the JSON file named by `BPARK_CONFIG`
    /// (defaults otherwise), then applies `BPARK_TOTAL_SPOTS`,
    /// `BPARK_MIN_AVAILABLE_PERCENT` and `BPARK_JOURNAL_PATH` overrides.
    pub fn from_env() -> Result<Self, String> {
        let _ = dotenvy::dotenv();
        let mut cfg = match std::env::var("BPARK_CONFIG") {
            Ok(path) => {
                let raw = std::fs::read_to_string(&path)
                    .map_err(|e| format!("cannot read {path}: {e}"))?;
                serde_json::from_str(&raw).map_err(|e| format!("parse error in {path}: {e}"))?
            }
            Err(_) => Self::default(),
        };
        if let Ok(raw) = std::env::var("BPARK_TOTAL_SPOTS") {
            cfg.lot.total_spots = raw
                .parse()
                .map_err(|e| format!("BPARK_TOTAL_SPOTS: {e}"))?;
        }
        if let Ok(raw) = std::env::var("BPARK_MIN_AVAILABLE_PERCENT") {
            cfg.policy.min_available_percent = raw
                .parse()
                .map_err(|e| format!("BPARK_MIN_AVAILABLE_PERCENT: {e}"))?;
        }
        if let Ok(path) = std::env::var("BPARK_JOURNAL_PATH") {
            cfg.store = StoreBackendConfig::Journal { path: path.into() };
        }
        cfg.validate()?;
        Ok(cfg)
    }
}
