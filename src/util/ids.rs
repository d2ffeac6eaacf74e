//! Identifier types shared by the engine and its callers.

use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::core::EngineError;

/// Sequential identifier of a parking order (session).
pub type OrderId = u64;

/// Identifier of a registered subscriber.
pub type SubscriberId = u64;

/// Number of digits in a generated parking code.
pub const PARKING_CODE_DIGITS: usize = 6;

/// Subscriber-facing credential for one parking session.
///
/// Independent of the order id; always numeric.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParkingCode(String);

impl ParkingCode {
    /// Validate caller-supplied code text.
    pub fn parse(raw: &str) -> Result<Self, EngineError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(EngineError::InvalidRequest("parking code is empty".into()));
        }
        if !trimmed.chars().all(|c| c.is_ascii_digit()) {
            return Err(EngineError::InvalidRequest(format!(
                "parking code `{trimmed}` is not numeric"
            )));
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Draw a fresh random code. Uniqueness is checked by the caller.
    pub(crate) fn generate<R: Rng>(rng: &mut R) -> Self {
        let value: u32 = rng.random_range(100_000..1_000_000);
        Self(value.to_string())
    }

    /// Code text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ParkingCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Physical spot number, `1..=total_spots`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SpotId(pub u32);

impl fmt::Display for SpotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P-{:03}", self.0)
    }
}
