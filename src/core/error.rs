//! Error types for engine operations.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// How an [`EngineError`] should be treated by callers and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    /// Malformed input rejected before any state was touched.
    Validation,
    /// Expected, recoverable refusal under the facility's rules.
    BusinessRule,
    /// Broken internal invariant; the single request is aborted.
    Consistency,
    /// Backing store failure.
    Backend,
}

/// Errors produced by engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Request payload failed validation.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    /// Requested start is outside the advance booking window.
    #[error("requested start is outside the booking window")]
    OutOfBookingWindow,
    /// Requested time is not a bookable 15-minute slot.
    #[error("requested time is not a bookable slot")]
    InvalidSlot,
    /// Every reservable unit for an overlapping slot is committed.
    #[error("no reservable capacity left for the requested slot")]
    SlotUnavailable,
    /// Reservation cannot be cancelled in its current state.
    #[error("reservation cannot be cancelled")]
    NotCancellable,
    /// No session carries the given parking code.
    #[error("parking code not found")]
    CodeNotFound,
    /// Spontaneous entry refused by the availability threshold or by spots
    /// held for booked arrivals.
    #[error("admission denied: {available} of {total} spots available")]
    AdmissionDenied {
        /// Spots available at the time of the decision.
        available: u32,
        /// Total spots in the facility.
        total: u32,
    },
    /// Subscriber already occupies a spot.
    #[error("subscriber already has an active parking session")]
    AlreadyParked,
    /// Reservation was already activated.
    #[error("reservation already activated")]
    AlreadyActivated,
    /// Reservation was cancelled.
    #[error("reservation was cancelled")]
    AlreadyCancelled,
    /// Session has already ended.
    #[error("session already exited")]
    AlreadyExited,
    /// Reserved session has not been activated yet.
    #[error("session has not been activated")]
    NotActivated,
    /// Arrival precedes the activation grace window.
    #[error("activation window has not opened yet")]
    ActivationTooEarly,
    /// Arrival follows the activation grace window.
    #[error("activation window expired")]
    WindowExpired,
    /// Extension requested outside the allowed window or state.
    #[error("extension not allowed at this time")]
    ExtensionNotAllowed,
    /// Extension would exceed the configured cap.
    #[error("extension limit exceeded")]
    ExtensionLimitExceeded,
    /// Subscriber has neither an active nor a reserved session.
    #[error("no active or reserved session")]
    NoActiveSession,
    /// Subscriber id is not registered.
    #[error("unknown subscriber: {0}")]
    UnknownSubscriber(u64),
    /// Caller role may not perform this operation.
    #[error("forbidden: {0}")]
    Forbidden(String),
    /// No free spot remains in the pool.
    #[error("capacity exceeded")]
    CapacityExceeded,
    /// Internal invariant violation.
    #[error("internal error: {0}")]
    Internal(String),
    /// Backend-specific failure with context.
    #[error("backend error: {0}")]
    Backend(String),
}

impl EngineError {
    /// Classify the error for logging and reporting.
    pub const fn class(&self) -> ErrorClass {
        match self {
            Self::InvalidRequest(_) => ErrorClass::Validation,
            Self::Internal(_) => ErrorClass::Consistency,
            Self::Backend(_) => ErrorClass::Backend,
            _ => ErrorClass::BusinessRule,
        }
    }

    /// Whether this is an expected refusal rather than a failure.
    pub const fn is_business_rule(&self) -> bool {
        matches!(self.class(), ErrorClass::BusinessRule | ErrorClass::Validation)
    }
}

/// Result alias for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Application-facing result using anyhow for higher-level contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;

/// Log an operation failure at a level matching its class.
pub(crate) fn log_failure(op: &str, err: &EngineError) {
    match err.class() {
        ErrorClass::Validation | ErrorClass::BusinessRule => {
            tracing::debug!(op, error = %err, "request refused");
        }
        ErrorClass::Consistency | ErrorClass::Backend => {
            tracing::error!(op, error = %err, "request aborted");
        }
    }
}
