//! Runtime adapters and API surface.

pub mod api;
#[cfg(feature = "tokio-runtime")]
pub mod service;

pub use api::{health, ErrorResponse, Health, Request, Response};
#[cfg(feature = "tokio-runtime")]
pub use service::{EngineService, ParkingService};
