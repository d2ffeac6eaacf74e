//! Parking-session engine: capacity accounting, session records and the
//! admission and lifecycle rules that move sessions between states.

pub mod admission;
pub mod audit;
pub mod engine;
pub mod error;
pub mod events;
pub mod lifecycle;
pub mod registry;
pub mod reports;
pub mod scheduler;
pub mod session;
pub mod spot_pool;
pub mod store;

pub use audit::{build_audit_event, AuditEvent, AuditSink, InMemoryAuditSink, TracingAuditSink};
pub use engine::{Channel, Engine, RequestContext, SystemStatus};
pub use error::{AppResult, EngineError, EngineResult, ErrorClass};
pub use events::{EngineEvent, EventBus};
pub use lifecycle::ExitReceipt;
pub use registry::{ContactUpdate, Role, Subscriber, SubscriberProfile, SubscriberRegistry};
pub use reports::{ParkingReport, ParkingTimeStats, ReportKind, ReportPeriod, SubscriberStats};
pub use scheduler::{ReservationScheduler, SlotAvailability};
pub use session::{OrderKind, Session, SessionStatus};
pub use spot_pool::{Availability, SpotPool};
pub use store::{LoadedState, SessionStore, StoreBackend};
