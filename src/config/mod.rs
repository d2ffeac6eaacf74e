//! Configuration models for the facility, its policies and storage.

pub mod engine;

pub use engine::{
    EngineConfig, LotConfig, PolicyConfig, StoreBackendConfig, SubscriberSeed, MAX_SESSION_HOURS,
    MAX_TOTAL_SPOTS,
};
