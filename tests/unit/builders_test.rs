//! Tests for builder modules

use std::sync::Arc;

use bpark_engine::builders::{build_engine, EngineBuilder};
use bpark_engine::config::{EngineConfig, SubscriberSeed};
use bpark_engine::core::Role;
use bpark_engine::infra::InMemoryBackend;
use bpark_engine::util::ManualClock;

use crate::common::{at, profile};

#[test]
fn test_build_engine_defaults() {
    let engine = build_engine(EngineConfig::default()).expect("engine");
    let availability = engine.availability();
    assert_eq!(availability.total, 100);
    assert_eq!(availability.available, 100);
}

#[test]
fn test_builder_rejects_invalid_config() {
    let mut config = EngineConfig::default();
    config.lot.total_spots = 0;
    let err = EngineBuilder::new(config).build().expect_err("invalid");
    assert!(err.to_string().contains("config invalid"));
}

#[test]
fn test_builder_seeds_subscribers_once() {
    let mut config = EngineConfig::default();
    config.subscribers.push(SubscriberSeed {
        id: 7,
        subscriber_code: "MGR00007".into(),
        profile: profile("Avi", Role::Manager),
    });
    let backend = Arc::new(InMemoryBackend::new());
    let clock = Arc::new(ManualClock::new(at(1, 8, 0)));

    let first = EngineBuilder::new(config.clone())
        .with_backend(backend.clone())
        .with_clock(clock.clone())
        .build()
        .expect("engine");
    assert_eq!(first.subscriber(7).expect("seeded").role, Role::Manager);
    drop(first);

    // Rebuilding over the same backend keeps the stored record.
    let second = EngineBuilder::new(config)
        .with_backend(backend)
        .with_clock(clock)
        .build()
        .expect("engine");
    assert_eq!(second.registry().len(), 1);
    assert_eq!(second.subscriber(7).expect("seeded").subscriber_code, "MGR00007");
}
