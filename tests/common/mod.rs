//! Shared fixtures for integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use bpark_engine::builders::EngineBuilder;
use bpark_engine::config::EngineConfig;
use bpark_engine::core::{Engine, Role, SubscriberProfile};
use bpark_engine::infra::InMemoryBackend;
use bpark_engine::util::{ManualClock, SubscriberId};
use chrono::{NaiveDate, NaiveDateTime};

/// 2024-05-`day` at `h:m`.
pub fn at(day: u32, h: u32, m: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 5, day)
        .and_then(|d| d.and_hms_opt(h, m, 0))
        .expect("valid test time")
}

pub struct Fixture {
    pub engine: Arc<Engine>,
    pub clock: Arc<ManualClock>,
    pub backend: Arc<InMemoryBackend>,
}

impl Fixture {
    pub fn set(&self, time: NaiveDateTime) {
        self.clock.set(time);
    }

    pub fn subscriber(&self, name: &str) -> SubscriberId {
        self.engine
            .register_subscriber(profile(name, Role::Subscriber))
            .expect("register")
            .id
    }
}

pub fn profile(name: &str, role: Role) -> SubscriberProfile {
    SubscriberProfile {
        name: name.to_owned(),
        phone: "0501234567".into(),
        email: format!("{}@example.com", name.to_lowercase()),
        car_number: "12-345-67".into(),
        role,
    }
}

/// Engine over an in-memory backend with the clock at 2024-05-01 08:00.
pub fn fixture(total_spots: u32) -> Fixture {
    let mut config = EngineConfig::default();
    config.lot.total_spots = total_spots;
    fixture_with(config)
}

pub fn fixture_with(config: EngineConfig) -> Fixture {
    let clock = Arc::new(ManualClock::new(at(1, 8, 0)));
    let backend = Arc::new(InMemoryBackend::new());
    let engine = EngineBuilder::new(config)
        .with_clock(clock.clone())
        .with_backend(backend.clone())
        .build()
        .expect("engine");
    Fixture {
        engine: Arc::new(engine),
        clock,
        backend,
    }
}
