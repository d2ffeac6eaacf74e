//! # BPark engine
//!
//! Parking-session admission and lifecycle engine for a facility whose spots
//! are shared between walk-in arrivals and pre-booked reservations.
//!
//! The engine decides whether an arrival may take a spot, tracks every
//! session from creation to completion, enforces the reservation time-slot
//! rules, and keeps availability consistent while many front ends
//! (subscriber app, kiosk, attendant and manager desks) call it at once.
//!
//! ## Rules
//!
//! - **Walk-ins** are admitted only while at least `min_available_percent`
//!   (default 40%) of the facility is free, and only if a spot stays free for
//!   every booking due during the walk-in's stay.
//! - **Reservations** are booked 1 to 7 calendar days ahead on a 15-minute
//!   grid between 06:00 and 22:45. Each booking holds a unit in every slot
//!   bucket its stay covers; part of the facility is never bookable.
//! - **Activation** is accepted 30 minutes either side of the booked slot.
//! - **Extensions** of 1 to 4 hours are possible in the last hour of a
//!   session, up to the configured cap.
//! - **Exits** after the expected exit time complete the session as late.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use bpark_engine::builders::EngineBuilder;
//! use bpark_engine::config::EngineConfig;
//! use bpark_engine::core::{RequestContext, Role, SubscriberProfile};
//! use bpark_engine::runtime::Request;
//!
//! let engine = Arc::new(EngineBuilder::new(EngineConfig::default()).build()?);
//! let sub = engine.register_subscriber(SubscriberProfile {
//!     name: "Dana".into(),
//!     phone: "0501234567".into(),
//!     email: "dana@example.com".into(),
//!     car_number: "12-345-67".into(),
//!     role: Role::Subscriber,
//! })?;
//!
//! let ctx = RequestContext::subscriber(sub.id);
//! let entered = engine.handle(&ctx, Request::Enter { subscriber_id: sub.id })?;
//! ```
//!
//! State changes are published on [`core::EventBus`] and, when a sink is
//! attached, recorded in the audit trail.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Engine, session records, and admission and lifecycle rules.
pub mod core;
/// Configuration models for the facility, policy and store.
pub mod config;
/// Builders to construct the engine from configuration.
pub mod builders;
/// Store backends.
pub mod infra;
/// Request/response surface and async service.
pub mod runtime;
/// Shared utilities.
pub mod util;
