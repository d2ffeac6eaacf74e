//! Tests for utility functions

use bpark_engine::util::{Clock, ManualClock, ParkingCode, SpotId};
use chrono::TimeDelta;

use crate::common::at;

#[test]
fn test_parking_code_parse() {
    assert_eq!(ParkingCode::parse(" 123456 ").expect("code").as_str(), "123456");
    assert!(ParkingCode::parse("12a456").is_err());
    assert!(ParkingCode::parse("").is_err());
}

#[test]
fn test_parking_code_serializes_as_string() {
    let code = ParkingCode::parse("654321").expect("code");
    assert_eq!(serde_json::to_string(&code).expect("serialize"), "\"654321\"");
}

#[test]
fn test_spot_display() {
    assert_eq!(SpotId(7).to_string(), "P-007");
    assert_eq!(SpotId(120).to_string(), "P-120");
}

#[test]
fn test_manual_clock() {
    let clock = ManualClock::new(at(1, 8, 0));
    clock.advance(TimeDelta::minutes(90));
    assert_eq!(clock.now(), at(1, 9, 30));
}
