//! Tests for configuration validation

use bpark_engine::config::{
    EngineConfig, PolicyConfig, StoreBackendConfig, MAX_SESSION_HOURS, MAX_TOTAL_SPOTS,
};
use bpark_engine::core::Role;
use chrono::NaiveTime;

#[test]
fn test_policy_defaults() {
    let policy = PolicyConfig::default();
    assert_eq!(policy.min_available_percent, 40);
    assert_eq!(policy.default_session_hours, 4);
    assert_eq!(policy.activation_grace_before_mins, 30);
    assert_eq!(policy.activation_grace_after_mins, 30);
    assert_eq!(policy.extension_window_mins, 60);
    assert_eq!(policy.max_hours_per_extension, 4);
    assert_eq!(policy.booking_min_days, 1);
    assert_eq!(policy.booking_max_days, 7);
    assert_eq!(policy.slot_minutes, 15);
    assert_eq!(policy.first_slot, NaiveTime::from_hms_opt(6, 0, 0).expect("time"));
    assert_eq!(policy.last_slot, NaiveTime::from_hms_opt(22, 45, 0).expect("time"));
    assert!(policy.validate().is_ok());
}

#[test]
fn test_policy_invalid_percent() {
    let policy = PolicyConfig {
        min_available_percent: 101,
        ..PolicyConfig::default()
    };
    assert!(policy.validate().is_err());
}

#[test]
fn test_policy_invalid_slot_minutes() {
    let policy = PolicyConfig {
        slot_minutes: 7,
        ..PolicyConfig::default()
    };
    assert!(policy.validate().is_err());
}

#[test]
fn test_policy_invalid_booking_window() {
    let policy = PolicyConfig {
        booking_min_days: 5,
        booking_max_days: 2,
        ..PolicyConfig::default()
    };
    assert!(policy.validate().is_err());
}

#[test]
fn test_engine_config_zero_spots() {
    let mut config = EngineConfig::default();
    config.lot.total_spots = 0;
    assert!(config.validate().is_err());
}

#[test]
fn test_oversized_values_rejected() {
    let policy = PolicyConfig {
        default_session_hours: MAX_SESSION_HOURS + 1,
        ..PolicyConfig::default()
    };
    assert!(policy.validate().is_err());

    let mut config = EngineConfig::default();
    config.lot.total_spots = MAX_TOTAL_SPOTS + 1;
    assert!(config.validate().is_err());
    config.lot.total_spots = MAX_TOTAL_SPOTS;
    assert!(config.validate().is_ok());
}

#[test]
fn test_engine_config_from_json() {
    let json = r#"
    {
        "lot": { "total_spots": 10 },
        "policy": { "min_available_percent": 50, "last_slot": "21:00:00" },
        "store": { "journal": { "path": "/tmp/bpark/sessions.jsonl" } },
        "subscribers": [
            {
                "id": 1,
                "subscriber_code": "MGR00001",
                "name": "Avi",
                "phone": "0501111111",
                "email": "avi@example.com",
                "car_number": "11-111-11",
                "role": "manager"
            }
        ]
    }
    "#;
    let config = EngineConfig::from_json_str(json).expect("config");
    assert_eq!(config.lot.total_spots, 10);
    assert_eq!(config.policy.min_available_percent, 50);
    assert_eq!(config.policy.default_session_hours, 4);
    assert_eq!(config.policy.last_slot, NaiveTime::from_hms_opt(21, 0, 0).expect("time"));
    assert!(matches!(config.store, StoreBackendConfig::Journal { .. }));
    assert_eq!(config.subscribers[0].profile.role, Role::Manager);
}

#[test]
fn test_engine_config_rejects_duplicate_seeds() {
    let json = r#"
    {
        "subscribers": [
            { "id": 1, "subscriber_code": "A", "name": "A", "phone": "", "email": "", "car_number": "" },
            { "id": 1, "subscriber_code": "B", "name": "B", "phone": "", "email": "", "car_number": "" }
        ]
    }
    "#;
    assert!(EngineConfig::from_json_str(json).is_err());
}

#[test]
fn test_engine_config_from_json_invalid() {
    assert!(EngineConfig::from_json_str("{ not json").is_err());
}
