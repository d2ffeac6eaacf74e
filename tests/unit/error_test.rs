//! Tests for error types

use bpark_engine::core::{EngineError, ErrorClass};
use bpark_engine::runtime::ErrorResponse;

#[test]
fn test_capacity_exceeded_error() {
    let err = EngineError::CapacityExceeded;
    assert_eq!(format!("{err}"), "capacity exceeded");
}

#[test]
fn test_admission_denied_message() {
    let err = EngineError::AdmissionDenied {
        available: 3,
        total: 10,
    };
    assert_eq!(format!("{err}"), "admission denied: 3 of 10 spots available");
    assert!(err.is_business_rule());
}

#[test]
fn test_backend_error() {
    let err = EngineError::Backend("disk full".to_string());
    assert_eq!(format!("{err}"), "backend error: disk full");
    assert_eq!(err.class(), ErrorClass::Backend);
    assert!(!err.is_business_rule());
}

#[test]
fn test_error_response_carries_class() {
    let body = ErrorResponse::from(&EngineError::InvalidSlot);
    assert_eq!(body.class, ErrorClass::BusinessRule);
    let json = serde_json::to_value(&body).expect("serialize");
    assert_eq!(json["class"], "business_rule");
    assert_eq!(json["message"], "requested time is not a bookable slot");
}
