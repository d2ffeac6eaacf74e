//! Tests for the request/response surface

use bpark_engine::core::{EngineError, ReportKind, RequestContext, Role};
use bpark_engine::runtime::{health, Request, Response};

use crate::common::{at, fixture, profile};

#[test]
fn test_request_wire_format() {
    let json = r#"{ "op": "reserve", "subscriber_id": 3, "start": "2024-05-03 10:15" }"#;
    let request: Request = serde_json::from_str(json).expect("parse");
    assert_eq!(
        request,
        Request::Reserve {
            subscriber_id: 3,
            start: "2024-05-03 10:15".into()
        }
    );
    assert_eq!(request.name(), "reserve");

    let json = serde_json::to_value(Request::Availability).expect("serialize");
    assert_eq!(json["op"], "availability");
}

#[test]
fn test_enter_and_exit_through_requests() {
    let fx = fixture(10);
    let sub = fx.subscriber("Dana");
    let ctx = RequestContext::kiosk(sub);

    let Response::Entered { parking_code, spot } = fx
        .engine
        .handle(&ctx, Request::Enter { subscriber_id: sub })
        .expect("enter")
    else {
        panic!("unexpected response");
    };
    assert_eq!(spot.0, 1);

    fx.set(at(1, 9, 30));
    let Response::Exited(receipt) = fx
        .engine
        .handle(
            &ctx,
            Request::Exit {
                parking_code: parking_code.to_string(),
            },
        )
        .expect("exit")
    else {
        panic!("unexpected response");
    };
    assert_eq!(receipt.duration_minutes, 90);
    assert!(!receipt.late);
}

#[test]
fn test_subscriber_cannot_act_for_others() {
    let fx = fixture(10);
    let dana = fx.subscriber("Dana");
    let omer = fx.subscriber("Omer");
    let ctx = RequestContext::subscriber(dana);

    let err = fx
        .engine
        .handle(&ctx, Request::Enter { subscriber_id: omer })
        .expect_err("forbidden");
    assert!(matches!(err, EngineError::Forbidden(_)));

    // A code owned by someone else looks unknown.
    let (code, _) = fx.engine.enter_spontaneous(omer).expect("enter");
    let err = fx
        .engine
        .handle(
            &ctx,
            Request::Exit {
                parking_code: code.to_string(),
            },
        )
        .expect_err("not owner");
    assert!(matches!(err, EngineError::CodeNotFound));
}

#[test]
fn test_non_numeric_code_is_validation_error() {
    let fx = fixture(10);
    let sub = fx.subscriber("Dana");
    let err = fx
        .engine
        .handle(
            &RequestContext::subscriber(sub),
            Request::Activate {
                parking_code: "12ab".into(),
            },
        )
        .expect_err("invalid");
    assert!(matches!(err, EngineError::InvalidRequest(_)));
}

#[test]
fn test_reports_require_manager() {
    let fx = fixture(10);
    let attendant = fx
        .engine
        .register_subscriber(profile("Gil", Role::Attendant))
        .expect("register")
        .id;
    let manager = fx
        .engine
        .register_subscriber(profile("Avi", Role::Manager))
        .expect("register")
        .id;
    let request = Request::Report {
        kind: ReportKind::Monthly,
        period: None,
    };

    let err = fx
        .engine
        .handle(&RequestContext::staff(attendant, Role::Attendant), request.clone())
        .expect_err("attendant");
    assert!(matches!(err, EngineError::Forbidden(_)));

    let Response::Report(report) = fx
        .engine
        .handle(&RequestContext::staff(manager, Role::Manager), request)
        .expect("report")
    else {
        panic!("unexpected response");
    };
    assert_eq!(report.kind, ReportKind::Monthly);
    assert_eq!(report.period.from, at(1, 0, 0));
    assert_eq!(report.subscribers.as_ref().map(|s| s.total_subscribers), Some(2));
    assert!(report.parking_time.is_some());
}

#[test]
fn test_staff_views() {
    let fx = fixture(10);
    let sub = fx.subscriber("Dana");
    fx.engine.enter_spontaneous(sub).expect("enter");
    let attendant = RequestContext::staff(99, Role::Attendant);

    let Response::Sessions { sessions } = fx
        .engine
        .handle(&attendant, Request::ActiveParkings)
        .expect("active")
    else {
        panic!("unexpected response");
    };
    assert_eq!(sessions.len(), 1);

    let find = Request::FindSubscribers { name: "dana".into() };
    let Response::Subscribers { subscribers } = fx
        .engine
        .handle(&attendant, find.clone())
        .expect("find")
    else {
        panic!("unexpected response");
    };
    assert_eq!(subscribers.iter().map(|s| s.id).collect::<Vec<_>>(), vec![sub]);

    for request in [Request::ListSubscribers, find] {
        let err = fx
            .engine
            .handle(&RequestContext::subscriber(sub), request)
            .expect_err("subscriber");
        assert!(matches!(err, EngineError::Forbidden(_)));
    }

    let err = fx
        .engine
        .handle(
            &attendant,
            Request::RegisterSubscriber {
                profile: profile("Boss", Role::Manager),
            },
        )
        .expect_err("attendant cannot mint managers");
    assert!(matches!(err, EngineError::Forbidden(_)));
}

#[test]
fn test_status_and_health() {
    let fx = fixture(10);
    let sub = fx.subscriber("Dana");
    fx.engine.enter_spontaneous(sub).expect("enter");

    let Response::Status(status) = fx
        .engine
        .handle(&RequestContext::subscriber(sub), Request::SystemStatus)
        .expect("status")
    else {
        panic!("unexpected response");
    };
    assert_eq!(status.active_sessions, 1);
    assert_eq!(status.availability.available, 9);

    let h = health(&fx.engine);
    assert!(h.ok);
    assert_eq!(h.available, 9);
}
