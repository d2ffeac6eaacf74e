//! End-to-end session scenarios against a manual clock.
//!
//! Covers the facility rules: booking window and slot grid, the walk-in
//! availability threshold and the room it leaves for bookings, activation
//! grace, extension window and caps, late exits, cancellation and lost-code
//! recovery.

mod common;

use bpark_engine::core::{EngineError, EngineEvent, SessionStatus};
use chrono::TimeDelta;

use common::{at, fixture};

#[test]
fn test_reserve_activate_extend_exit_late() {
    let fx = fixture(10);
    let sub = fx.subscriber("Dana");

    let code = fx.engine.reserve(sub, "2024-05-02 09:00").expect("reserve");
    fx.set(at(2, 9, 10));
    let spot = fx.engine.activate_reservation(&code).expect("activate");
    assert_eq!(fx.engine.availability().available, 9);

    fx.set(at(2, 12, 20));
    let expected = fx.engine.extend(&code, 1).expect("extend");
    assert_eq!(expected, at(2, 14, 10));

    fx.set(at(2, 14, 20));
    let receipt = fx.engine.exit(&code).expect("exit");
    assert!(receipt.late);
    assert_eq!(receipt.spot, spot);
    assert_eq!(receipt.duration_minutes, 310);

    let session = fx.engine.store().find_by_code(&code).expect("session");
    assert_eq!(session.status, SessionStatus::CompletedLate);
    assert!(session.is_extended);
    assert!(session.is_late);
    assert_eq!(session.extension_hours, 1);
    assert_eq!(fx.engine.availability().available, 10);
    fx.engine.check_consistency().expect("consistent");
}

#[test]
fn test_booking_window() {
    let fx = fixture(10);
    let sub = fx.subscriber("Dana");
    assert!(matches!(
        fx.engine.reserve(sub, "2024-05-09 10:00"),
        Err(EngineError::OutOfBookingWindow)
    ));
    assert!(matches!(
        fx.engine.reserve(sub, "2024-05-01 18:00"),
        Err(EngineError::OutOfBookingWindow)
    ));
    assert!(fx.engine.reserve(sub, "2024-05-04 10:00").is_ok());
    assert!(fx.engine.reserve(sub, "2024-05-08 22:45").is_ok());
}

#[test]
fn test_slot_grid() {
    let fx = fixture(10);
    let sub = fx.subscriber("Dana");
    assert!(matches!(
        fx.engine.reserve(sub, "2024-05-03 10:07"),
        Err(EngineError::InvalidSlot)
    ));
    assert!(matches!(
        fx.engine.reserve(sub, "2024-05-03 23:00"),
        Err(EngineError::InvalidSlot)
    ));
    assert!(matches!(
        fx.engine.reserve(sub, "03/05/2024 10:15"),
        Err(EngineError::InvalidRequest(_))
    ));
    assert!(fx.engine.reserve(sub, "2024-05-03 10:15").is_ok());
}

#[test]
fn test_reservations_stop_at_reservable_share() {
    let fx = fixture(10);
    for n in 0..6 {
        let sub = fx.subscriber(&format!("Sub{n}"));
        fx.engine.reserve(sub, "2024-05-03 10:00").expect("reserve");
    }
    let late = fx.subscriber("Late");
    assert!(matches!(
        fx.engine.reserve(late, "2024-05-03 11:00"),
        Err(EngineError::SlotUnavailable)
    ));
    assert!(fx.engine.reserve(late, "2024-05-03 14:00").is_ok());

    let slots = fx.engine.available_slots(at(3, 0, 0).date()).expect("slots");
    let ten = slots.iter().find(|s| s.start == at(3, 10, 0)).expect("10:00");
    assert_eq!(ten.remaining, 0);
}

#[test]
fn test_walk_in_threshold() {
    let fx = fixture(10);
    for n in 0..5 {
        let sub = fx.subscriber(&format!("Sub{n}"));
        fx.engine.enter_spontaneous(sub).expect("enter");
    }
    assert_eq!(fx.engine.availability().occupied, 5);

    // 5 of 10 free: admitted. 4 of 10 free: still exactly 40%.
    let sixth = fx.subscriber("Sixth");
    fx.engine.enter_spontaneous(sixth).expect("enter at 5 occupied");
    let seventh = fx.subscriber("Seventh");
    fx.engine.enter_spontaneous(seventh).expect("enter at 6 occupied");
    assert_eq!(fx.engine.availability().occupied, 7);

    let eighth = fx.subscriber("Eighth");
    assert!(matches!(
        fx.engine.enter_spontaneous(eighth),
        Err(EngineError::AdmissionDenied {
            available: 3,
            total: 10
        })
    ));
    let a = fx.engine.availability();
    assert_eq!(a.available + a.occupied, a.total);
}

#[test]
fn test_walk_ins_leave_room_for_booked_arrivals() {
    let fx = fixture(10);
    let booked: Vec<_> = (0..6)
        .map(|n| {
            let sub = fx.subscriber(&format!("Booked{n}"));
            fx.engine.reserve(sub, "2024-05-02 09:00").expect("reserve")
        })
        .collect();

    fx.set(at(2, 8, 40));
    let mut walk_ins = 0;
    loop {
        let sub = fx.subscriber(&format!("Walk{walk_ins}"));
        match fx.engine.enter_spontaneous(sub) {
            Ok(_) => walk_ins += 1,
            Err(EngineError::AdmissionDenied { available, .. }) => {
                assert_eq!(available, 6);
                break;
            }
            Err(e) => panic!("unexpected walk-in failure: {e}"),
        }
    }
    assert_eq!(walk_ins, 4);

    fx.set(at(2, 9, 0));
    for code in &booked {
        fx.engine.activate_reservation(code).expect("booked arrival gets a spot");
    }
    assert_eq!(fx.engine.availability().available, 0);
    fx.engine.check_consistency().expect("consistent");
}

#[test]
fn test_bookings_after_the_stay_do_not_hold_spots() {
    let fx = fixture(10);
    for n in 0..6 {
        let sub = fx.subscriber(&format!("Booked{n}"));
        fx.engine.reserve(sub, "2024-05-02 14:00").expect("reserve");
    }
    // A stay from 08:40 ends at 12:40, before the 13:30 activation window.
    fx.set(at(2, 8, 40));
    for n in 0..7 {
        let sub = fx.subscriber(&format!("Walk{n}"));
        fx.engine.enter_spontaneous(sub).expect("enter");
    }
    assert_eq!(fx.engine.availability().occupied, 7);
}

#[test]
fn test_already_parked() {
    let fx = fixture(10);
    let sub = fx.subscriber("Dana");
    fx.engine.enter_spontaneous(sub).expect("enter");
    assert!(matches!(
        fx.engine.enter_spontaneous(sub),
        Err(EngineError::AlreadyParked)
    ));
    assert_eq!(fx.engine.availability().occupied, 1);
}

#[test]
fn test_unknown_subscriber() {
    let fx = fixture(10);
    assert!(matches!(
        fx.engine.enter_spontaneous(42),
        Err(EngineError::UnknownSubscriber(42))
    ));
    assert!(matches!(fx.engine.history(42), Err(EngineError::UnknownSubscriber(42))));
}

#[test]
fn test_activation_grace_window() {
    let fx = fixture(10);
    let sub = fx.subscriber("Dana");
    let code = fx.engine.reserve(sub, "2024-05-02 09:00").expect("reserve");

    fx.set(at(2, 8, 29));
    assert!(matches!(
        fx.engine.activate_reservation(&code),
        Err(EngineError::ActivationTooEarly)
    ));
    fx.set(at(2, 9, 31));
    assert!(matches!(
        fx.engine.activate_reservation(&code),
        Err(EngineError::WindowExpired)
    ));
    fx.set(at(2, 8, 30));
    fx.engine.activate_reservation(&code).expect("activate at window start");
    assert!(matches!(
        fx.engine.activate_reservation(&code),
        Err(EngineError::AlreadyActivated)
    ));
    assert_eq!(fx.engine.availability().occupied, 1);
}

#[test]
fn test_exit_state_errors() {
    let fx = fixture(10);
    let sub = fx.subscriber("Dana");
    let reserved = fx.engine.reserve(sub, "2024-05-02 09:00").expect("reserve");
    assert!(matches!(fx.engine.exit(&reserved), Err(EngineError::NotActivated)));

    fx.engine.cancel(sub, &reserved).expect("cancel");
    assert!(matches!(fx.engine.exit(&reserved), Err(EngineError::AlreadyCancelled)));
    assert!(matches!(
        fx.engine.activate_reservation(&reserved),
        Err(EngineError::AlreadyCancelled)
    ));

    let (walk_in, _) = fx.engine.enter_spontaneous(sub).expect("enter");
    fx.engine.exit(&walk_in).expect("exit");
    assert!(matches!(fx.engine.exit(&walk_in), Err(EngineError::AlreadyExited)));
    assert_eq!(fx.engine.availability().occupied, 0);
}

#[test]
fn test_exit_on_time_is_not_late() {
    let fx = fixture(10);
    let sub = fx.subscriber("Dana");
    let (code, _) = fx.engine.enter_spontaneous(sub).expect("enter");
    fx.set(at(1, 12, 0));
    let receipt = fx.engine.exit(&code).expect("exit");
    assert!(!receipt.late);
    let session = fx.engine.store().find_by_code(&code).expect("session");
    assert_eq!(session.status, SessionStatus::Completed);
    assert_eq!(session.exit_time, Some(at(1, 12, 0)));
}

#[test]
fn test_cancel_twice() {
    let fx = fixture(10);
    let sub = fx.subscriber("Dana");
    let code = fx.engine.reserve(sub, "2024-05-03 10:00").expect("reserve");
    fx.engine.cancel(sub, &code).expect("first cancel");
    assert!(matches!(fx.engine.cancel(sub, &code), Err(EngineError::NotCancellable)));
}

#[test]
fn test_cancel_releases_slot_buckets() {
    let fx = fixture(10);
    let sub = fx.subscriber("Dana");
    let code = fx.engine.reserve(sub, "2024-05-03 10:00").expect("reserve");
    assert_eq!(fx.engine.scheduler().committed(at(3, 10, 0)), 1);
    fx.engine.cancel(sub, &code).expect("cancel");
    assert_eq!(fx.engine.scheduler().committed(at(3, 10, 0)), 0);
}

#[test]
fn test_cancel_of_foreign_code_reports_not_found() {
    let fx = fixture(10);
    let owner = fx.subscriber("Dana");
    let other = fx.subscriber("Omer");
    let code = fx.engine.reserve(owner, "2024-05-03 10:00").expect("reserve");
    assert!(matches!(fx.engine.cancel(other, &code), Err(EngineError::CodeNotFound)));
    let session = fx.engine.store().find_by_code(&code).expect("session");
    assert_eq!(session.status, SessionStatus::Reserved);
}

#[test]
fn test_extension_window() {
    let fx = fixture(10);
    let sub = fx.subscriber("Dana");
    let (code, _) = fx.engine.enter_spontaneous(sub).expect("enter");

    // Three hours remaining.
    fx.set(at(1, 9, 0));
    assert!(matches!(fx.engine.extend(&code, 1), Err(EngineError::ExtensionNotAllowed)));

    fx.set(at(1, 11, 30));
    assert!(matches!(fx.engine.extend(&code, 0), Err(EngineError::InvalidRequest(_))));
    assert!(matches!(fx.engine.extend(&code, 5), Err(EngineError::InvalidRequest(_))));
    assert_eq!(fx.engine.extend(&code, 2).expect("extend"), at(1, 14, 0));

    // Past the expected exit nothing can be extended.
    fx.set(at(1, 14, 5));
    assert!(matches!(fx.engine.extend(&code, 1), Err(EngineError::ExtensionNotAllowed)));
}

#[test]
fn test_extension_caps() {
    let fx = fixture(10);
    let sub = fx.subscriber("Dana");
    let (code, _) = fx.engine.enter_spontaneous(sub).expect("enter");

    fx.set(at(1, 11, 30));
    fx.engine.extend(&code, 3).expect("first");
    fx.set(at(1, 14, 30));
    assert!(matches!(
        fx.engine.extend(&code, 2),
        Err(EngineError::ExtensionLimitExceeded)
    ));
    fx.engine.extend(&code, 1).expect("second");
    fx.set(at(1, 15, 30));
    assert!(matches!(
        fx.engine.extend(&code, 1),
        Err(EngineError::ExtensionLimitExceeded)
    ));
    let session = fx.engine.store().find_by_code(&code).expect("session");
    assert_eq!(session.extension_count, 2);
    assert_eq!(session.extension_hours, 4);
    assert_eq!(session.expected_exit, Some(at(1, 16, 0)));
}

#[test]
fn test_extend_reserved_session_not_allowed() {
    let fx = fixture(10);
    let sub = fx.subscriber("Dana");
    let code = fx.engine.reserve(sub, "2024-05-02 09:00").expect("reserve");
    assert!(matches!(fx.engine.extend(&code, 1), Err(EngineError::ExtensionNotAllowed)));
}

#[test]
fn test_recover_code() {
    let fx = fixture(10);
    let sub = fx.subscriber("Dana");
    assert!(matches!(fx.engine.recover_code(sub), Err(EngineError::NoActiveSession)));

    let later = fx.engine.reserve(sub, "2024-05-05 09:00").expect("reserve");
    let sooner = fx.engine.reserve(sub, "2024-05-03 09:00").expect("reserve");
    assert_eq!(fx.engine.recover_code(sub).expect("recover"), sooner);

    fx.engine.cancel(sub, &sooner).expect("cancel");
    assert_eq!(fx.engine.recover_code(sub).expect("recover"), later);

    let (active, _) = fx.engine.enter_spontaneous(sub).expect("enter");
    assert_eq!(fx.engine.recover_code(sub).expect("recover"), active);
}

#[test]
fn test_prune_expired_reservations() {
    let fx = fixture(10);
    let sub = fx.subscriber("Dana");
    let events = fx.engine.subscribe();
    let missed = fx.engine.reserve(sub, "2024-05-02 09:00").expect("reserve");
    let kept = fx.engine.reserve(sub, "2024-05-02 11:00").expect("reserve");

    fx.set(at(2, 9, 31));
    assert_eq!(fx.engine.prune_expired_reservations(), 1);
    assert_eq!(fx.engine.prune_expired_reservations(), 0);

    let missed = fx.engine.store().find_by_code(&missed).expect("session");
    assert_eq!(missed.status, SessionStatus::Cancelled);
    let kept = fx.engine.store().find_by_code(&kept).expect("session");
    assert_eq!(kept.status, SessionStatus::Reserved);
    assert_eq!(fx.engine.scheduler().committed(at(2, 9, 0)), 0);

    let expired: Vec<_> = events
        .try_iter()
        .filter(|e| matches!(e, EngineEvent::Expired { .. }))
        .collect();
    assert_eq!(expired.len(), 1);
}

#[test]
fn test_history_in_creation_order() {
    let fx = fixture(10);
    let sub = fx.subscriber("Dana");
    let first = fx.engine.reserve(sub, "2024-05-03 09:00").expect("reserve");
    let (second, _) = fx.engine.enter_spontaneous(sub).expect("enter");
    fx.clock.advance(TimeDelta::minutes(45));
    fx.engine.exit(&second).expect("exit");

    let history = fx.engine.history(sub).expect("history");
    let codes: Vec<_> = history.iter().map(|s| s.parking_code.clone()).collect();
    assert_eq!(codes, [first, second]);
    assert_eq!(fx.engine.subscriber(sub).expect("sub").history.len(), 2);
    for s in &history {
        assert!(s.exit_time.is_none() || s.status.is_finished());
    }
}

#[test]
fn test_events_follow_transitions() {
    let fx = fixture(10);
    let sub = fx.subscriber("Dana");
    let events = fx.engine.subscribe();
    let (code, spot) = fx.engine.enter_spontaneous(sub).expect("enter");
    fx.engine.exit(&code).expect("exit");

    let received: Vec<_> = events.try_iter().collect();
    assert_eq!(received.len(), 4);
    assert!(matches!(received[0], EngineEvent::Entered { spot: s, .. } if s == spot));
    assert!(matches!(
        received[1],
        EngineEvent::AvailabilityChanged { available: 9, total: 10 }
    ));
    assert!(matches!(received[2], EngineEvent::Exited { late: false, .. }));
    assert!(matches!(
        received[3],
        EngineEvent::AvailabilityChanged { available: 10, total: 10 }
    ));
}

#[test]
fn test_reports_over_finished_sessions() {
    let fx = fixture(10);
    let a = fx.subscriber("Dana");
    let b = fx.subscriber("Omer");
    let (code_a, _) = fx.engine.enter_spontaneous(a).expect("enter");
    let (code_b, _) = fx.engine.enter_spontaneous(b).expect("enter");
    fx.set(at(1, 10, 0));
    fx.engine.exit(&code_a).expect("exit");
    fx.set(at(1, 12, 30));
    fx.engine.exit(&code_b).expect("exit late");

    let report = fx.engine.current_month_report().expect("report");
    assert_eq!(report.occupied, 0);
    let times = report.parking_time.expect("parking time section");
    assert_eq!(times.total_parkings, 2);
    assert_eq!(times.late_exits, 1);
    assert_eq!(times.min_duration_minutes, 120);
    assert_eq!(times.max_duration_minutes, 270);
    assert!((times.late_exit_percentage - 50.0).abs() < f64::EPSILON);
}
