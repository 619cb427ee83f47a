//! Property tests for status monotonicity
//!
//! Arbitrary sequences of lifecycle events never move an appointment backwards
//! and never leave a terminal state, both in the pure state machine and in the
//! store's conditional write.

use proptest::prelude::*;

use office_hours::store::status_write_allowed;
use office_hours::workflow::{transition, Effect, StatusEvent};
use office_hours::AppointmentStatus;

fn status() -> impl Strategy<Value = AppointmentStatus> {
    prop_oneof![
        Just(AppointmentStatus::Pending),
        Just(AppointmentStatus::Read),
        Just(AppointmentStatus::Approved),
        Just(AppointmentStatus::NotApproved),
    ]
}

fn event() -> impl Strategy<Value = StatusEvent> {
    prop_oneof![
        Just(StatusEvent::Opened),
        Just(StatusEvent::FollowUp),
        status().prop_map(StatusEvent::Decided),
    ]
}

proptest! {
    #[test]
    fn prop_status_never_moves_backwards(events in prop::collection::vec(event(), 0..32)) {
        let mut current = AppointmentStatus::Pending;
        let mut decided: Option<AppointmentStatus> = None;

        for event in &events {
            if let Ok(step) = transition(current, event) {
                prop_assert_eq!(step.from, current);
                prop_assert!(step.to.rank() >= current.rank());
                if current.is_terminal() {
                    prop_assert_eq!(step.to, current);
                }
                current = step.to;
            }
            if current.is_terminal() {
                match decided {
                    Some(first) => prop_assert_eq!(first, current),
                    None => decided = Some(current),
                }
            }
        }
    }

    #[test]
    fn prop_decision_effects_notify_first(from in status(), target in status()) {
        if let Ok(step) = transition(from, &StatusEvent::Decided(target)) {
            prop_assert!(step.to.is_terminal());
            prop_assert_eq!(step.effects.first(), Some(&Effect::Notify));
            let notify = step.effects.iter().position(|e| *e == Effect::Notify);
            let persist = step.effects.iter().position(|e| matches!(e, Effect::PersistStatus(_)));
            prop_assert!(notify < persist);
        }
    }

    #[test]
    fn prop_store_rejects_backward_writes(current in status(), requested in status()) {
        if status_write_allowed(current, requested) {
            prop_assert!(requested.rank() >= current.rank());
            if current.is_terminal() {
                prop_assert_eq!(requested, current);
            }
        }
    }
}
