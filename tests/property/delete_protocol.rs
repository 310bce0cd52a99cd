// Copyright (c) 2025 - Cowboy AI, Inc.
//! Property-Based Tests for the Delete Protocol
//!
//! Arbitrary event sequences are fed to the protocol; events it rejects are
//! skipped, so every run explores some path the remote could actually
//! produce.

use cdn_reconciler::state_machine::{
    DeleteEvent, DeleteOutcome, DeletePhase, DeleteProtocol, DeleteStep, StateMachine,
};
use proptest::prelude::*;

// ============================================================================
// Property Test Strategies
// ============================================================================

fn delete_event() -> impl Strategy<Value = DeleteEvent> {
    prop_oneof![
        4 => Just(DeleteEvent::Deployed),
        1 => Just(DeleteEvent::NotFound),
        2 => Just(DeleteEvent::Deleted),
        3 => Just(DeleteEvent::Busy),
        3 => Just(DeleteEvent::InspectedEnabled),
        3 => any::<bool>().prop_map(|deployed| DeleteEvent::InspectedDisabled { deployed }),
        3 => Just(DeleteEvent::DisableApplied),
    ]
}

fn event_sequence() -> impl Strategy<Value = Vec<DeleteEvent>> {
    prop::collection::vec(delete_event(), 0..40)
}

/// One accepted transition
#[derive(Debug, Clone, Copy)]
struct Step {
    from: DeletePhase,
    event: DeleteEvent,
    to: DeletePhase,
    step: DeleteStep,
}

/// Apply every event the protocol accepts, skipping the rest
fn run(retain: bool, events: &[DeleteEvent]) -> (DeleteProtocol, Vec<Step>) {
    let mut protocol = DeleteProtocol::new(retain);
    let mut taken = Vec::new();
    for event in events {
        if let Ok((next, step)) = protocol.transition(event) {
            taken.push(Step {
                from: protocol.phase(),
                event: *event,
                to: next.phase(),
                step,
            });
            protocol = next;
        }
    }
    (protocol, taken)
}

// ============================================================================
// Property Tests
// ============================================================================

proptest! {
    /// Property: A retaining protocol never asks for a delete call
    #[test]
    fn prop_retain_never_deletes(events in event_sequence()) {
        let (protocol, taken) = run(true, &events);

        prop_assert!(taken.iter().all(|s| s.step != DeleteStep::Delete));
        prop_assert!(protocol.phase() != DeletePhase::Deleting);
        prop_assert!(protocol.phase() != DeletePhase::FinalDeleting);
    }

    /// Property: After a refused delete, the next delete only follows a
    /// confirmed disabled-and-deployed state
    #[test]
    fn prop_final_delete_requires_deployed_disable(events in event_sequence()) {
        let (_, taken) = run(false, &events);

        for step in taken.iter().filter(|s| s.to == DeletePhase::FinalDeleting) {
            let confirmed = matches!(
                (step.from, step.event),
                (DeletePhase::AwaitingDisabled, DeleteEvent::Deployed)
                    | (DeletePhase::Inspecting, DeleteEvent::InspectedDisabled { deployed: true })
            );
            prop_assert!(confirmed, "unexpected route into final delete: {:?}", step);
        }
    }

    /// Property: Terminal phases accept no further input
    #[test]
    fn prop_terminal_phases_are_final(retain in any::<bool>(), events in event_sequence()) {
        let (protocol, taken) = run(retain, &events);

        let finished = taken.iter().position(|s| matches!(s.step, DeleteStep::Finish(_)));
        if let Some(index) = finished {
            prop_assert_eq!(index, taken.len() - 1);
            prop_assert!(protocol.is_terminal());
        } else {
            prop_assert!(!protocol.is_terminal());
        }
    }

    /// Property: NotFound ends any unfinished protocol as already absent
    #[test]
    fn prop_not_found_is_success(retain in any::<bool>(), events in event_sequence()) {
        let (protocol, _) = run(retain, &events);
        prop_assume!(!protocol.is_terminal());

        let (next, step) = protocol
            .transition(&DeleteEvent::NotFound)
            .expect("NotFound accepted from every open phase");
        prop_assert_eq!(next.phase(), DeletePhase::Gone);
        prop_assert_eq!(step, DeleteStep::Finish(DeleteOutcome::AlreadyAbsent));
    }
}
