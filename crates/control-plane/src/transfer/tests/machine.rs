use chrono::{DateTime, TimeDelta, Utc};
use proptest::prelude::*;

use crate::{
    prop_deterministic, prop_no_silent_acceptance, prop_terminal_states_reject,
    state_machine::StateMachine,
    testing::{
        fixtures::epoch, test_invalid_transition, test_transition, EventSequence,
        InvalidTransition, Transition,
    },
    transfer::{
        BridgeTransfer, TransferCommand, TransferError, TransferEventKind, TransferSM,
        TransferStatus,
    },
};

fn at(secs: i64) -> DateTime<Utc> {
    epoch() + TimeDelta::seconds(secs)
}

/// A transfer due to expire 100 seconds after [`epoch`], forced into `status`.
fn create_sm(status: TransferStatus) -> TransferSM {
    TransferSM::new(BridgeTransfer {
        id: "transfer-1".to_string(),
        bridge_id: "bridge1".to_string(),
        from: "alice".to_string(),
        to: "bob".to_string(),
        amount: 10,
        token_id: "tokenX".to_string(),
        proof: Vec::new(),
        status,
        failure_reason: None,
        created_at: epoch(),
        updated_at: epoch(),
        claimed_at: None,
        expires_at: Some(at(100)),
        metadata: Default::default(),
    })
}

fn get_state(sm: &TransferSM) -> TransferStatus {
    sm.state()
}

#[test]
fn claim_before_deadline() {
    test_transition(
        create_sm,
        get_state,
        Transition {
            from_state: TransferStatus::Pending,
            event: TransferCommand::Claim {
                proof: b"proof".to_vec(),
                at: at(99),
            },
            expected_state: TransferStatus::Claimed,
            expected_notifications: 1,
        },
    );
}

#[test]
fn claim_at_deadline_is_refused() {
    test_invalid_transition(
        create_sm,
        get_state,
        InvalidTransition {
            from_state: TransferStatus::Pending,
            event: TransferCommand::Claim {
                proof: b"proof".to_vec(),
                at: at(100),
            },
            expected_error: |e| matches!(e, TransferError::Expired { .. }),
        },
    );
}

#[test]
fn claim_needs_a_proof() {
    test_invalid_transition(
        create_sm,
        get_state,
        InvalidTransition {
            from_state: TransferStatus::Pending,
            event: TransferCommand::Claim {
                proof: Vec::new(),
                at: at(1),
            },
            expected_error: |e| matches!(e, TransferError::MissingProof(_)),
        },
    );
}

#[test]
fn expire_only_when_due() {
    test_invalid_transition(
        create_sm,
        get_state,
        InvalidTransition {
            from_state: TransferStatus::Pending,
            event: TransferCommand::Expire { at: at(99) },
            expected_error: |e| matches!(e, TransferError::NotDue(_)),
        },
    );
    test_transition(
        create_sm,
        get_state,
        Transition {
            from_state: TransferStatus::Pending,
            event: TransferCommand::Expire { at: at(100) },
            expected_state: TransferStatus::Expired,
            expected_notifications: 1,
        },
    );
}

#[test]
fn fail_records_reason() {
    let mut sm = create_sm(TransferStatus::Pending);
    let output = sm
        .process_event(TransferCommand::Fail {
            reason: " relayer timeout ".to_string(),
            at: at(5),
        })
        .expect("fail");

    assert_eq!(output.notifications[0].kind, TransferEventKind::Failed);
    assert_eq!(
        output.notifications[0].reason.as_deref(),
        Some("relayer timeout")
    );
    assert_eq!(
        sm.transfer().failure_reason.as_deref(),
        Some("relayer timeout")
    );
    assert_eq!(sm.transfer().updated_at, at(5));
}

#[test]
fn double_claim_is_refused() {
    let mut seq = EventSequence::new(create_sm(TransferStatus::Pending), get_state);
    seq.process(TransferCommand::Claim {
        proof: b"proof".to_vec(),
        at: at(1),
    })
    .process(TransferCommand::Claim {
        proof: b"other".to_vec(),
        at: at(2),
    })
    .process(TransferCommand::Fail {
        reason: String::new(),
        at: at(3),
    });

    seq.assert_final_state(&TransferStatus::Claimed);
    assert_eq!(seq.all_notifications().len(), 1);
    assert_eq!(seq.all_errors().len(), 2);
    assert!(seq
        .all_errors()
        .iter()
        .all(|e| matches!(e, TransferError::Finalized { status: TransferStatus::Claimed, .. })));
    assert_eq!(seq.machine().transfer().proof, b"proof".to_vec());
    assert_eq!(seq.machine().transfer().claimed_at, Some(at(1)));
}

fn arb_status() -> impl Strategy<Value = TransferStatus> {
    prop_oneof![
        Just(TransferStatus::Pending),
        Just(TransferStatus::Claimed),
        Just(TransferStatus::Failed),
        Just(TransferStatus::Expired),
    ]
}

fn arb_terminal() -> impl Strategy<Value = TransferStatus> {
    prop_oneof![
        Just(TransferStatus::Claimed),
        Just(TransferStatus::Failed),
        Just(TransferStatus::Expired),
    ]
}

fn arb_command() -> impl Strategy<Value = TransferCommand> {
    let when = (0i64..200).prop_map(at);
    prop_oneof![
        (proptest::collection::vec(any::<u8>(), 0..8), when.clone())
            .prop_map(|(proof, at)| TransferCommand::Claim { proof, at }),
        ("[a-z ]{0,8}", when.clone()).prop_map(|(reason, at)| TransferCommand::Fail { reason, at }),
        when.prop_map(|at| TransferCommand::Expire { at }),
    ]
}

fn snapshot(sm: &TransferSM) -> TransferSM {
    sm.clone()
}

prop_deterministic!(create_sm, get_state, arb_status(), arb_command());

prop_terminal_states_reject!(create_sm, arb_terminal(), arb_command());

prop_no_silent_acceptance!(create_sm, snapshot, arb_status(), arb_command());
