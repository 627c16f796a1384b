use chrono::TimeDelta;

use crate::{
    connection::{
        ConnectionCommand, ConnectionError, ConnectionEventKind, ConnectionFault,
        ConnectionSM, ConnectionStatus, FaultSeverity,
    },
    state_machine::StateMachine,
    testing::{
        fixtures::{connection_in, epoch},
        test_invalid_transition, test_transition, EventSequence, InvalidTransition, Transition,
    },
};

pub(super) fn create_sm(status: ConnectionStatus) -> ConnectionSM {
    ConnectionSM::from_connection(connection_in(status))
}

pub(super) fn get_state(sm: &ConnectionSM) -> ConnectionStatus {
    sm.state()
}

fn fault(code: &str) -> ConnectionFault {
    ConnectionFault {
        code: code.to_string(),
        detail: "relayer unreachable".to_string(),
        severity: FaultSeverity::Critical,
        occurred_at: epoch() + TimeDelta::seconds(5),
        recovered: false,
    }
}

#[test]
fn heartbeat_keeps_active() {
    test_transition(
        create_sm,
        get_state,
        Transition {
            from_state: ConnectionStatus::Active,
            event: ConnectionCommand::Heartbeat {
                at: epoch() + TimeDelta::seconds(3),
            },
            expected_state: ConnectionStatus::Active,
            expected_notifications: 1,
        },
    );
}

#[test]
fn close_from_active_emits_closing_then_closed() {
    let mut sm = create_sm(ConnectionStatus::Active);
    let at = epoch() + TimeDelta::seconds(9);

    let output = sm
        .process_event(ConnectionCommand::Close {
            reason: "  maintenance ".to_string(),
            at,
        })
        .expect("close must succeed")
        .notifications;

    let kinds: Vec<_> = output.iter().map(|e| e.kind).collect();
    assert_eq!(
        kinds,
        vec![ConnectionEventKind::Closing, ConnectionEventKind::Closed]
    );
    assert_eq!(output[0].status, ConnectionStatus::Closing);
    assert_eq!(output[0].connection.status, ConnectionStatus::Closing);
    assert_eq!(output[1].status, ConnectionStatus::Closed);

    let conn = sm.connection();
    assert_eq!(conn.status, ConnectionStatus::Closed);
    assert_eq!(conn.closed_at, Some(at));
    assert_eq!(conn.closing_reason.as_deref(), Some("maintenance"));
}

#[test]
fn close_from_closing_completes() {
    test_transition(
        create_sm,
        get_state,
        Transition {
            from_state: ConnectionStatus::Closing,
            event: ConnectionCommand::Close {
                reason: String::new(),
                at: epoch(),
            },
            expected_state: ConnectionStatus::Closed,
            expected_notifications: 1,
        },
    );
}

#[test]
fn fail_records_fault() {
    let mut sm = create_sm(ConnectionStatus::Active);
    let output = sm
        .process_event(ConnectionCommand::Fail {
            fault: fault("RELAYER_DOWN"),
        })
        .expect("fail must succeed")
        .notifications;

    assert_eq!(output.len(), 1);
    assert_eq!(output[0].kind, ConnectionEventKind::Failed);
    assert_eq!(
        output[0].fault.as_ref().map(|f| f.code.as_str()),
        Some("RELAYER_DOWN")
    );
    assert_eq!(sm.state(), ConnectionStatus::Failed);
    assert_eq!(sm.connection().faults.len(), 1);
    assert_eq!(
        sm.connection().closed_at,
        Some(epoch() + TimeDelta::seconds(5))
    );
}

#[test]
fn heartbeat_while_closing_is_rejected() {
    test_invalid_transition(
        create_sm,
        get_state,
        InvalidTransition {
            from_state: ConnectionStatus::Closing,
            event: ConnectionCommand::Heartbeat { at: epoch() },
            expected_error: |e| matches!(e, ConnectionError::InvalidTransition { .. }),
        },
    );
}

#[test]
fn terminal_states_reject_everything() {
    for status in [ConnectionStatus::Closed, ConnectionStatus::Failed] {
        for event in [
            ConnectionCommand::Heartbeat { at: epoch() },
            ConnectionCommand::Close {
                reason: "again".to_string(),
                at: epoch(),
            },
            ConnectionCommand::Fail {
                fault: fault("LATE"),
            },
        ] {
            test_invalid_transition(
                create_sm,
                get_state,
                InvalidTransition {
                    from_state: status,
                    event,
                    expected_error: |e| matches!(e, ConnectionError::Closed { .. }),
                },
            );
        }
    }
}

#[test]
fn full_lifecycle_sequence() {
    let mut seq = EventSequence::new(create_sm(ConnectionStatus::Active), get_state);

    seq.process(ConnectionCommand::Heartbeat {
        at: epoch() + TimeDelta::seconds(1),
    })
    .process(ConnectionCommand::Heartbeat {
        at: epoch() + TimeDelta::seconds(2),
    })
    .process(ConnectionCommand::Close {
        reason: "done".to_string(),
        at: epoch() + TimeDelta::seconds(3),
    });

    seq.assert_no_errors()
        .assert_final_state(&ConnectionStatus::Closed);
    assert_eq!(seq.all_notifications().len(), 4);
    assert_eq!(
        seq.machine().connection().last_heartbeat,
        epoch() + TimeDelta::seconds(2)
    );

    // a close after the fact is an error and changes nothing
    seq.process(ConnectionCommand::Close {
        reason: "twice".to_string(),
        at: epoch() + TimeDelta::seconds(4),
    });
    assert_eq!(seq.all_errors().len(), 1);
    assert_eq!(
        seq.machine().connection().closing_reason.as_deref(),
        Some("done")
    );
}

#[test]
fn staleness_respects_tolerance() {
    let sm = create_sm(ConnectionStatus::Active);
    // interval 10s, tolerance 3 => stale strictly after 30s of silence
    assert!(!sm.is_stale(epoch() + TimeDelta::seconds(30), 3));
    assert!(sm.is_stale(epoch() + TimeDelta::seconds(31), 3));
    assert!(!sm.is_stale(epoch() + TimeDelta::seconds(31), 4));

    let closed = create_sm(ConnectionStatus::Closed);
    assert!(!closed.is_stale(epoch() + TimeDelta::days(1), 1));
}
