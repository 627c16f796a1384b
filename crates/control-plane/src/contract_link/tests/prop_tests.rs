use chrono::TimeDelta;
use proptest::prelude::*;

use super::machine::{create_sm, get_state};
use crate::{
    contract_link::{
        ContractLinkEventKind, ContractLinkSM, ContractLinkStatus, ContractLinkUpdate, LinkCommand,
    },
    prop_deterministic, prop_no_silent_acceptance, prop_terminal_states_reject,
    testing::fixtures::epoch,
};

fn arb_status() -> impl Strategy<Value = ContractLinkStatus> {
    prop_oneof![
        Just(ContractLinkStatus::Pending),
        Just(ContractLinkStatus::Active),
        Just(ContractLinkStatus::Suspended),
        Just(ContractLinkStatus::Failed),
        Just(ContractLinkStatus::Retired),
    ]
}

fn arb_reason() -> impl Strategy<Value = String> {
    prop_oneof![Just(String::new()), "[a-z]{1,10}"]
}

/// Updates always set a `gas-` profile, which the fixture link never has.
fn arb_command() -> impl Strategy<Value = LinkCommand> {
    let at = (0i64..10_000).prop_map(|secs| epoch() + TimeDelta::seconds(secs));
    prop_oneof![
        (
            prop_oneof![
                Just("alice"),
                Just("BOB"),
                Just("carol"),
                Just("mallory"),
                Just(" "),
            ],
            at.clone()
        )
            .prop_map(|(approver, at)| LinkCommand::Approve {
                approver: approver.to_string(),
                at,
            }),
        ("gas-[a-z]{1,6}", at.clone()).prop_map(|(gas, at)| LinkCommand::Update {
            update: ContractLinkUpdate::default().with_gas_profile(&gas),
            at,
        }),
        (arb_reason(), at.clone()).prop_map(|(reason, at)| LinkCommand::Suspend { reason, at }),
        at.clone().prop_map(|at| LinkCommand::Resume { at }),
        (arb_reason(), at.clone()).prop_map(|(reason, at)| LinkCommand::Retire { reason, at }),
        (arb_reason(), at).prop_map(|(code, at)| LinkCommand::ReportFailure {
            code,
            detail: "detail".to_string(),
            at,
        }),
    ]
}

fn snapshot(sm: &ContractLinkSM) -> ContractLinkSM {
    sm.clone()
}

prop_deterministic!(create_sm, get_state, arb_status(), arb_command());

prop_terminal_states_reject!(
    create_sm,
    Just(ContractLinkStatus::Retired),
    arb_command()
);

prop_no_silent_acceptance!(create_sm, snapshot, arb_status(), arb_command());

proptest! {
    #[test]
    fn version_counts_effective_commands(
        commands in proptest::collection::vec(arb_command(), 1..20),
    ) {
        use crate::state_machine::StateMachine;

        let mut sm = create_sm(ContractLinkStatus::Pending);
        let mut effective = 0u64;
        let mut activations = 0usize;
        for command in commands {
            if let Ok(output) = sm.process_event(command) {
                // repeating a gas profile is an accepted no-op
                if !output.notifications.is_empty() {
                    effective += 1;
                }
                activations += output
                    .notifications
                    .iter()
                    .filter(|e| e.kind == ContractLinkEventKind::Activated)
                    .count();
            }
        }
        prop_assert_eq!(sm.link().version, 1 + effective);
        prop_assert!(activations <= 1);
    }
}
