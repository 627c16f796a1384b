//! Value-based transition testing helpers.
//!
//! These helpers make it easy to write declarative tests for individual transitions and
//! sequences of inputs.

use std::fmt::Debug;

use crate::state_machine::{SMOutput, StateMachine};

/// Describes a valid state transition for value-based testing.
#[derive(Debug)]
pub(crate) struct Transition<S, E> {
    /// The initial state before the transition
    pub(crate) from_state: S,
    /// The input that triggers the transition
    pub(crate) event: E,
    /// The expected state after the transition
    pub(crate) expected_state: S,
    /// How many notifications the transition is expected to emit
    pub(crate) expected_notifications: usize,
}

/// Test a single state transition with concrete values.
///
/// Creates a machine in the initial state, processes the input, and checks both the final
/// state and the number of notifications.
pub(crate) fn test_transition<SM, S, CreateFn, GetStateFn>(
    create_sm: CreateFn,
    get_state: GetStateFn,
    transition: Transition<S, SM::Event>,
) where
    SM: StateMachine,
    SM::Error: Debug,
    S: PartialEq + Debug,
    CreateFn: Fn(S) -> SM,
    GetStateFn: Fn(&SM) -> S,
{
    let mut sm = create_sm(transition.from_state);

    let output = match sm.process_event(transition.event) {
        Ok(output) => output,
        Err(e) => panic!("Expected successful transition, got error: {e:?}"),
    };

    assert_eq!(
        get_state(&sm),
        transition.expected_state,
        "State mismatch after transition"
    );

    assert_eq!(
        output.notifications.len(),
        transition.expected_notifications,
        "Notification count mismatch"
    );
}

/// Describes an invalid state-input pair that should produce an error.
#[derive(Debug)]
pub(crate) struct InvalidTransition<S, E, Err> {
    /// The initial state
    pub(crate) from_state: S,
    /// The input that should be rejected
    pub(crate) event: E,
    /// A function to verify the error type
    pub(crate) expected_error: fn(&Err) -> bool,
}

/// Test that an invalid transition produces the expected error and leaves the state alone.
pub(crate) fn test_invalid_transition<SM, S, CreateFn, GetStateFn>(
    create_sm: CreateFn,
    get_state: GetStateFn,
    invalid: InvalidTransition<S, SM::Event, SM::Error>,
) where
    SM: StateMachine,
    SM::Error: Debug,
    S: PartialEq + Debug + Clone,
    CreateFn: Fn(S) -> SM,
    GetStateFn: Fn(&SM) -> S,
{
    let from = invalid.from_state.clone();
    let mut sm = create_sm(invalid.from_state);

    let err = match sm.process_event(invalid.event) {
        Ok(_) => panic!("Expected error, but transition succeeded"),
        Err(e) => e,
    };

    assert!(
        (invalid.expected_error)(&err),
        "Error type mismatch. Got: {err:?}"
    );
    assert_eq!(get_state(&sm), from, "State changed despite error");
}

/// Input sequence tester.
///
/// Runs a sequence of concrete inputs through a state machine and collects all outputs for
/// verification.
#[derive(Debug)]
pub(crate) struct EventSequence<SM, S, GetStateFn>
where
    SM: StateMachine,
    GetStateFn: Fn(&SM) -> S,
{
    sm: SM,
    get_state: GetStateFn,
    outputs: Vec<SMOutput<SM::Notification>>,
    errors: Vec<(usize, SM::Error)>, // index instead of the input to avoid a Clone bound
}

impl<SM, S, GetStateFn> EventSequence<SM, S, GetStateFn>
where
    SM: StateMachine,
    GetStateFn: Fn(&SM) -> S,
{
    /// Creates a new sequence tester.
    pub(crate) const fn new(sm: SM, get_state: GetStateFn) -> Self {
        Self {
            sm,
            get_state,
            outputs: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// Process an input and record the result.
    pub(crate) fn process(&mut self, event: SM::Event) -> &mut Self {
        let idx = self.outputs.len() + self.errors.len();
        match self.sm.process_event(event) {
            Ok(output) => self.outputs.push(output),
            Err(e) => self.errors.push((idx, e)),
        }
        self
    }

    /// Get the current state.
    pub(crate) fn state(&self) -> S {
        (self.get_state)(&self.sm)
    }

    /// The machine under test.
    pub(crate) const fn machine(&self) -> &SM {
        &self.sm
    }

    /// Assert that all inputs succeeded.
    pub(crate) fn assert_no_errors(&self) -> &Self
    where
        SM::Error: Debug,
    {
        assert!(
            self.errors.is_empty(),
            "Expected no errors, but got {} errors at indices: {:?}",
            self.errors.len(),
            self.errors.iter().map(|(idx, _)| idx).collect::<Vec<_>>()
        );
        self
    }

    /// Assert the final state matches expectation.
    pub(crate) fn assert_final_state(&self, expected: &S) -> &Self
    where
        S: PartialEq + Debug,
    {
        assert_eq!(&self.state(), expected, "Final state mismatch");
        self
    }

    /// Get all notifications emitted during the sequence.
    pub(crate) fn all_notifications(&self) -> Vec<&SM::Notification> {
        self.outputs.iter().flat_map(|o| &o.notifications).collect()
    }

    /// Get all the errors during processing.
    pub(crate) fn all_errors(&self) -> Vec<&SM::Error> {
        self.errors.iter().map(|(_, e)| e).collect()
    }
}
