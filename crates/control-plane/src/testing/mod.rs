//! Generic testing utilities for state machines.
//!
//! This module provides reusable testing infrastructure for all state machines
//! implementing the `StateMachine` trait, plus fixtures shared by the manager tests.
//!
//! ## Organization
//!
//! - [`fixtures`] - Clocks, verifiers and id generators for deterministic tests
//! - [`transition`] - Value-based transition testing helpers
//! - [`proptest`] - Property-based testing macros

pub(crate) mod fixtures;
pub(crate) mod proptest;
pub(crate) mod transition;

pub(crate) use transition::{
    test_invalid_transition, test_transition, EventSequence, InvalidTransition, Transition,
};
