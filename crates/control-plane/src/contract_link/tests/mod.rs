//! Tests for the contract link state machine and manager.

mod prop_tests;
