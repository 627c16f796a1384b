//! Tests for the transfer state machine and manager.

mod machine;
