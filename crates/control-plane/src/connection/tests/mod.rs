//! Tests for the connection state machine and manager.

mod machine;
