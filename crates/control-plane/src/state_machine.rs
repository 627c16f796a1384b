//! Generic state machine infrastructure for the control plane.
//!
//! Connections, contract links and bridge transfers are each driven by a pure state machine.
//! The managers own the locking, clocks and event publication; the machines own nothing but the
//! entity record and the transition table.
//!
//! DESIGN PRINCIPLE: every input is either consumed (the entity changes and at least one
//! notification is emitted) or rejected with an error (the entity is left untouched). There is
//! no silent acceptance.

/// Generic output from any state machine after processing an input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SMOutput<N> {
    /// The notifications to publish to observers, in order.
    pub notifications: Vec<N>,
}

impl<N> Default for SMOutput<N> {
    fn default() -> Self {
        Self {
            notifications: Vec::new(),
        }
    }
}

impl<N> SMOutput<N> {
    /// Creates a new empty output.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an output carrying the given notifications.
    pub const fn with_notifications(notifications: Vec<N>) -> Self {
        Self { notifications }
    }

    /// Appends a notification.
    pub fn push(&mut self, notification: N) {
        self.notifications.push(notification);
    }
}

/// Trait for all lifecycle state machines in the control plane.
///
/// Each implementation specifies the input it accepts, the notifications it emits and its error
/// type through associated types.
///
/// # Example
///
/// ```ignore
/// impl StateMachine for TransferSM {
///     type Event = TransferCommand;
///     type Notification = TransferEvent;
///     type Error = TransferError;
///
///     fn process_event(&mut self, event: Self::Event)
///         -> Result<SMOutput<Self::Notification>, Self::Error>
///     {
///         // Implementation
///     }
/// }
/// ```
pub trait StateMachine {
    /// The type of inputs this state machine can process.
    type Event;

    /// The type of notifications this state machine emits.
    type Notification;

    /// The error type returned when processing fails.
    type Error;

    /// Processes an input and returns the notifications it produced, or an error.
    ///
    /// On error the machine must be left exactly as it was before the call.
    fn process_event(
        &mut self,
        event: Self::Event,
    ) -> Result<SMOutput<Self::Notification>, Self::Error>;
}
