//! This module contains the core [`Subscription`] type that consumers of this API will use to
//! observe new events.
use std::{
    pin::Pin,
    task::{Context, Poll},
};

use tokio::sync::mpsc::{self, error::TryRecvError};

/// A generic subscription type for event streams. It wraps a bounded channel receiver
/// and implements [`futures::Stream`] for consuming events asynchronously.
///
/// The stream ends once the subscription has been cancelled (or its producer dropped) and every
/// event already queued has been read.
#[derive(Debug)]
pub struct Subscription<T> {
    receiver: mpsc::Receiver<T>,
}

impl<T> Subscription<T> {
    /// Creates a new subscription from a bounded receiver.
    pub const fn from_receiver(receiver: mpsc::Receiver<T>) -> Subscription<T> {
        Subscription { receiver }
    }

    /// Returns the number of messages in the backlog for this subscription.
    pub fn backlog(&self) -> usize {
        self.receiver.len()
    }

    /// Waits for the next event. Returns `None` once the stream is closed and drained.
    pub async fn recv(&mut self) -> Option<T> {
        self.receiver.recv().await
    }

    /// Takes the next queued event without waiting.
    pub fn try_recv(&mut self) -> Result<T, TryRecvError> {
        self.receiver.try_recv()
    }

    /// Drains every event currently queued.
    pub fn drain(&mut self) -> Vec<T> {
        let mut out = Vec::with_capacity(self.backlog());
        while let Ok(ev) = self.receiver.try_recv() {
            out.push(ev);
        }
        out
    }

    /// Whether the producing side has been closed. Queued events may still be readable.
    pub fn is_closed(&self) -> bool {
        self.receiver.is_closed()
    }
}

impl<T> futures::Stream for Subscription<T> {
    type Item = T;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().receiver.poll_recv(cx)
    }
}
