//! Bounded, best-effort fan-out of lifecycle events.
//!
//! Every subscriber owns a bounded queue. Publishing never blocks: when a subscriber's queue is
//! full the event is dropped for that subscriber only, and subscribers whose receiving half has
//! gone away are pruned on the next publish. Delivery is at-most-once and there is no replay.
//!
//! Callback listeners are also supported. A listener that panics is isolated from the producer
//! and from the other listeners.

use std::{
    collections::HashMap,
    fmt,
    panic::{catch_unwind, AssertUnwindSafe},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Weak,
    },
};

use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{trace, warn};

use crate::subscription::Subscription;

type Listener<E> = Arc<dyn Fn(&E) + Send + Sync>;

struct BusInner<E> {
    /// Name used in log lines.
    name: &'static str,
    next_id: AtomicU64,
    subscribers: Mutex<HashMap<u64, mpsc::Sender<E>>>,
    listeners: RwLock<Vec<(u64, Listener<E>)>>,
}

/// A fan-out point for events of type `E`.
///
/// Cloning the bus is cheap and every clone publishes to the same set of subscribers.
pub struct EventBus<E> {
    inner: Arc<BusInner<E>>,
}

impl<E> Clone for EventBus<E> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<E> fmt::Debug for EventBus<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("name", &self.inner.name)
            .field("subscribers", &self.inner.subscribers.lock().len())
            .field("listeners", &self.inner.listeners.read().len())
            .finish()
    }
}

impl<E> EventBus<E>
where
    E: Clone + Send + 'static,
{
    /// Creates a bus with no subscribers. `name` only shows up in logs.
    pub fn new(name: &'static str) -> Self {
        Self {
            inner: Arc::new(BusInner {
                name,
                next_id: AtomicU64::new(0),
                subscribers: Mutex::new(HashMap::new()),
                listeners: RwLock::new(Vec::new()),
            }),
        }
    }

    /// Registers a new subscriber with a queue of `buffer` events.
    ///
    /// A `buffer` of zero is treated as one. The returned [`CancelHandle`] unregisters the
    /// subscriber and closes its stream; events already queued stay readable.
    pub fn subscribe(&self, buffer: usize) -> (Subscription<E>, CancelHandle) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner.subscribers.lock().insert(id, tx);
        trace!(bus = self.inner.name, %id, %buffer, "subscriber registered");

        let weak: Weak<BusInner<E>> = Arc::downgrade(&self.inner);
        let cancel = CancelHandle::new(move || {
            if let Some(inner) = weak.upgrade() {
                if inner.subscribers.lock().remove(&id).is_some() {
                    trace!(bus = inner.name, %id, "subscriber cancelled");
                }
            }
        });

        (Subscription::from_receiver(rx), cancel)
    }

    /// Registers a callback invoked synchronously for every published event.
    pub fn register_listener<F>(&self, listener: F) -> CancelHandle
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner.listeners.write().push((id, Arc::new(listener)));

        let weak: Weak<BusInner<E>> = Arc::downgrade(&self.inner);
        CancelHandle::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.listeners.write().retain(|(lid, _)| *lid != id);
            }
        })
    }

    /// Publishes a single event to every subscriber and listener.
    pub fn publish(&self, event: E) {
        {
            let mut subs = self.inner.subscribers.lock();
            subs.retain(|id, tx| match tx.try_send(event.clone()) {
                Ok(()) => true,
                Err(TrySendError::Full(_)) => {
                    trace!(bus = self.inner.name, %id, "subscriber queue full, event dropped");
                    true
                }
                Err(TrySendError::Closed(_)) => {
                    trace!(bus = self.inner.name, %id, "subscriber gone, pruning");
                    false
                }
            });
        }

        // listeners run outside the subscriber lock so they may subscribe or cancel themselves
        let listeners: Vec<Listener<E>> = self
            .inner
            .listeners
            .read()
            .iter()
            .map(|(_, l)| l.clone())
            .collect();
        for listener in listeners {
            if catch_unwind(AssertUnwindSafe(|| listener(&event))).is_err() {
                warn!(bus = self.inner.name, "event listener panicked");
            }
        }
    }

    /// Publishes events in order.
    pub fn publish_all(&self, events: impl IntoIterator<Item = E>) {
        for event in events {
            self.publish(event);
        }
    }

    /// Number of currently registered subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.lock().len()
    }
}

/// Unregisters a subscriber or listener.
///
/// Cancelling is idempotent; only the first call has an effect. Dropping the handle does *not*
/// cancel.
pub struct CancelHandle {
    cancel: Mutex<Option<Box<dyn FnOnce() + Send>>>,
}

impl CancelHandle {
    fn new(f: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Mutex::new(Some(Box::new(f))),
        }
    }

    /// Unregisters and closes the associated stream.
    pub fn cancel(&self) {
        let f = self.cancel.lock().take();
        if let Some(f) = f {
            f();
        }
    }

    /// Whether [`Self::cancel`] has already been called.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.lock().is_none()
    }
}

impl fmt::Debug for CancelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelHandle")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
