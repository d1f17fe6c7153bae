//! # Event Dispatch
//!
//! Two delivery mechanisms for typed events, both generic over the event type:
//!
//! - [`EventDispatcher`]: synchronous, in-order fan-out to registered
//!   listeners. Listeners are held weakly, so dropping the listener `Arc`
//!   unregisters it without the producer ever knowing about the consumer.
//! - [`EventBus`]: `tokio::sync::broadcast` channel for async consumers that
//!   prefer to pull events from a stream.
//!
//! ## Architecture
//!
//! ```text
//!                  dispatch       ┌─────────────────┐   on_event   ┌──────────┐
//! ┌───────────┐  ───────────────> │ EventDispatcher ├────────────> │ Listener │
//! │ Producer  │                   └─────────────────┘   (Weak)     └──────────┘
//! └───────────┘     emit          ┌─────────────────┐   recv       ┌──────────┐
//!                ───────────────> │    EventBus     ├────────────> │  Stream  │
//!                                 └─────────────────┘              └──────────┘
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::events::EventDispatcher;
//! use std::sync::Arc;
//!
//! let dispatcher = EventDispatcher::<String>::new();
//! let listener = Arc::new(|event: &String| println!("{event}"));
//! dispatcher.add_listener(&listener);
//!
//! dispatcher.emit(&"hello".to_string());
//! drop(listener); // unregistered
//! ```

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::broadcast::{self, error::RecvError, error::SendError, Receiver};

/// Default buffer size for event bus channels.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    /// Debug-level events (verbose)
    Debug,
    /// Informational events
    Info,
    /// Warning events
    Warning,
    /// Error events
    Error,
}

// ============================================================================
// Listener Dispatch
// ============================================================================

/// Receiver of dispatched events.
///
/// Any `Fn(&E)` closure that is `Send + Sync` is a listener.
pub trait EventListener<E>: Send + Sync {
    fn on_event(&self, event: &E);
}

impl<E, F> EventListener<E> for F
where
    F: Fn(&E) + Send + Sync,
{
    fn on_event(&self, event: &E) {
        self(event)
    }
}

/// Registration handle returned by [`EventDispatcher::add_listener`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

struct Registration<E> {
    id: ListenerId,
    listener: Weak<dyn EventListener<E>>,
}

/// Synchronous fan-out to weakly held listeners.
///
/// Events are delivered in registration order, on the caller's thread, from a
/// snapshot of the listener list taken before delivery. A listener may
/// therefore add or remove listeners (itself included) while handling an event
/// without deadlocking; the change applies from the next `emit`.
pub struct EventDispatcher<E> {
    listeners: Mutex<Vec<Registration<E>>>,
    next_id: AtomicU64,
}

impl<E> EventDispatcher<E> {
    pub fn new() -> Self {
        Self {
            listeners: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register `listener`. The dispatcher only keeps a weak reference; the
    /// listener is dropped from the list once the caller's `Arc` goes away.
    pub fn add_listener<L>(&self, listener: &Arc<L>) -> ListenerId
    where
        L: EventListener<E> + 'static,
    {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let listener: Arc<dyn EventListener<E>> = listener.clone();
        let weak = Arc::downgrade(&listener);
        self.listeners.lock().push(Registration { id, listener: weak });
        id
    }

    /// Unregister explicitly. Returns `false` for unknown ids.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.lock();
        let before = listeners.len();
        listeners.retain(|registration| registration.id != id);
        listeners.len() != before
    }

    /// Deliver `event` to every live listener, in registration order.
    ///
    /// Returns the number of listeners that received it.
    pub fn emit(&self, event: &E) -> usize {
        let live: Vec<Arc<dyn EventListener<E>>> = {
            let mut listeners = self.listeners.lock();
            listeners.retain(|registration| registration.listener.strong_count() > 0);
            listeners
                .iter()
                .filter_map(|registration| registration.listener.upgrade())
                .collect()
        };

        for listener in &live {
            listener.on_event(event);
        }
        live.len()
    }

    /// Number of listeners still alive.
    pub fn listener_count(&self) -> usize {
        self.listeners
            .lock()
            .iter()
            .filter(|registration| registration.listener.strong_count() > 0)
            .count()
    }
}

impl<E> Default for EventDispatcher<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> fmt::Debug for EventDispatcher<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("listener_count", &self.listener_count())
            .finish()
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central broadcast channel for publishing events to async subscribers.
///
/// # Example
///
/// ```ignore
/// use core_runtime::events::EventBus;
///
/// let bus = EventBus::<u32>::new(16);
/// let mut rx = bus.subscribe();
/// bus.emit(7).ok();
/// assert_eq!(rx.recv().await?, 7);
/// ```
pub struct EventBus<E> {
    sender: broadcast::Sender<E>,
}

impl<E: Clone> EventBus<E> {
    /// Creates a new event bus with the specified buffer size.
    ///
    /// # Arguments
    ///
    /// * `capacity` - Maximum number of events to buffer per subscriber.
    ///   When a subscriber falls behind by more than this amount, it will
    ///   receive a `RecvError::Lagged` error.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event.
    /// Returns an error if there are no active subscribers.
    pub fn emit(&self, event: E) -> Result<usize, SendError<E>> {
        self.sender.send(event)
    }

    /// Creates a new subscriber. Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<E> {
        self.sender.subscribe()
    }

    /// Returns the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl<E: Clone> Default for EventBus<E> {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl<E> Clone for EventBus<E> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

impl<E> fmt::Debug for EventBus<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.sender.receiver_count())
            .finish()
    }
}

// ============================================================================
// Event Stream Wrapper
// ============================================================================

/// Type alias for event filter functions.
type EventFilter<E> = Box<dyn Fn(&E) -> bool + Send + Sync>;

/// A wrapper around `broadcast::Receiver` with optional filtering.
pub struct EventStream<E> {
    receiver: Receiver<E>,
    filter: Option<EventFilter<E>>,
}

impl<E: Clone> EventStream<E> {
    /// Creates a new event stream from a receiver.
    pub fn new(receiver: Receiver<E>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Only events that match `predicate` will be returned by `recv()`.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&E) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    fn accepts(&self, event: &E) -> bool {
        self.filter.as_ref().map_or(true, |filter| filter(event))
    }

    /// Receives the next event that passes the filter (if any).
    ///
    /// # Errors
    ///
    /// Returns `RecvError::Lagged(n)` if the subscriber fell behind by `n` events.
    /// Returns `RecvError::Closed` if all senders have been dropped.
    pub async fn recv(&mut self) -> Result<E, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.accepts(&event) {
                return Ok(event);
            }
        }
    }

    /// Attempts to receive an event without blocking.
    ///
    /// Returns `None` if no events are currently available.
    pub fn try_recv(&mut self) -> Option<Result<E, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if self.accepts(&event) {
                        return Some(Ok(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }
}
