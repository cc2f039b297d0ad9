//! Event Bus - synchronous, typed publish/subscribe
//!
//! Producers (connection lifecycles, the orchestrator) publish
//! [`ClientEvent`]s; consumers (UI, command layer, tests) subscribe per event
//! type.
//!
//! # Delivery
//!
//! ```text
//! publish(event)
//!     │
//!     ├─ snapshot handlers registered for event.kind()   (read lock, released)
//!     │
//!     └─ call each handler in registration order on the publishing thread
//!            └─ a panicking handler is logged and skipped
//! ```
//!
//! Handlers run inline and must stay cheap. A handler that needs async
//! follow-up hands it to its own task, or the consumer uses
//! [`EventBus::subscribe_channel`] and drains the receiver from a task.
//!
//! # Usage
//!
//! ```ignore
//! let bus = EventBus::new();
//! let id = bus.subscribe::<StatusChanged, _>(|e| {
//!     println!("{} is now {}", e.endpoint, e.new);
//! });
//! bus.publish(StatusChanged { .. }.into());
//! bus.unsubscribe(id);
//! ```

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::mpsc;
use tracing::{debug, error};

use crate::domain::{ClientEvent, EventKind, TypedEvent};

/// Handle returned by `subscribe*`, used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

type Handler = Arc<dyn Fn(&ClientEvent) + Send + Sync>;

/// In-process event dispatcher
pub struct EventBus {
    handlers: RwLock<HashMap<EventKind, Vec<(SubscriptionId, Handler)>>>,
    next_id: AtomicU64,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            handlers: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Subscribe to one event type with a typed handler
    pub fn subscribe<E, F>(&self, handler: F) -> SubscriptionId
    where
        E: TypedEvent,
        F: Fn(&E) + Send + Sync + 'static,
    {
        self.subscribe_kind(E::KIND, move |event| {
            if let Some(typed) = E::from_event(event) {
                handler(typed);
            }
        })
    }

    /// Subscribe to one event kind with an untyped handler
    pub fn subscribe_kind<F>(&self, kind: EventKind, handler: F) -> SubscriptionId
    where
        F: Fn(&ClientEvent) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.handlers
            .write()
            .entry(kind)
            .or_default()
            .push((id, Arc::new(handler)));
        debug!(
            event_type = kind.as_str(),
            subscription = id.0,
            "[EventBus] Subscribed"
        );
        id
    }

    /// Forward events of `kind` into an unbounded channel
    ///
    /// The subscription is removed lazily: once the receiver is dropped the
    /// forwarding handler becomes a no-op until `unsubscribe` is called with
    /// the returned id.
    pub fn subscribe_channel(&self, kind: EventKind) -> (SubscriptionId, EventReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.subscribe_kind(kind, move |event| {
            let _ = tx.send(event.clone());
        });
        (id, EventReceiver { receiver: rx })
    }

    /// Remove a subscription. Returns false if it was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut handlers = self.handlers.write();
        for list in handlers.values_mut() {
            if let Some(pos) = list.iter().position(|(sid, _)| *sid == id) {
                list.remove(pos);
                return true;
            }
        }
        false
    }

    /// Deliver `event` to every handler of its kind, in registration order
    ///
    /// Returns the number of handlers that completed without panicking.
    pub fn publish(&self, event: ClientEvent) -> usize {
        let kind = event.kind();
        // Snapshot so handlers can (un)subscribe without deadlocking
        let handlers: Vec<(SubscriptionId, Handler)> = self
            .handlers
            .read()
            .get(&kind)
            .cloned()
            .unwrap_or_default();

        if handlers.is_empty() {
            debug!(
                event_type = kind.as_str(),
                endpoint = event.endpoint(),
                "[EventBus] No subscribers for event"
            );
            return 0;
        }

        let mut delivered = 0;
        for (id, handler) in handlers {
            match catch_unwind(AssertUnwindSafe(|| handler(&event))) {
                Ok(()) => delivered += 1,
                Err(panic) => {
                    error!(
                        event_type = kind.as_str(),
                        endpoint = event.endpoint(),
                        subscription = id.0,
                        panic = panic_message(&panic),
                        "[EventBus] Handler panicked"
                    );
                }
            }
        }
        delivered
    }

    /// Number of handlers registered for `kind`
    pub fn subscriber_count(&self, kind: EventKind) -> usize {
        self.handlers.read().get(&kind).map_or(0, Vec::len)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

fn panic_message(panic: &Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Async side of [`EventBus::subscribe_channel`]
pub struct EventReceiver {
    receiver: mpsc::UnboundedReceiver<ClientEvent>,
}

impl EventReceiver {
    /// Receive the next event; `None` once the bus is dropped
    pub async fn recv(&mut self) -> Option<ClientEvent> {
        self.receiver.recv().await
    }

    /// Try to receive an event without waiting
    pub fn try_recv(&mut self) -> Option<ClientEvent> {
        self.receiver.try_recv().ok()
    }
}

/// Shared event bus for application-wide use
pub type SharedEventBus = Arc<EventBus>;

/// Create a shared event bus
pub fn create_shared_event_bus() -> SharedEventBus {
    Arc::new(EventBus::new())
}

// ============================================================================
// TESTS
// ============================================================================
