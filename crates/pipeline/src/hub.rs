//! Fan-out of published values to every live subscriber.
//!
//! Each subscriber owns an unbounded queue. Publishing never blocks and never
//! drops a value for a live subscriber; a slow consumer simply accumulates a
//! backlog. A subscriber is unregistered when its [`Subscription`] is dropped,
//! which is what happens when a stream connection closes.

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};

use futures_core::Stream;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::debug;

use crate::SubscriberId;

type Registry<T> = Mutex<HashMap<SubscriberId, mpsc::UnboundedSender<T>>>;

/// Registry of subscriber queues.
///
/// Cloning the hub yields another handle onto the same registry.
pub struct BroadcastHub<T> {
    registry: Arc<Registry<T>>,
}

impl<T> Clone for BroadcastHub<T> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
        }
    }
}

impl<T> Default for BroadcastHub<T> {
    fn default() -> Self {
        Self {
            registry: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

impl<T: Clone> BroadcastHub<T> {
    /// Creates a hub with no subscribers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new subscriber.
    ///
    /// The returned [`Subscription`] yields every value published from this
    /// point on, in publish order.
    pub fn subscribe(&self) -> Subscription<T> {
        let (sender, receiver) = mpsc::unbounded_channel();
        let id = SubscriberId::new_random();
        let subscribers = {
            let mut registry = self.registry.lock();
            registry.insert(id, sender);
            registry.len()
        };
        debug!(subscriber_id = %id, subscribers, "Subscriber registered");

        Subscription {
            id,
            receiver,
            registry: Arc::downgrade(&self.registry),
        }
    }

    /// Enqueues `value` on every registered subscriber.
    ///
    /// Returns the number of subscribers the value was delivered to. Queues
    /// whose receiving side is already gone are pruned.
    pub fn publish(&self, value: T) -> usize {
        let mut registry = self.registry.lock();
        registry.retain(|id, sender| {
            let alive = sender.send(value.clone()).is_ok();
            if !alive {
                debug!(subscriber_id = %id, "Pruning closed subscriber");
            }
            alive
        });
        registry.len()
    }

    /// Number of currently registered subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.registry.lock().len()
    }
}

/// One subscriber's view of the hub.
///
/// Implements [`Stream`]; the stream never ends on its own while the hub is
/// alive. Dropping the subscription unregisters it.
pub struct Subscription<T> {
    id: SubscriberId,
    receiver: mpsc::UnboundedReceiver<T>,
    registry: Weak<Registry<T>>,
}

impl<T> Subscription<T> {
    /// The identifier this subscription is registered under.
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Waits for the next published value.
    ///
    /// Returns `None` once the hub has been dropped and the backlog drained.
    pub async fn recv(&mut self) -> Option<T> {
        self.receiver.recv().await
    }
}

impl<T> Stream for Subscription<T> {
    type Item = T;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
        self.receiver.poll_recv(cx)
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            let removed = registry.lock().remove(&self.id).is_some();
            debug!(subscriber_id = %self.id, removed, "Subscriber unregistered");
        }
    }
}
