//! Change streams for remote collections.

use crate::collection::Collection;
use crate::document::RemoteChange;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

type Topic = (Collection, String);

/// Fan-out of remote changes to live subscriptions.
#[derive(Default)]
pub(crate) struct SubscriberRegistry {
    next_id: AtomicU64,
    senders: Mutex<HashMap<Topic, Vec<(u64, UnboundedSender<RemoteChange>)>>>,
}

impl SubscriberRegistry {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn subscribe(
        self: &Arc<Self>,
        collection: Collection,
        user_id: &str,
    ) -> Subscription {
        let (tx, rx) = unbounded_channel();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let topic = (collection, user_id.to_string());
        self.senders
            .lock()
            .entry(topic.clone())
            .or_default()
            .push((id, tx));
        Subscription {
            collection,
            receiver: rx,
            registration: Registration {
                id,
                topic,
                registry: Arc::downgrade(self),
            },
        }
    }

    /// Delivers a change to every live subscriber of the topic.
    pub(crate) fn publish(&self, collection: Collection, user_id: &str, change: RemoteChange) {
        let mut senders = self.senders.lock();
        if let Some(list) = senders.get_mut(&(collection, user_id.to_string())) {
            list.retain(|(_, tx)| tx.send(change.clone()).is_ok());
        }
    }

    pub(crate) fn subscriber_count(&self, collection: Collection, user_id: &str) -> usize {
        self.senders
            .lock()
            .get(&(collection, user_id.to_string()))
            .map_or(0, Vec::len)
    }

    fn remove(&self, topic: &Topic, id: u64) {
        let mut senders = self.senders.lock();
        if let Some(list) = senders.get_mut(topic) {
            list.retain(|(sub_id, _)| *sub_id != id);
            if list.is_empty() {
                senders.remove(topic);
            }
        }
    }
}

struct Registration {
    id: u64,
    topic: Topic,
    registry: Weak<SubscriberRegistry>,
}

impl Drop for Registration {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.remove(&self.topic, self.id);
        }
    }
}

/// A live stream of changes to one user's collection.
///
/// Dropping the subscription unsubscribes it.
pub struct Subscription {
    collection: Collection,
    receiver: UnboundedReceiver<RemoteChange>,
    registration: Registration,
}

impl Subscription {
    /// The collection this subscription observes.
    pub fn collection(&self) -> Collection {
        self.collection
    }

    /// Waits for the next change. Returns `None` once the store is gone.
    pub async fn next(&mut self) -> Option<RemoteChange> {
        self.receiver.recv().await
    }

    /// Returns a pending change without waiting.
    pub fn try_next(&mut self) -> Option<RemoteChange> {
        self.receiver.try_recv().ok()
    }

    /// Stops receiving changes.
    pub fn unsubscribe(self) {}
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("collection", &self.collection)
            .field("id", &self.registration.id)
            .finish()
    }
}
