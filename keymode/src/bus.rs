//! Publish/subscribe coordination between key handlers and the rest of the editor.
//!
//! The [`EventBus`] trait enables dependency injection: production code uses [`PubSub`]
//! while tests use [`RecordingBus`](crate::test::RecordingBus) to observe what was published.
//!
//! # Delivery
//!
//! [`EventBus::publish`] is synchronous. Every subscriber registered for the topic at the
//! moment of the call runs, in subscription order, before `publish` returns. Handlers are
//! invoked outside the bus lock, so a handler may itself publish or subscribe.

use crate::keymap::KeyId;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::sync::Arc;

/// Topics this crate publishes or listens to.
pub mod topics {
    /// A plugin took exclusive control of input. Payload: [`Payload::Empty`](super::Payload).
    pub const PLUGIN_OPEN: &str = "plugin.open";
    /// A plugin saved and closed. Payload: [`Payload::Empty`](super::Payload).
    pub const PLUGIN_SAVED: &str = "plugin.saved";
    /// A plugin exited without saving. Payload: [`Payload::Empty`](super::Payload).
    pub const PLUGIN_EXITED: &str = "plugin.exited";
    /// Keys that should fall through to insert behavior in command mode.
    /// Payload: [`Payload::Keys`](super::Payload).
    pub const PLUGIN_INSERT_KEYBINDINGS: &str = "plugin.insert.keybindings";
    /// Published after every mode toggle. Payload: [`Payload::Flag`](super::Payload),
    /// `true` when command mode is now active.
    pub const MODE_COMMAND: &str = "keyhandler.mode.command";
}

/// Data carried by a published notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Empty,
    Flag(bool),
    Keys(Vec<KeyId>),
}

/// Callback invoked for each notification on a subscribed topic.
pub type Handler = Arc<dyn Fn(&Payload) + Send + Sync>;

/// Token returned by [`EventBus::subscribe`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Synchronous, order-preserving message bus.
pub trait EventBus: Send + Sync {
    /// Register `handler` for `topic`. Handlers for one topic run in registration order.
    fn subscribe(&self, topic: &str, handler: Handler) -> SubscriptionId;

    /// Remove a subscription. Returns `false` if it was already gone.
    fn unsubscribe(&self, id: SubscriptionId) -> bool;

    /// Deliver `payload` to every current subscriber of `topic`.
    ///
    /// Returns the number of handlers that were invoked.
    fn publish(&self, topic: &str, payload: &Payload) -> usize;
}

/// In-process [`EventBus`] implementation.
#[derive(Default)]
pub struct PubSub {
    inner: Mutex<PubSubInner>,
}

#[derive(Default)]
struct PubSubInner {
    next_id: u64,
    topics: FxHashMap<String, Vec<(SubscriptionId, Handler)>>,
}

impl PubSub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live subscriptions on `topic`.
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.inner.lock().topics.get(topic).map_or(0, Vec::len)
    }
}

impl EventBus for PubSub {
    fn subscribe(&self, topic: &str, handler: Handler) -> SubscriptionId {
        let mut inner = self.inner.lock();
        let id = SubscriptionId(inner.next_id);
        inner.next_id += 1;
        inner
            .topics
            .entry(topic.to_string())
            .or_default()
            .push((id, handler));
        id
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut inner = self.inner.lock();
        for subscribers in inner.topics.values_mut() {
            if let Some(index) = subscribers.iter().position(|(sid, _)| *sid == id) {
                subscribers.remove(index);
                return true;
            }
        }
        false
    }

    fn publish(&self, topic: &str, payload: &Payload) -> usize {
        // Snapshot under the lock, dispatch outside it
        let handlers: Vec<Handler> = match self.inner.lock().topics.get(topic) {
            Some(subscribers) => subscribers.iter().map(|(_, h)| h.clone()).collect(),
            None => return 0,
        };

        tracing::trace!(topic, subscribers = handlers.len(), "publish");
        for handler in &handlers {
            handler(payload);
        }
        handlers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn delivers_in_subscription_order() {
        let bus = PubSub::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for label in ["first", "second", "third"] {
            let seen = seen.clone();
            bus.subscribe("topic", Arc::new(move |_| seen.lock().push(label)));
        }

        assert_eq!(bus.publish("topic", &Payload::Empty), 3);
        assert_eq!(*seen.lock(), vec!["first", "second", "third"]);
    }

    #[test]
    fn publish_without_subscribers_is_a_no_op() {
        let bus = PubSub::new();
        assert_eq!(bus.publish("nobody.listens", &Payload::Flag(true)), 0);
    }

    #[test]
    fn topics_are_independent() {
        let bus = PubSub::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        bus.subscribe(
            topics::PLUGIN_OPEN,
            Arc::new(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );

        bus.publish(topics::PLUGIN_SAVED, &Payload::Empty);
        assert_eq!(hits.load(Ordering::SeqCst), 0);

        bus.publish(topics::PLUGIN_OPEN, &Payload::Empty);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let bus = PubSub::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let id = bus.subscribe(
            "topic",
            Arc::new(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );

        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));
        bus.publish("topic", &Payload::Empty);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert_eq!(bus.subscriber_count("topic"), 0);
    }

    #[test]
    fn handler_may_publish_reentrantly() {
        let bus = Arc::new(PubSub::new());
        let echoed = Arc::new(Mutex::new(Vec::new()));

        let inner_bus = Arc::downgrade(&bus);
        bus.subscribe(
            "outer",
            Arc::new(move |payload| {
                if let Some(bus) = inner_bus.upgrade() {
                    bus.publish("inner", payload);
                }
            }),
        );
        let sink = echoed.clone();
        bus.subscribe("inner", Arc::new(move |payload| sink.lock().push(payload.clone())));

        bus.publish("outer", &Payload::Flag(false));
        assert_eq!(*echoed.lock(), vec![Payload::Flag(false)]);
    }
}
