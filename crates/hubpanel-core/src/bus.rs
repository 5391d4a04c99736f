// ── In-process change notifications ──
//
// Named topics with synchronous fan-out. A publish reaches every
// listener registered at that moment; nothing is queued for listeners
// that arrive later.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use dashmap::DashMap;
use tracing::trace;

type Listener = Arc<dyn Fn(&str) + Send + Sync>;

struct BusInner {
    topics: DashMap<String, Vec<(u64, Listener)>>,
    next_id: AtomicU64,
}

/// Topic-based pub/sub shared by the store and the widgets.
///
/// Cheap to clone; clones share listeners.
#[derive(Clone)]
pub struct ChangeBus {
    inner: Arc<BusInner>,
}

impl ChangeBus {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(BusInner {
                topics: DashMap::new(),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Register `listener` on `topic`.
    ///
    /// The listener stays registered until the returned guard is dropped
    /// (or forever, after [`BusSubscription::detach`]).
    pub fn subscribe<F>(&self, topic: impl Into<String>, listener: F) -> BusSubscription
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        let topic = topic.into();
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner
            .topics
            .entry(topic.clone())
            .or_default()
            .push((id, Arc::new(listener)));

        BusSubscription {
            bus: Arc::downgrade(&self.inner),
            topic,
            id,
            detached: false,
        }
    }

    /// Deliver `topic` to every current listener, returning how many ran.
    ///
    /// Listeners are invoked after the registry lock is released, so a
    /// handler may publish, subscribe, or drop its own guard.
    pub fn publish(&self, topic: &str) -> usize {
        let listeners: Vec<Listener> = match self.inner.topics.get(topic) {
            Some(entry) => entry.iter().map(|(_, l)| Arc::clone(l)).collect(),
            None => return 0,
        };
        trace!(topic, listeners = listeners.len(), "publishing change");
        for listener in &listeners {
            listener(topic);
        }
        listeners.len()
    }

    pub fn listener_count(&self, topic: &str) -> usize {
        self.inner.topics.get(topic).map_or(0, |entry| entry.len())
    }
}

impl Default for ChangeBus {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ChangeBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeBus")
            .field("topics", &self.inner.topics.len())
            .finish_non_exhaustive()
    }
}

/// Keeps one listener registered. Dropping it unsubscribes.
#[must_use = "dropping the subscription unregisters the listener"]
#[derive(Debug)]
pub struct BusSubscription {
    bus: Weak<BusInner>,
    topic: String,
    id: u64,
    detached: bool,
}

impl BusSubscription {
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Keep the listener for the lifetime of the bus.
    pub fn detach(mut self) {
        self.detached = true;
    }
}

impl Drop for BusSubscription {
    fn drop(&mut self) {
        if self.detached {
            return;
        }
        let Some(bus) = self.bus.upgrade() else {
            return;
        };
        let emptied = bus.topics.get_mut(&self.topic).is_some_and(|mut entry| {
            entry.retain(|(id, _)| *id != self.id);
            entry.is_empty()
        });
        if emptied {
            bus.topics.remove_if(&self.topic, |_, listeners| listeners.is_empty());
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::AtomicUsize;

    fn counter() -> (Arc<AtomicUsize>, impl Fn(&str) + Send + Sync + 'static) {
        let hits = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&hits);
        (hits, move |_: &str| {
            seen.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn publish_reaches_only_its_topic() {
        let bus = ChangeBus::new();
        let (widgets, on_widgets) = counter();
        let (icons, on_icons) = counter();
        let _a = bus.subscribe("widgets", on_widgets);
        let _b = bus.subscribe("navIcons", on_icons);

        assert_eq!(bus.publish("widgets"), 1);
        assert_eq!(widgets.load(Ordering::SeqCst), 1);
        assert_eq!(icons.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn publish_without_listeners_is_a_no_op() {
        assert_eq!(ChangeBus::new().publish("climate"), 0);
    }

    #[test]
    fn dropping_the_guard_unsubscribes() {
        let bus = ChangeBus::new();
        let (hits, listener) = counter();
        let sub = bus.subscribe("climate", listener);
        assert_eq!(bus.listener_count("climate"), 1);

        drop(sub);
        assert_eq!(bus.listener_count("climate"), 0);
        assert_eq!(bus.publish("climate"), 0);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn detached_listener_survives() {
        let bus = ChangeBus::new();
        let (hits, listener) = counter();
        bus.subscribe("vacuum", listener).detach();

        bus.publish("vacuum");
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn guard_outliving_bus_is_harmless() {
        let bus = ChangeBus::new();
        let sub = bus.subscribe("motors", |_| {});
        drop(bus);
        drop(sub);
    }

    #[test]
    fn handler_may_unsubscribe_itself() {
        let bus = ChangeBus::new();
        let slot: Arc<Mutex<Option<BusSubscription>>> = Arc::new(Mutex::new(None));
        let inner = Arc::clone(&slot);
        let sub = bus.subscribe("sensors", move |_| {
            inner.lock().unwrap().take();
        });
        *slot.lock().unwrap() = Some(sub);

        assert_eq!(bus.publish("sensors"), 1);
        assert_eq!(bus.listener_count("sensors"), 0);
    }

    #[test]
    fn handler_may_subscribe_and_publish() {
        let bus = ChangeBus::new();
        let (nested_hits, nested) = counter();
        let nested = Arc::new(nested);
        let handle = bus.clone();
        let _outer = bus.subscribe("widgets", move |_| {
            let nested = Arc::clone(&nested);
            handle.subscribe("navIcons", move |t| (*nested)(t)).detach();
            handle.publish("navIcons");
        });

        bus.publish("widgets");
        assert_eq!(nested_hits.load(Ordering::SeqCst), 1);
        assert_eq!(bus.listener_count("navIcons"), 1);
    }
}
