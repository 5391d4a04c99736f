// ── Refresh bookkeeping ──
//
// Pure state behind the poller: who wants which entity how often, when
// each entity last settled, and how many times in a row it failed.
// No I/O and no clocks of its own; callers pass `now`.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use tokio::time::Instant;

use crate::model::{EntityId, SubscriptionId};

/// Largest doubling exponent applied during backoff.
const MAX_BACKOFF_SHIFT: u32 = 16;

/// Shared view of a subscription's current entity set.
pub(crate) type IdFilter = Arc<ArcSwap<HashSet<EntityId>>>;

struct SubscriptionEntry {
    ids: Vec<EntityId>,
    filter: IdFilter,
}

#[derive(Debug, Default)]
struct Tracked {
    /// Requested interval per subscriber.
    subscribers: HashMap<SubscriptionId, Duration>,
    last_settled: Option<Instant>,
    in_flight: bool,
    consecutive_failures: u32,
    marked_for_eviction: bool,
    /// Refresh as soon as the entity is idle, regardless of cadence.
    forced: bool,
}

/// Diagnostics for one tracked entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityHealth {
    pub consecutive_failures: u32,
    /// Current cadence including backoff; `None` with no subscribers.
    pub interval: Option<Duration>,
    pub subscribers: usize,
    pub in_flight: bool,
}

pub(crate) struct Schedule {
    subscriptions: HashMap<SubscriptionId, SubscriptionEntry>,
    entities: HashMap<EntityId, Tracked>,
    backoff_after: u32,
    max_backoff: Duration,
}

impl Schedule {
    pub(crate) fn new(backoff_after: u32, max_backoff: Duration) -> Self {
        Self {
            subscriptions: HashMap::new(),
            entities: HashMap::new(),
            backoff_after,
            max_backoff,
        }
    }

    // ── Subscriptions ────────────────────────────────────────────────

    /// Register or replace a subscription. Returns its id filter, which
    /// survives replacement so existing streams follow the new set.
    pub(crate) fn subscribe(
        &mut self,
        subscription: SubscriptionId,
        ids: Vec<EntityId>,
        interval: Duration,
    ) -> IdFilter {
        let filter = match self.subscriptions.remove(&subscription) {
            Some(previous) => {
                self.release(&subscription, &previous.ids);
                previous.filter
            }
            None => Arc::default(),
        };
        filter.store(Arc::new(ids.iter().cloned().collect()));

        for id in &ids {
            let tracked = self.entities.entry(id.clone()).or_default();
            tracked.subscribers.insert(subscription.clone(), interval);
            tracked.marked_for_eviction = false;
        }

        self.subscriptions.insert(
            subscription,
            SubscriptionEntry {
                ids,
                filter: Arc::clone(&filter),
            },
        );
        filter
    }

    /// Drop a subscription's cadence contribution. Its entities stay
    /// tracked until swept.
    pub(crate) fn unsubscribe(&mut self, subscription: &str) -> bool {
        let Some((key, entry)) = self.subscriptions.remove_entry(subscription) else {
            return false;
        };
        self.release(&key, &entry.ids);
        entry.filter.store(Arc::default());
        true
    }

    fn release(&mut self, subscription: &SubscriptionId, ids: &[EntityId]) {
        for id in ids {
            if let Some(tracked) = self.entities.get_mut(id) {
                tracked.subscribers.remove(subscription);
            }
        }
    }

    // ── Timing ───────────────────────────────────────────────────────

    fn interval_of(&self, tracked: &Tracked) -> Option<Duration> {
        let base = tracked.subscribers.values().min().copied()?;
        Some(backoff(
            base,
            tracked.consecutive_failures,
            self.backoff_after,
            self.max_backoff,
        ))
    }

    /// When `tracked` should next be fetched. Never-fetched and forced
    /// entities are due at `now`.
    fn due_at(&self, tracked: &Tracked, now: Instant) -> Option<Instant> {
        if tracked.in_flight {
            return None;
        }
        let interval = self.interval_of(tracked)?;
        match tracked.last_settled {
            Some(last) if !tracked.forced => Some(last + interval),
            _ => Some(now),
        }
    }

    /// Earliest instant any entity falls due.
    pub(crate) fn next_due(&self, now: Instant) -> Option<Instant> {
        self.entities.values().filter_map(|t| self.due_at(t, now)).min()
    }

    /// Claim every entity due by `now + window` and mark it in flight.
    pub(crate) fn take_due(&mut self, now: Instant, window: Duration) -> Vec<EntityId> {
        let horizon = now + window;
        let mut due: Vec<EntityId> = self
            .entities
            .iter()
            .filter(|(_, t)| self.due_at(t, now).is_some_and(|at| at <= horizon))
            .map(|(id, _)| id.clone())
            .collect();
        due.sort();

        for id in &due {
            if let Some(tracked) = self.entities.get_mut(id) {
                tracked.in_flight = true;
                tracked.forced = false;
            }
        }
        due
    }

    /// Record the end of a fetch. Returns the failure streak before this
    /// result, or `None` if the entity is no longer tracked.
    pub(crate) fn settle(&mut self, id: &EntityId, ok: bool, now: Instant) -> Option<u32> {
        let tracked = self.entities.get_mut(id)?;
        let previous = tracked.consecutive_failures;
        tracked.in_flight = false;
        tracked.last_settled = Some(now);
        tracked.consecutive_failures = if ok { 0 } else { previous.saturating_add(1) };
        Some(previous)
    }

    /// Make an entity due immediately. Returns whether it is tracked.
    pub(crate) fn force(&mut self, id: &str) -> bool {
        match self.entities.get_mut(id) {
            Some(tracked) => {
                tracked.forced = true;
                true
            }
            None => false,
        }
    }

    // ── Eviction ─────────────────────────────────────────────────────

    /// Mark idle unsubscribed entities, evicting those already marked.
    pub(crate) fn sweep(&mut self) -> Vec<EntityId> {
        let mut evicted = Vec::new();
        self.entities.retain(|id, tracked| {
            if !tracked.subscribers.is_empty() || tracked.in_flight {
                tracked.marked_for_eviction = false;
                return true;
            }
            if tracked.marked_for_eviction {
                evicted.push(id.clone());
                return false;
            }
            tracked.marked_for_eviction = true;
            true
        });
        evicted
    }

    // ── Inspection ───────────────────────────────────────────────────

    pub(crate) fn is_tracked(&self, id: &str) -> bool {
        self.entities.contains_key(id)
    }

    pub(crate) fn tracked_count(&self) -> usize {
        self.entities.len()
    }

    pub(crate) fn backoff_after(&self) -> u32 {
        self.backoff_after
    }

    pub(crate) fn health(&self, id: &str) -> Option<EntityHealth> {
        let tracked = self.entities.get(id)?;
        Some(EntityHealth {
            consecutive_failures: tracked.consecutive_failures,
            interval: self.interval_of(tracked),
            subscribers: tracked.subscribers.len(),
            in_flight: tracked.in_flight,
        })
    }
}

/// Interval after `failures` consecutive failures.
///
/// Below `after` the base interval holds; from there on each failure
/// doubles it, up to `max` (never below `base`).
pub(crate) fn backoff(base: Duration, failures: u32, after: u32, max: Duration) -> Duration {
    if failures < after {
        return base;
    }
    let shift = (failures - after + 1).min(MAX_BACKOFF_SHIFT);
    base.saturating_mul(1 << shift).min(max.max(base))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECOND: Duration = Duration::from_secs(1);

    fn schedule() -> Schedule {
        Schedule::new(3, Duration::from_secs(60))
    }

    fn ids(raw: &[&str]) -> Vec<EntityId> {
        raw.iter().map(|s| EntityId::from(*s)).collect()
    }

    #[test]
    fn new_entities_are_due_immediately() {
        let mut s = schedule();
        let now = Instant::now();
        s.subscribe("w".into(), ids(&["light.a", "light.b"]), SECOND);

        assert_eq!(s.next_due(now), Some(now));
        assert_eq!(s.take_due(now, Duration::ZERO), ids(&["light.a", "light.b"]));
        assert_eq!(s.next_due(now), None, "in-flight entities are not due");
    }

    #[test]
    fn fastest_subscriber_sets_the_cadence() {
        let mut s = schedule();
        let now = Instant::now();
        s.subscribe("slow".into(), ids(&["sensor.t"]), 5 * SECOND);
        s.subscribe("fast".into(), ids(&["sensor.t"]), 2 * SECOND);
        s.take_due(now, Duration::ZERO);
        s.settle(&EntityId::from("sensor.t"), true, now);

        assert_eq!(s.next_due(now), Some(now + 2 * SECOND));

        assert!(s.unsubscribe("fast"));
        assert_eq!(s.next_due(now), Some(now + 5 * SECOND));
    }

    #[test]
    fn batch_window_groups_nearby_deadlines() {
        let now = Instant::now();
        let staggered = || {
            let mut s = schedule();
            s.subscribe("a".into(), ids(&["light.a"]), SECOND);
            s.subscribe("b".into(), ids(&["light.b"]), SECOND);
            s.take_due(now, Duration::ZERO);
            s.settle(&EntityId::from("light.a"), true, now);
            s.settle(&EntityId::from("light.b"), true, now + Duration::from_millis(30));
            s
        };

        let at = now + SECOND;
        assert_eq!(staggered().take_due(at, Duration::ZERO), ids(&["light.a"]));
        assert_eq!(
            staggered().take_due(at, Duration::from_millis(50)),
            ids(&["light.a", "light.b"])
        );
    }

    #[test]
    fn backoff_doubles_after_threshold_and_caps() {
        let max = Duration::from_secs(60);
        assert_eq!(backoff(SECOND, 2, 3, max), SECOND);
        assert_eq!(backoff(SECOND, 3, 3, max), 2 * SECOND);
        assert_eq!(backoff(SECOND, 4, 3, max), 4 * SECOND);
        assert_eq!(backoff(SECOND, 40, 3, max), max);
        assert_eq!(backoff(2 * max, 10, 3, max), 2 * max, "never below the base");
    }

    #[test]
    fn success_resets_the_failure_streak() {
        let mut s = schedule();
        let now = Instant::now();
        let id = EntityId::from("vacuum.robo");
        s.subscribe("w".into(), vec![id.clone()], SECOND);
        for _ in 0..4 {
            s.take_due(now, Duration::from_secs(3600));
            s.settle(&id, false, now);
        }
        assert_eq!(s.health("vacuum.robo").map(|h| h.interval), Some(Some(4 * SECOND)));

        s.take_due(now, Duration::from_secs(3600));
        assert_eq!(s.settle(&id, true, now), Some(4));
        let health = s.health("vacuum.robo");
        assert_eq!(health.map(|h| h.consecutive_failures), Some(0));
        assert_eq!(health.map(|h| h.interval), Some(Some(SECOND)));
    }

    #[test]
    fn unused_entities_are_evicted_on_the_second_sweep() {
        let mut s = schedule();
        s.subscribe("w".into(), ids(&["cover.garage"]), SECOND);
        s.unsubscribe("w");

        assert!(s.sweep().is_empty());
        assert!(s.is_tracked("cover.garage"));
        assert_eq!(s.sweep(), ids(&["cover.garage"]));
        assert_eq!(s.tracked_count(), 0);
    }

    #[test]
    fn resubscribing_clears_the_eviction_mark() {
        let mut s = schedule();
        s.subscribe("w".into(), ids(&["cover.garage"]), SECOND);
        s.unsubscribe("w");
        s.sweep();
        s.subscribe("w".into(), ids(&["cover.garage"]), SECOND);

        assert!(s.sweep().is_empty());
        assert!(s.sweep().is_empty());
        assert!(s.is_tracked("cover.garage"));
    }

    #[test]
    fn in_flight_entities_are_never_evicted() {
        let mut s = schedule();
        let now = Instant::now();
        s.subscribe("w".into(), ids(&["light.a"]), SECOND);
        s.take_due(now, Duration::ZERO);
        s.unsubscribe("w");

        s.sweep();
        assert!(s.sweep().is_empty());
        assert_eq!(s.settle(&EntityId::from("light.a"), true, now), Some(0));
    }

    #[test]
    fn replacing_a_subscription_moves_its_filter() {
        let mut s = schedule();
        let filter = s.subscribe("w".into(), ids(&["light.a"]), SECOND);
        s.subscribe("w".into(), ids(&["light.b"]), SECOND);

        assert!(filter.load().contains("light.b"));
        assert!(!filter.load().contains("light.a"));
        assert_eq!(s.health("light.a").map(|h| h.subscribers), Some(0));

        s.unsubscribe("w");
        assert!(filter.load().is_empty());
    }

    #[test]
    fn forced_entities_skip_their_cadence() {
        let mut s = schedule();
        let now = Instant::now();
        let id = EntityId::from("switch.strip");
        s.subscribe("w".into(), vec![id.clone()], 10 * SECOND);
        s.take_due(now, Duration::ZERO);
        s.settle(&id, true, now);

        assert!(s.force("switch.strip"));
        assert_eq!(s.next_due(now), Some(now));
        assert!(!s.force("switch.unknown"));
    }
}
