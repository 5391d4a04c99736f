// ── Centralized entity polling ──
//
// One scheduler per poller refreshes every subscribed entity at the
// fastest cadence any subscriber asked for. Fetches run as their own
// tasks; a slow or failing entity never holds up another, and a failed
// entity keeps serving its last good snapshot.

mod schedule;
mod stream;

pub use schedule::EntityHealth;
pub use stream::{SnapshotBroadcastStream, SnapshotStream};

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use futures_util::StreamExt;
use futures_util::stream::FuturesUnordered;
use serde_json::{Map, Value};
use tokio::sync::{Notify, broadcast};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, info, warn};

use self::schedule::Schedule;
use crate::config::{MIN_POLL_INTERVAL, PollerConfig};
use crate::error::CoreError;
use crate::model::{EntityId, EntitySnapshot, SubscriptionId};
use crate::source::EntityStateSource;

struct PollerInner {
    config: PollerConfig,
    source: Arc<dyn EntityStateSource>,
    snapshots: DashMap<EntityId, Arc<EntitySnapshot>>,
    schedule: Mutex<Schedule>,
    updates: broadcast::Sender<Arc<EntitySnapshot>>,
    /// Re-evaluate deadlines (new subscription, settled fetch, forced refresh).
    wake: Notify,
    cancel: CancellationToken,
}

/// Shared handle to the entity poller.
///
/// Cheap to clone. The scheduler stops on [`shutdown`](Self::shutdown)
/// or once the last handle is dropped.
#[derive(Clone)]
pub struct EntityPoller {
    inner: Arc<PollerInner>,
    _stop_on_drop: Arc<DropGuard>,
}

impl EntityPoller {
    /// Create a poller and spawn its scheduler on the current runtime.
    pub fn start(source: Arc<dyn EntityStateSource>, config: PollerConfig) -> Self {
        let cancel = CancellationToken::new();
        let (updates, _) = broadcast::channel(config.update_capacity.max(1));
        let inner = Arc::new(PollerInner {
            schedule: Mutex::new(Schedule::new(config.backoff_after, config.max_backoff)),
            config,
            source,
            snapshots: DashMap::new(),
            updates,
            wake: Notify::new(),
            cancel: cancel.clone(),
        });

        tokio::spawn(run_scheduler(Arc::clone(&inner)));
        info!(batch = inner.source.supports_batch(), "entity poller started");

        Self {
            inner,
            _stop_on_drop: Arc::new(cancel.drop_guard()),
        }
    }

    pub fn config(&self) -> &PollerConfig {
        &self.inner.config
    }

    // ── Subscriptions ────────────────────────────────────────────────

    /// Register (or replace) a subscription.
    ///
    /// Ids with no cached snapshot are fetched right away; the rest keep
    /// their current schedule. Intervals below 100ms are raised to 100ms.
    pub fn subscribe<I, E>(
        &self,
        subscription: impl Into<SubscriptionId>,
        entity_ids: I,
        interval: Duration,
    ) -> SnapshotStream
    where
        I: IntoIterator<Item = E>,
        E: Into<EntityId>,
    {
        let subscription = subscription.into();
        let mut ids: Vec<EntityId> = entity_ids.into_iter().map(Into::into).collect();
        ids.sort();
        ids.dedup();
        let interval = interval.max(MIN_POLL_INTERVAL);

        debug!(
            %subscription,
            entities = ids.len(),
            ?interval,
            "subscribing"
        );

        let receiver = self.inner.updates.subscribe();
        let filter = self.inner.schedule().subscribe(subscription, ids, interval);
        self.inner.wake.notify_one();
        SnapshotStream::new(receiver, filter)
    }

    /// Remove a subscription. Returns `false` if it did not exist.
    ///
    /// Entities nobody else wants are evicted after two sweeps; fetches
    /// already running still land in the cache.
    pub fn unsubscribe(&self, subscription: &str) -> bool {
        let removed = self.inner.schedule().unsubscribe(subscription);
        if removed {
            debug!(subscription, "unsubscribed");
            self.inner.wake.notify_one();
        }
        removed
    }

    // ── Reads ────────────────────────────────────────────────────────

    /// Last good snapshot of an entity, if any.
    pub fn get_snapshot(&self, entity_id: &str) -> Option<Arc<EntitySnapshot>> {
        self.inner.snapshots.get(entity_id).map(|entry| Arc::clone(entry.value()))
    }

    /// Every fresh snapshot, regardless of subscription.
    pub fn updates(&self) -> broadcast::Receiver<Arc<EntitySnapshot>> {
        self.inner.updates.subscribe()
    }

    pub fn health(&self, entity_id: &str) -> Option<EntityHealth> {
        self.inner.schedule().health(entity_id)
    }

    pub fn tracked_count(&self) -> usize {
        self.inner.schedule().tracked_count()
    }

    pub fn cached_count(&self) -> usize {
        self.inner.snapshots.len()
    }

    // ── Actions ──────────────────────────────────────────────────────

    /// Send a command to an entity through the source.
    ///
    /// Never retried. On success the entity is refreshed right away so
    /// subscribers see the effect.
    pub async fn invoke_command(
        &self,
        entity_id: &EntityId,
        command: &str,
        params: &Map<String, Value>,
    ) -> Result<(), CoreError> {
        let limit = self.inner.config.fetch_timeout;
        let outcome = tokio::time::timeout(
            limit,
            self.inner.source.invoke_command(entity_id, command, params),
        )
        .await
        .unwrap_or_else(|_| Err(CoreError::timeout(limit)));

        match outcome {
            Ok(()) => {
                info!(%entity_id, command, "command sent");
                self.refresh_now(entity_id.as_str());
                Ok(())
            }
            Err(e) => {
                warn!(%entity_id, command, error = %e, "command failed");
                Err(CoreError::CommandFailed {
                    entity_id: entity_id.to_string(),
                    command: command.to_owned(),
                    reason: e.to_string(),
                })
            }
        }
    }

    /// Fetch a tracked entity as soon as it is idle. Returns `false` for
    /// untracked ids.
    pub fn refresh_now(&self, entity_id: &str) -> bool {
        let tracked = self.inner.schedule().force(entity_id);
        if tracked {
            self.inner.wake.notify_one();
        }
        tracked
    }

    /// Stop the scheduler. Fetches already running are left to finish.
    pub fn shutdown(&self) {
        info!("entity poller shutting down");
        self.inner.cancel.cancel();
    }

    pub fn is_running(&self) -> bool {
        !self.inner.cancel.is_cancelled()
    }
}

impl std::fmt::Debug for EntityPoller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityPoller")
            .field("tracked", &self.tracked_count())
            .field("cached", &self.cached_count())
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

// ── Background work ─────────────────────────────────────────────────

impl PollerInner {
    fn schedule(&self) -> MutexGuard<'_, Schedule> {
        self.schedule.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn fetch_one(&self, entity_id: &EntityId) -> Result<EntitySnapshot, CoreError> {
        let limit = self.config.fetch_timeout;
        tokio::time::timeout(limit, self.source.fetch_one(entity_id))
            .await
            .unwrap_or_else(|_| Err(CoreError::timeout(limit)))
    }

    /// Record one fetch result and re-arm the entity.
    fn settle(&self, entity_id: &EntityId, result: Result<EntitySnapshot, CoreError>) {
        let now = Instant::now();
        match result {
            Ok(mut snap) => {
                let previous_failures = self.schedule().settle(entity_id, true, now);
                snap.entity_id = entity_id.clone();
                snap.fetched_at = Utc::now();
                let snap = Arc::new(snap);
                self.snapshots.insert(entity_id.clone(), Arc::clone(&snap));
                // No receivers is fine.
                let _ = self.updates.send(snap);

                if let Some(failures) = previous_failures.filter(|f| *f > 0) {
                    info!(%entity_id, failures, "entity recovered");
                }
            }
            Err(e) => {
                let (failures, backoff_after) = {
                    let mut schedule = self.schedule();
                    let previous = schedule.settle(entity_id, false, now);
                    (previous.map_or(1, |p| p.saturating_add(1)), schedule.backoff_after())
                };
                warn!(
                    %entity_id,
                    failures,
                    stale = self.snapshots.contains_key(entity_id),
                    error = %e,
                    "entity fetch failed"
                );
                if failures == backoff_after {
                    warn!(%entity_id, "backing off");
                }
            }
        }
        self.wake.notify_one();
    }

    fn sweep(&self) {
        let mut schedule = self.schedule();
        let evicted = schedule.sweep();
        self.snapshots.retain(|id, _| schedule.is_tracked(id.as_str()));
        if !evicted.is_empty() {
            debug!(evicted = evicted.len(), tracked = schedule.tracked_count(), "evicted unused entities");
        }
    }
}

async fn run_scheduler(inner: Arc<PollerInner>) {
    let mut sweep = tokio::time::interval(inner.config.sweep_interval.max(MIN_POLL_INTERVAL));
    sweep.set_missed_tick_behavior(MissedTickBehavior::Delay);
    sweep.tick().await;

    loop {
        let next_due = inner.schedule().next_due(Instant::now());

        tokio::select! {
            biased;

            () = inner.cancel.cancelled() => break,

            () = inner.wake.notified() => {}

            _ = sweep.tick() => inner.sweep(),

            () = sleep_until(next_due) => {
                let due = inner.schedule().take_due(Instant::now(), inner.config.batch_window);
                if !due.is_empty() {
                    tokio::spawn(run_cycle(Arc::clone(&inner), due));
                }
            }
        }
    }

    debug!("entity poller scheduler stopped");
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Fetch one group of due entities, batched when the source allows.
async fn run_cycle(inner: Arc<PollerInner>, ids: Vec<EntityId>) {
    debug!(entities = ids.len(), "refresh cycle");

    if ids.len() > 1 && inner.source.supports_batch() {
        let limit = inner.config.fetch_timeout;
        let batch = tokio::time::timeout(limit, inner.source.fetch_many(&ids))
            .await
            .unwrap_or_else(|_| Err(CoreError::timeout(limit)));
        match batch {
            Ok(mut results) => {
                for id in ids {
                    let result = results.remove(&id).unwrap_or_else(|| {
                        Err(CoreError::EntityNotFound {
                            entity_id: id.to_string(),
                        })
                    });
                    inner.settle(&id, result);
                }
                return;
            }
            Err(e) => {
                warn!(entities = ids.len(), error = %e, "batch fetch failed; fetching individually");
            }
        }
    }

    let mut pending: FuturesUnordered<_> = ids
        .into_iter()
        .map(|id| {
            let inner = &inner;
            async move {
                let result = inner.fetch_one(&id).await;
                (id, result)
            }
        })
        .collect();

    while let Some((id, result)) = pending.next().await {
        inner.settle(&id, result);
    }
}
