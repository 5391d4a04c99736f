// ── Configuration store ──
//
// Owns the in-memory copy of the panel configuration and keeps it in
// step with the settings server, falling back to the local mirror and
// then to defaults when the server is unreachable.

mod sync;

pub use sync::{ConfigSource, Loaded, SyncState};

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use arc_swap::ArcSwap;
use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};
use serde_json::Value;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::bus::ChangeBus;
use crate::config::StoreConfig;
use crate::error::CoreError;
use crate::migrate;
use crate::model::{ConfigDocument, SectionUpdate};
use crate::source::{LocalMirror, RemoteConfigClient};

type PendingLoad = Shared<BoxFuture<'static, Loaded>>;

struct StoreInner {
    config: StoreConfig,
    remote: Arc<dyn RemoteConfigClient>,
    mirror: Arc<dyn LocalMirror>,
    bus: ChangeBus,
    cache: ArcSwap<ConfigDocument>,
    /// Set once the cache holds a real document (remote, mirror, or a write).
    hydrated: AtomicBool,
    pending_load: Mutex<Option<PendingLoad>>,
    /// Serializes section writes (FIFO) and loads against each other.
    write_lock: tokio::sync::Mutex<()>,
    sync_state: watch::Sender<SyncState>,
}

/// Shared handle to the panel configuration.
///
/// Cheap to clone; clones share the cache, the pending load, and the
/// write queue.
#[derive(Clone)]
pub struct ConfigStore {
    inner: Arc<StoreInner>,
}

impl ConfigStore {
    pub fn new(
        config: StoreConfig,
        remote: Arc<dyn RemoteConfigClient>,
        mirror: Arc<dyn LocalMirror>,
        bus: ChangeBus,
    ) -> Self {
        let (sync_state, _) = watch::channel(SyncState::Unloaded);
        Self {
            inner: Arc::new(StoreInner {
                config,
                remote,
                mirror,
                bus,
                cache: ArcSwap::from_pointee(ConfigDocument::default()),
                hydrated: AtomicBool::new(false),
                pending_load: Mutex::new(None),
                write_lock: tokio::sync::Mutex::new(()),
                sync_state,
            }),
        }
    }

    pub fn identity(&self) -> &str {
        &self.inner.config.identity
    }

    /// The bus section changes are published on.
    pub fn bus(&self) -> &ChangeBus {
        &self.inner.bus
    }

    /// Fetch the document, falling back to the mirror, the cache, or the
    /// defaults. Never fails; check [`Loaded::source`] for degradation.
    ///
    /// Concurrent calls share one underlying fetch.
    pub async fn load(&self) -> Loaded {
        let pending = {
            let mut slot = self
                .inner
                .pending_load
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if let Some(pending) = slot.as_ref() {
                debug!("joining in-flight configuration load");
                pending.clone()
            } else {
                let inner = Arc::clone(&self.inner);
                let pending = async move {
                    let loaded = inner.load_serialized().await;
                    inner
                        .pending_load
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .take();
                    loaded
                }
                .boxed()
                .shared();
                *slot = Some(pending.clone());
                pending
            }
        };
        pending.await
    }

    /// The current document. Defaults until the first load settles.
    pub fn read_cached(&self) -> Arc<ConfigDocument> {
        self.inner.cache.load_full()
    }

    /// Replace one section and persist the whole document.
    ///
    /// The new document is always applied to the cache and the mirror,
    /// and the section's topic is published. If the settings server
    /// could not be written the call returns [`CoreError::SyncDegraded`]
    /// and the mirror is marked pending; the next load or update that
    /// reaches the server sends the mirrored document.
    pub async fn update_section(
        &self,
        update: SectionUpdate,
    ) -> Result<Arc<ConfigDocument>, CoreError> {
        if !self.inner.hydrated.load(Ordering::Acquire) {
            self.load().await;
        }

        let section = update.section();
        let (next, remote) = {
            let _guard = self.inner.write_lock.lock().await;
            let base = self.inner.cache.load_full();
            let next = Arc::new(base.with_section(update));
            let value = next.to_value();

            let remote = self.inner.put_remote(&value).await;
            self.inner.mirror.write_snapshot(&value).await;
            self.inner.mirror.set_pending(remote.is_err()).await;
            self.inner.cache.store(Arc::clone(&next));
            self.inner.hydrated.store(true, Ordering::Release);
            self.inner.sync_state.send_replace(match &remote {
                Ok(()) => SyncState::Synced,
                Err(e) => SyncState::Degraded {
                    reason: e.to_string(),
                },
            });
            (next, remote)
        };

        self.inner.bus.publish(section.topic());

        match remote {
            Ok(()) => {
                info!(%section, "configuration section saved");
                Ok(next)
            }
            Err(e) => {
                warn!(%section, error = %e, "settings server write failed; kept locally");
                Err(CoreError::SyncDegraded {
                    section,
                    reason: e.to_string(),
                })
            }
        }
    }

    /// Watch the sync state (for status indicators and diagnostics).
    pub fn sync_state(&self) -> watch::Receiver<SyncState> {
        self.inner.sync_state.subscribe()
    }
}

impl fmt::Debug for ConfigStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigStore")
            .field("identity", &self.inner.config.identity)
            .field("hydrated", &self.inner.hydrated.load(Ordering::Relaxed))
            .field("sync_state", &*self.inner.sync_state.borrow())
            .finish_non_exhaustive()
    }
}

impl StoreInner {
    async fn load_serialized(&self) -> Loaded {
        let _guard = self.write_lock.lock().await;
        let loaded = self.fetch().await;

        match loaded.source {
            ConfigSource::Cache => {}
            ConfigSource::Default => self.cache.store(Arc::clone(&loaded.document)),
            ConfigSource::Remote | ConfigSource::RemoteDefault | ConfigSource::Mirror => {
                self.cache.store(Arc::clone(&loaded.document));
                self.hydrated.store(true, Ordering::Release);
            }
        }
        loaded
    }

    /// Resolve the document without touching the cache.
    async fn fetch(&self) -> Loaded {
        let found = self.get_remote().await;
        if found.is_ok() {
            if let Some(loaded) = self.push_pending().await {
                return loaded;
            }
        }

        let reason = match found {
            Ok(Some(raw)) => {
                let document = migrate::decode(raw);
                self.mirror.write_snapshot(&document.to_value()).await;
                self.sync_state.send_replace(SyncState::Synced);
                debug!(identity = %self.config.identity, "configuration loaded from settings server");
                return Loaded {
                    document: Arc::new(document),
                    source: ConfigSource::Remote,
                };
            }
            Ok(None) => {
                self.sync_state.send_replace(SyncState::Synced);
                info!(identity = %self.config.identity, "no stored configuration; using defaults");
                return Loaded {
                    document: Arc::new(ConfigDocument::default()),
                    source: ConfigSource::RemoteDefault,
                };
            }
            Err(e) => e.to_string(),
        };

        warn!(reason = %reason, "settings server unavailable; falling back");
        self.sync_state
            .send_replace(SyncState::Degraded { reason });

        if let Some(raw) = self.mirror.read_snapshot().await {
            info!("configuration loaded from local mirror");
            return Loaded {
                document: Arc::new(migrate::decode(raw)),
                source: ConfigSource::Mirror,
            };
        }
        if self.hydrated.load(Ordering::Acquire) {
            return Loaded {
                document: self.cache.load_full(),
                source: ConfigSource::Cache,
            };
        }
        info!("no local mirror; using default configuration");
        Loaded {
            document: Arc::new(ConfigDocument::default()),
            source: ConfigSource::Default,
        }
    }

    /// Send a mirror holding unsynced edits to the settings server.
    ///
    /// `None` when nothing is pending. Otherwise the mirrored document,
    /// sourced from the remote if the push went through.
    async fn push_pending(&self) -> Option<Loaded> {
        if !self.mirror.has_pending().await {
            return None;
        }
        let Some(raw) = self.mirror.read_snapshot().await else {
            warn!("pending marker without a mirrored document; clearing it");
            self.mirror.set_pending(false).await;
            return None;
        };

        let document = migrate::decode(raw);
        match self.put_remote(&document.to_value()).await {
            Ok(()) => {
                self.mirror.set_pending(false).await;
                self.sync_state.send_replace(SyncState::Synced);
                info!(identity = %self.config.identity, "locally saved configuration sent to settings server");
                Some(Loaded {
                    document: Arc::new(document),
                    source: ConfigSource::Remote,
                })
            }
            Err(e) => {
                warn!(error = %e, "settings server refused locally saved configuration");
                self.sync_state.send_replace(SyncState::Degraded {
                    reason: e.to_string(),
                });
                Some(Loaded {
                    document: Arc::new(document),
                    source: ConfigSource::Mirror,
                })
            }
        }
    }

    async fn get_remote(&self) -> Result<Option<Value>, CoreError> {
        let limit = self.config.remote_timeout;
        tokio::time::timeout(limit, self.remote.get_document(&self.config.identity))
            .await
            .map_err(|_| CoreError::timeout(limit))?
    }

    async fn put_remote(&self, document: &Value) -> Result<(), CoreError> {
        let limit = self.config.remote_timeout;
        tokio::time::timeout(
            limit,
            self.remote.put_document(&self.config.identity, document),
        )
        .await
        .map_err(|_| CoreError::timeout(limit))?
    }
}
