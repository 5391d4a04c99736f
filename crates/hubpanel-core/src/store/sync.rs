// ── Load outcomes and sync state ──

use std::fmt;
use std::sync::Arc;

use crate::model::ConfigDocument;

/// Where a loaded document came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSource {
    /// The settings server returned a stored document.
    Remote,
    /// The settings server answered but holds nothing for this identity yet.
    RemoteDefault,
    /// Remote unavailable, or it refused unsynced local edits; the local
    /// mirror was used.
    Mirror,
    /// Remote and mirror unavailable; the previously loaded document was kept.
    Cache,
    /// Nothing available; compiled-in defaults.
    Default,
}

impl ConfigSource {
    /// True when the document may lag what the settings server holds.
    pub fn is_degraded(self) -> bool {
        matches!(self, Self::Mirror | Self::Cache | Self::Default)
    }
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Remote => "remote",
            Self::RemoteDefault => "remote (no document yet)",
            Self::Mirror => "local mirror",
            Self::Cache => "in-memory cache",
            Self::Default => "defaults",
        })
    }
}

/// Result of [`ConfigStore::load`](super::ConfigStore::load).
#[derive(Debug, Clone)]
pub struct Loaded {
    pub document: Arc<ConfigDocument>,
    pub source: ConfigSource,
}

impl Loaded {
    pub fn is_degraded(&self) -> bool {
        self.source.is_degraded()
    }
}

/// How the in-memory document relates to the settings server.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SyncState {
    /// No load has completed yet.
    #[default]
    Unloaded,
    /// Last load or write reached the settings server.
    Synced,
    /// Running on a local copy; `reason` is the last remote failure.
    Degraded { reason: String },
}

impl SyncState {
    pub fn is_synced(&self) -> bool {
        matches!(self, Self::Synced)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_remote_sources_are_healthy() {
        assert!(!ConfigSource::Remote.is_degraded());
        assert!(!ConfigSource::RemoteDefault.is_degraded());
        assert!(ConfigSource::Mirror.is_degraded());
        assert!(ConfigSource::Cache.is_degraded());
        assert!(ConfigSource::Default.is_degraded());
    }
}
