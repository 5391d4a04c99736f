// ── Local mirrors ──
//
// Last-known-good copies of the configuration document. Every failure
// is logged and swallowed.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

use super::LocalMirror;

// ── FileMirror ──────────────────────────────────────────────────────

/// JSON file on disk. Writes go to a sibling temp file which is then
/// renamed over the target, so readers never see a torn document.
/// Unsynced edits are flagged by an empty `<file>.pending` sibling.
#[derive(Debug, Clone)]
pub struct FileMirror {
    path: PathBuf,
}

impl FileMirror {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn write(&self, document: &Value) -> std::io::Result<()> {
        let bytes = serde_json::to_vec_pretty(document)?;
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(dir).await?;
        }
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await
    }

    fn marker(&self) -> PathBuf {
        self.path.with_extension("json.pending")
    }
}

#[async_trait]
impl LocalMirror for FileMirror {
    async fn read_snapshot(&self) -> Option<Value> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "cannot read config mirror");
                return None;
            }
        };
        match serde_json::from_slice(&bytes) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "config mirror is not valid JSON");
                None
            }
        }
    }

    async fn write_snapshot(&self, document: &Value) {
        match self.write(document).await {
            Ok(()) => debug!(path = %self.path.display(), "config mirror written"),
            Err(e) => warn!(path = %self.path.display(), error = %e, "cannot write config mirror"),
        }
    }

    async fn has_pending(&self) -> bool {
        tokio::fs::try_exists(self.marker()).await.unwrap_or(false)
    }

    async fn set_pending(&self, pending: bool) {
        let marker = self.marker();
        let result = if pending {
            tokio::fs::write(&marker, b"").await
        } else {
            match tokio::fs::remove_file(&marker).await {
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                other => other,
            }
        };
        if let Err(e) = result {
            warn!(path = %marker.display(), error = %e, "cannot update config mirror marker");
        }
    }
}

// ── MemoryMirror ────────────────────────────────────────────────────

/// In-process mirror, for embedding without a writable disk and for tests.
#[derive(Debug, Default)]
pub struct MemoryMirror {
    slot: Mutex<Option<Value>>,
    pending: AtomicBool,
}

impl MemoryMirror {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_snapshot(document: Value) -> Self {
        Self {
            slot: Mutex::new(Some(document)),
            pending: AtomicBool::new(false),
        }
    }

    /// What is currently stored.
    pub fn contents(&self) -> Option<Value> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

#[async_trait]
impl LocalMirror for MemoryMirror {
    async fn read_snapshot(&self) -> Option<Value> {
        self.contents()
    }

    async fn write_snapshot(&self, document: &Value) {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(document.clone());
    }

    async fn has_pending(&self) -> bool {
        self.pending.load(Ordering::Acquire)
    }

    async fn set_pending(&self, pending: bool) {
        self.pending.store(pending, Ordering::Release);
    }
}
