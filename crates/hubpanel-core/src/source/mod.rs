// ── External boundaries ──
//
// The three seams the core talks through: the remote settings store,
// the local mirror used when it is unreachable, and the hub that owns
// entity state. HTTP and file implementations live in the submodules;
// tests plug in their own.

use std::collections::HashMap;

use async_trait::async_trait;
use futures_util::future::join_all;
use serde_json::{Map, Value};

use crate::error::CoreError;
use crate::model::{EntityId, EntitySnapshot};

pub mod http;
pub mod mirror;

pub use mirror::{FileMirror, MemoryMirror};

/// Per-id results of a batched fetch.
pub type BatchResult = HashMap<EntityId, Result<EntitySnapshot, CoreError>>;

/// Remote store holding one configuration document per identity.
#[async_trait]
pub trait RemoteConfigClient: Send + Sync {
    /// The stored document, or `Ok(None)` when the identity has none yet.
    async fn get_document(&self, identity: &str) -> Result<Option<Value>, CoreError>;

    /// Replace the stored document whole.
    async fn put_document(&self, identity: &str, document: &Value) -> Result<(), CoreError>;
}

/// Best-effort local copy of the last known document.
///
/// Implementations swallow (and log) their own failures: a broken
/// mirror must never fail a load or an update.
#[async_trait]
pub trait LocalMirror: Send + Sync {
    async fn read_snapshot(&self) -> Option<Value>;

    async fn write_snapshot(&self, document: &Value);

    /// Whether the snapshot holds edits the remote store has not accepted.
    async fn has_pending(&self) -> bool {
        false
    }

    /// Mark or clear unsynced edits. Survives restarts where the
    /// implementation can persist it.
    async fn set_pending(&self, _pending: bool) {}
}

/// Where entity state comes from and where commands go.
#[async_trait]
pub trait EntityStateSource: Send + Sync {
    async fn fetch_one(&self, entity_id: &EntityId) -> Result<EntitySnapshot, CoreError>;

    /// Fetch several ids at once.
    ///
    /// An `Err` means the whole call failed. Ids missing from an `Ok` map
    /// are treated as not found. The default fans out to
    /// [`fetch_one`](Self::fetch_one) concurrently.
    async fn fetch_many(&self, entity_ids: &[EntityId]) -> Result<BatchResult, CoreError> {
        let results = join_all(entity_ids.iter().map(|id| self.fetch_one(id))).await;
        Ok(entity_ids.iter().cloned().zip(results).collect())
    }

    /// Whether [`fetch_many`](Self::fetch_many) is a real single round trip.
    fn supports_batch(&self) -> bool {
        false
    }

    /// Run `command` against an entity. Never retried by the caller.
    async fn invoke_command(
        &self,
        entity_id: &EntityId,
        command: &str,
        params: &Map<String, Value>,
    ) -> Result<(), CoreError>;
}
