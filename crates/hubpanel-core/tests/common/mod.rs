// Shared fakes for the hubpanel-core integration tests.
#![allow(dead_code, clippy::unwrap_used)]

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value};

use hubpanel_core::source::BatchResult;
use hubpanel_core::{
    CoreError, EntityId, EntitySnapshot, EntityStateSource, LocalMirror, RemoteConfigClient,
};

fn refused() -> CoreError {
    CoreError::ConnectionFailed {
        url: "http://settings.test".into(),
        reason: "connection refused".into(),
    }
}

// ── Remote config ───────────────────────────────────────────────────

/// In-memory settings server.
#[derive(Default)]
pub struct MockRemote {
    document: Mutex<Option<Value>>,
    pub fail_reads: AtomicBool,
    pub fail_writes: AtomicBool,
    read_delay: Mutex<Duration>,
    write_delay: Mutex<Duration>,
    pub reads: AtomicUsize,
    puts: Mutex<Vec<Value>>,
}

impl MockRemote {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(document: Value) -> Self {
        let remote = Self::default();
        *remote.document.lock().unwrap() = Some(document);
        remote
    }

    pub fn unreachable() -> Self {
        let remote = Self::default();
        remote.fail_reads.store(true, Ordering::SeqCst);
        remote.fail_writes.store(true, Ordering::SeqCst);
        remote
    }

    pub fn set_read_delay(&self, delay: Duration) {
        *self.read_delay.lock().unwrap() = delay;
    }

    pub fn set_write_delay(&self, delay: Duration) {
        *self.write_delay.lock().unwrap() = delay;
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.fail_reads.store(!reachable, Ordering::SeqCst);
        self.fail_writes.store(!reachable, Ordering::SeqCst);
    }

    pub fn document(&self) -> Option<Value> {
        self.document.lock().unwrap().clone()
    }

    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn puts(&self) -> Vec<Value> {
        self.puts.lock().unwrap().clone()
    }
}

#[async_trait]
impl RemoteConfigClient for MockRemote {
    async fn get_document(&self, _identity: &str) -> Result<Option<Value>, CoreError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let delay = *self.read_delay.lock().unwrap();
        tokio::time::sleep(delay).await;
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(refused());
        }
        Ok(self.document())
    }

    async fn put_document(&self, _identity: &str, document: &Value) -> Result<(), CoreError> {
        let delay = *self.write_delay.lock().unwrap();
        tokio::time::sleep(delay).await;
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(refused());
        }
        self.puts.lock().unwrap().push(document.clone());
        *self.document.lock().unwrap() = Some(document.clone());
        Ok(())
    }
}

// ── Mirror ──────────────────────────────────────────────────────────

/// A mirror that never holds anything, as when local storage is disabled.
pub struct NullMirror;

#[async_trait]
impl LocalMirror for NullMirror {
    async fn read_snapshot(&self) -> Option<Value> {
        None
    }

    async fn write_snapshot(&self, _document: &Value) {}
}

// ── Entity source ───────────────────────────────────────────────────

/// Scriptable hub: per-id state, failures, and delays, with call counts.
#[derive(Default)]
pub struct MockSource {
    batch: bool,
    states: Mutex<HashMap<String, String>>,
    failing: Mutex<HashSet<String>>,
    delays: Mutex<HashMap<String, Duration>>,
    fetches: Mutex<HashMap<String, usize>>,
    batches: Mutex<Vec<Vec<String>>>,
    pub fail_batch: AtomicBool,
    pub fail_commands: AtomicBool,
    commands: Mutex<Vec<(String, String)>>,
}

impl MockSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn batching() -> Self {
        Self {
            batch: true,
            ..Self::default()
        }
    }

    pub fn set_state(&self, id: &str, state: &str) {
        self.states.lock().unwrap().insert(id.into(), state.into());
    }

    pub fn set_failing(&self, id: &str, failing: bool) {
        let mut set = self.failing.lock().unwrap();
        if failing {
            set.insert(id.into());
        } else {
            set.remove(id);
        }
    }

    pub fn set_delay(&self, id: &str, delay: Duration) {
        self.delays.lock().unwrap().insert(id.into(), delay);
    }

    /// Single-entity fetches of `id` so far.
    pub fn fetch_count(&self, id: &str) -> usize {
        self.fetches.lock().unwrap().get(id).copied().unwrap_or(0)
    }

    pub fn batches(&self) -> Vec<Vec<String>> {
        self.batches.lock().unwrap().clone()
    }

    pub fn commands(&self) -> Vec<(String, String)> {
        self.commands.lock().unwrap().clone()
    }

    fn current(&self, id: &EntityId) -> Result<EntitySnapshot, CoreError> {
        if self.failing.lock().unwrap().contains(id.as_str()) {
            return Err(CoreError::Api {
                message: "hub unavailable".into(),
                status: Some(503),
            });
        }
        let state = self.states.lock().unwrap().get(id.as_str()).cloned();
        state
            .map(|s| EntitySnapshot::new(id.clone(), s))
            .ok_or_else(|| CoreError::EntityNotFound {
                entity_id: id.to_string(),
            })
    }
}

#[async_trait]
impl EntityStateSource for MockSource {
    async fn fetch_one(&self, entity_id: &EntityId) -> Result<EntitySnapshot, CoreError> {
        *self
            .fetches
            .lock()
            .unwrap()
            .entry(entity_id.to_string())
            .or_default() += 1;
        let delay = self.delays.lock().unwrap().get(entity_id.as_str()).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.current(entity_id)
    }

    async fn fetch_many(&self, entity_ids: &[EntityId]) -> Result<BatchResult, CoreError> {
        self.batches
            .lock()
            .unwrap()
            .push(entity_ids.iter().map(ToString::to_string).collect());
        if self.fail_batch.load(Ordering::SeqCst) {
            return Err(CoreError::Api {
                message: "batch endpoint down".into(),
                status: Some(502),
            });
        }
        let known = self.states.lock().unwrap().clone();
        Ok(entity_ids
            .iter()
            .filter(|id| known.contains_key(id.as_str()))
            .map(|id| (id.clone(), self.current(id)))
            .collect())
    }

    fn supports_batch(&self) -> bool {
        self.batch
    }

    async fn invoke_command(
        &self,
        entity_id: &EntityId,
        command: &str,
        _params: &Map<String, Value>,
    ) -> Result<(), CoreError> {
        self.commands
            .lock()
            .unwrap()
            .push((entity_id.to_string(), command.to_owned()));
        if self.fail_commands.load(Ordering::SeqCst) {
            return Err(CoreError::Api {
                message: "service not found".into(),
                status: Some(400),
            });
        }
        Ok(())
    }
}
