// ── Entity snapshots ──
//
// The last known remote state of one entity, as cached by the poller.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::EntityId;

/// States the hub reports when it cannot reach the device itself.
const UNAVAILABLE_STATES: &[&str] = &["unavailable", "unknown"];

/// Last known state of one entity.
///
/// Replaced wholesale on every refresh; widgets only ever see shared
/// read-only copies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySnapshot {
    pub entity_id: EntityId,
    /// Domain-specific state token (`on`, `heat`, `21.5`, ...).
    pub state: String,
    #[serde(default)]
    pub attributes: Map<String, Value>,
    pub last_changed: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
    /// When this copy was received. Staleness is measured from here.
    #[serde(default = "Utc::now")]
    pub fetched_at: DateTime<Utc>,
}

impl EntitySnapshot {
    pub fn new(entity_id: impl Into<EntityId>, state: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            entity_id: entity_id.into(),
            state: state.into(),
            attributes: Map::new(),
            last_changed: now,
            last_updated: now,
            fetched_at: now,
        }
    }

    #[must_use]
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    pub fn friendly_name(&self) -> Option<&str> {
        self.attribute("friendly_name").and_then(Value::as_str)
    }

    pub fn is_unavailable(&self) -> bool {
        UNAVAILABLE_STATES.contains(&self.state.as_str())
    }

    /// Time since this snapshot was received, clamped at zero.
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        (now - self.fetched_at).to_std().unwrap_or_default()
    }

    /// Whether the snapshot is older than `max_age` at `now`.
    pub fn is_stale(&self, now: DateTime<Utc>, max_age: Duration) -> bool {
        self.age(now) > max_age
    }
}
