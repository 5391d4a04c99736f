// ── HTTP-backed boundaries ──
//
// `hubpanel_api` clients plugged into the core traits: the settings
// server as the remote config store, the hub as the entity source.

use std::collections::HashSet;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::debug;

use hubpanel_api::{HubClient, SettingsClient};

use super::{BatchResult, EntityStateSource, RemoteConfigClient};
use crate::error::CoreError;
use crate::model::{EntityId, EntitySnapshot};

#[async_trait]
impl RemoteConfigClient for SettingsClient {
    async fn get_document(&self, identity: &str) -> Result<Option<Value>, CoreError> {
        Ok(SettingsClient::get_document(self, identity).await?)
    }

    async fn put_document(&self, identity: &str, document: &Value) -> Result<(), CoreError> {
        Ok(SettingsClient::put_document(self, identity, document).await?)
    }
}

#[async_trait]
impl EntityStateSource for HubClient {
    async fn fetch_one(&self, entity_id: &EntityId) -> Result<EntitySnapshot, CoreError> {
        match self.get_state(entity_id.as_str()).await {
            Ok(state) => Ok(state.into()),
            Err(e) if e.is_not_found() => Err(CoreError::EntityNotFound {
                entity_id: entity_id.to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    /// One `GET /api/states` filtered down to the requested ids.
    async fn fetch_many(&self, entity_ids: &[EntityId]) -> Result<BatchResult, CoreError> {
        let wanted: HashSet<&str> = entity_ids.iter().map(EntityId::as_str).collect();
        let states = self.list_states().await?;
        debug!(requested = wanted.len(), listed = states.len(), "batch state fetch");

        Ok(states
            .into_iter()
            .filter(|s| wanted.contains(s.entity_id.as_str()))
            .map(|s| {
                let snap = EntitySnapshot::from(s);
                (snap.entity_id.clone(), Ok(snap))
            })
            .collect())
    }

    fn supports_batch(&self) -> bool {
        true
    }

    async fn invoke_command(
        &self,
        entity_id: &EntityId,
        command: &str,
        params: &Map<String, Value>,
    ) -> Result<(), CoreError> {
        let (domain, service) = service_target(entity_id, command);
        self.call_service(domain, service, entity_id.as_str(), params)
            .await?;
        Ok(())
    }
}

/// `light.turn_on` names its own domain; a bare `turn_on` uses the
/// entity's.
fn service_target<'a>(entity_id: &'a EntityId, command: &'a str) -> (&'a str, &'a str) {
    command
        .split_once('.')
        .unwrap_or((entity_id.domain(), command))
}
