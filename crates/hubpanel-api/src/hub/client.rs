// Hub REST client
//
// Wraps `reqwest::Client` with bearer-token auth and the hub's state and
// service endpoints. Everything above this layer works with decoded
// `HubState` values, never raw responses.

use serde_json::{Map, Value};
use tracing::debug;
use url::Url;

use secrecy::SecretString;

use crate::error::Error;
use crate::hub::models::HubState;
use crate::response::{endpoint, read_json};
use crate::transport::TransportConfig;

/// HTTP client for the automation hub's REST API.
#[derive(Debug, Clone)]
pub struct HubClient {
    http: reqwest::Client,
    base_url: Url,
}

impl HubClient {
    /// Create a client that authenticates with a long-lived access token.
    pub fn new(
        base_url: Url,
        token: &SecretString,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let http = transport.build_bearer_client(token)?;
        Ok(Self { http, base_url })
    }

    /// Create a client around a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, base_url: Url) -> Self {
        Self { http, base_url }
    }

    /// The hub base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    // ── States ───────────────────────────────────────────────────────

    /// Fetch the current state of one entity.
    pub async fn get_state(&self, entity_id: &str) -> Result<HubState, Error> {
        let url = endpoint(&self.base_url, &["api", "states", entity_id])?;
        debug!("GET {}", url);

        let resp = self.http.get(url).send().await?;
        read_json(resp).await
    }

    /// Fetch every entity state the hub knows about.
    pub async fn list_states(&self) -> Result<Vec<HubState>, Error> {
        let url = endpoint(&self.base_url, &["api", "states"])?;
        debug!("GET {}", url);

        let resp = self.http.get(url).send().await?;
        read_json(resp).await
    }

    // ── Services ─────────────────────────────────────────────────────

    /// Invoke `domain.service` targeting one entity.
    ///
    /// `params` are merged into the request body next to `entity_id`.
    /// Returns the states the hub reports as changed by the call.
    pub async fn call_service(
        &self,
        domain: &str,
        service: &str,
        entity_id: &str,
        params: &Map<String, Value>,
    ) -> Result<Vec<HubState>, Error> {
        let url = endpoint(&self.base_url, &["api", "services", domain, service])?;
        debug!(entity_id, "POST {}", url);

        let mut body = params.clone();
        body.insert("entity_id".into(), Value::String(entity_id.to_owned()));

        let resp = self.http.post(url).json(&body).send().await?;
        read_json(resp).await
    }
}
