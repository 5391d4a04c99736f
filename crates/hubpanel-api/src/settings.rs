// Settings server client
//
// The settings server is a plain key-document store: one JSON document
// per caller identity, read and replaced whole.

use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::response::{check_status, endpoint, read_json};
use crate::transport::TransportConfig;

/// HTTP client for the panel settings server.
#[derive(Debug, Clone)]
pub struct SettingsClient {
    http: reqwest::Client,
    base_url: Url,
}

impl SettingsClient {
    pub fn new(base_url: Url, transport: &TransportConfig) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self { http, base_url })
    }

    pub fn with_client(http: reqwest::Client, base_url: Url) -> Self {
        Self { http, base_url }
    }

    /// Fetch the document stored for `identity`.
    ///
    /// Returns `Ok(None)` when the server has no document yet (HTTP 404).
    pub async fn get_document(&self, identity: &str) -> Result<Option<Value>, Error> {
        let url = endpoint(&self.base_url, &["api", "config", identity])?;
        debug!("GET {}", url);

        let resp = self.http.get(url).send().await?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        read_json(resp).await.map(Some)
    }

    /// Replace the document stored for `identity`.
    pub async fn put_document(&self, identity: &str, document: &Value) -> Result<(), Error> {
        let url = endpoint(&self.base_url, &["api", "config", identity])?;
        debug!("PUT {}", url);

        let resp = self.http.put(url).json(document).send().await?;
        check_status(resp).await?;
        Ok(())
    }
}
