// ── Core error types ──
//
// Errors surfaced by hubpanel-core. Widgets and the CLI never see raw
// HTTP or JSON failures; `From<hubpanel_api::Error>` folds them into
// the variants below.

use thiserror::Error;

use crate::model::Section;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot connect to {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("Request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    // ── Remote errors ────────────────────────────────────────────────
    #[error("API error: {message}")]
    Api {
        message: String,
        /// HTTP status code (if applicable).
        status: Option<u16>,
    },

    #[error("Entity not found: {entity_id}")]
    EntityNotFound { entity_id: String },

    // ── Operation errors ─────────────────────────────────────────────
    /// The section was applied locally and mirrored, but the remote
    /// write did not go through.
    #[error("Section '{section}' saved locally only: {reason}")]
    SyncDegraded { section: Section, reason: String },

    #[error("Command '{command}' on {entity_id} failed: {reason}")]
    CommandFailed {
        entity_id: String,
        command: String,
        reason: String,
    },

    #[error("Unknown configuration section: {name}")]
    InvalidSection { name: String },

    #[error("Validation failed: {message}")]
    Validation { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Whether the failure is worth retrying on the next cycle.
    ///
    /// Connection trouble, timeouts, and 5xx/429 replies are; bad input,
    /// auth rejections, and unknown entities are not.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::ConnectionFailed { .. } | Self::Timeout { .. } | Self::SyncDegraded { .. } => {
                true
            }
            Self::Api { status, .. } => status.is_none_or(|s| s >= 500 || s == 429),
            _ => false,
        }
    }

    pub(crate) fn timeout(limit: std::time::Duration) -> Self {
        Self::Timeout {
            timeout_ms: u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
        }
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<hubpanel_api::Error> for CoreError {
    fn from(err: hubpanel_api::Error) -> Self {
        match err {
            hubpanel_api::Error::Authentication { message } => {
                CoreError::AuthenticationFailed { message }
            }
            hubpanel_api::Error::Transport(ref e) => {
                if e.is_timeout() {
                    CoreError::Timeout { timeout_ms: 0 }
                } else if e.is_connect() {
                    CoreError::ConnectionFailed {
                        url: e
                            .url()
                            .map_or_else(|| "<unknown>".into(), ToString::to_string),
                        reason: e.to_string(),
                    }
                } else {
                    CoreError::Api {
                        message: e.to_string(),
                        status: e.status().map(|s| s.as_u16()),
                    }
                }
            }
            hubpanel_api::Error::InvalidUrl(e) => CoreError::Validation {
                message: format!("Invalid URL: {e}"),
            },
            hubpanel_api::Error::Tls(msg) => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("TLS error: {msg}"),
            },
            hubpanel_api::Error::Http { status, message } => CoreError::Api {
                message,
                status: Some(status),
            },
            hubpanel_api::Error::Deserialization { message, body: _ } => {
                CoreError::Internal(format!("Deserialization error: {message}"))
            }
        }
    }
}
