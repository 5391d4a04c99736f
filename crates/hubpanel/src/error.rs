//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` variants into user-facing errors
//! with actionable help text.

use miette::Diagnostic;
use strum::IntoEnumIterator;
use thiserror::Error;

use hubpanel_config::ConfigError;
use hubpanel_core::{CoreError, Section};

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const DEGRADED: i32 = 6;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────

    #[error("Could not connect to {url}")]
    #[diagnostic(
        code(hubpanel::connection_failed),
        help(
            "Check that the server is running and reachable.\n\
             URL: {url}\n\
             Use --insecure (-k) for self-signed certificates."
        )
    )]
    ConnectionFailed {
        url: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Request timed out after {millis}ms")]
    #[diagnostic(
        code(hubpanel::timeout),
        help("Increase the timeout with --timeout or check the server's responsiveness.")
    )]
    Timeout { millis: u64 },

    // ── Authentication ───────────────────────────────────────────────

    #[error("Authentication failed: {message}")]
    #[diagnostic(
        code(hubpanel::auth_failed),
        help(
            "Verify the hub access token.\n\
             Store a new one with: hubpanel config set-token"
        )
    )]
    AuthFailed { message: String },

    #[error("No hub token configured")]
    #[diagnostic(
        code(hubpanel::no_token),
        help(
            "Set the {env} environment variable, pass --token,\n\
             or store one with: hubpanel config set-token"
        )
    )]
    NoToken { env: String },

    // ── Resources ────────────────────────────────────────────────────

    #[error("Entity '{entity_id}' not found on the hub")]
    #[diagnostic(
        code(hubpanel::not_found),
        help("Run: hubpanel config entities to see the entities the panel uses")
    )]
    NotFound { entity_id: String },

    #[error("Unknown configuration section '{name}'")]
    #[diagnostic(code(hubpanel::unknown_section), help("Known sections: {available}"))]
    UnknownSection { name: String, available: String },

    // ── Remote ───────────────────────────────────────────────────────

    #[error("API error ({status}): {message}")]
    #[diagnostic(code(hubpanel::api_error))]
    ApiError { status: String, message: String },

    #[error("Section '{section}' was saved locally only")]
    #[diagnostic(
        code(hubpanel::sync_degraded),
        help(
            "The settings server did not accept the write: {reason}\n\
             The change is kept in the local mirror and is sent once the settings server is reachable again."
        )
    )]
    SyncDegraded { section: String, reason: String },

    #[error("Command '{command}' on {entity_id} failed")]
    #[diagnostic(
        code(hubpanel::command_failed),
        help("{reason}\nCommands are not retried; run the call again once the hub is healthy.")
    )]
    CommandFailed {
        entity_id: String,
        command: String,
        reason: String,
    },

    // ── Validation ───────────────────────────────────────────────────

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(hubpanel::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────

    #[error("{field} is not configured")]
    #[diagnostic(
        code(hubpanel::no_config),
        help(
            "Set it in the config file or on the command line ({flag}).\n\
             Config file: {path}"
        )
    )]
    NoConfig {
        field: String,
        flag: String,
        path: String,
    },

    #[error(transparent)]
    #[diagnostic(code(hubpanel::config))]
    Config(Box<ConfigError>),

    // ── IO / Serialization ───────────────────────────────────────────

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON: {0}")]
    #[diagnostic(code(hubpanel::json), help("Check the JSON value and try again."))]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::AuthFailed { .. } | Self::NoToken { .. } => exit_code::AUTH,
            Self::NotFound { .. } => exit_code::NOT_FOUND,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::SyncDegraded { .. } => exit_code::DEGRADED,
            Self::Validation { .. }
            | Self::UnknownSection { .. }
            | Self::NoConfig { .. }
            | Self::Json(_) => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }

    pub fn unknown_section(name: impl Into<String>) -> Self {
        Self::UnknownSection {
            name: name.into(),
            available: Section::iter()
                .map(Section::key)
                .collect::<Vec<_>>()
                .join(", "),
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ConnectionFailed { url, reason } => CliError::ConnectionFailed {
                url,
                source: reason.into(),
            },

            CoreError::Timeout { timeout_ms } => CliError::Timeout { millis: timeout_ms },

            CoreError::AuthenticationFailed { message } => CliError::AuthFailed { message },

            CoreError::EntityNotFound { entity_id } => CliError::NotFound { entity_id },

            CoreError::Api { message, status } => CliError::ApiError {
                status: status.map_or_else(|| "-".into(), |s| s.to_string()),
                message,
            },

            CoreError::SyncDegraded { section, reason } => CliError::SyncDegraded {
                section: section.to_string(),
                reason,
            },

            CoreError::CommandFailed {
                entity_id,
                command,
                reason,
            } => CliError::CommandFailed {
                entity_id,
                command,
                reason,
            },

            CoreError::InvalidSection { name } => CliError::unknown_section(name),

            CoreError::Validation { message } => CliError::Validation {
                field: "input".into(),
                reason: message,
            },

            CoreError::Internal(message) => CliError::ApiError {
                status: "internal".into(),
                message,
            },
        }
    }
}

impl From<hubpanel_api::Error> for CliError {
    fn from(err: hubpanel_api::Error) -> Self {
        CoreError::from(err).into()
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::NoToken { env } => CliError::NoToken { env },
            ConfigError::Missing { field } => {
                let flag = if field.starts_with("settings") {
                    "--settings or --hub"
                } else {
                    "--hub"
                };
                CliError::NoConfig {
                    field,
                    flag: flag.into(),
                    path: hubpanel_config::config_path().display().to_string(),
                }
            }
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            other => CliError::Config(Box::new(other)),
        }
    }
}
