//! Shared configuration for hubpanel.
//!
//! TOML file plus `HUBPANEL_` environment layering, hub token resolution
//! (env + keyring + plaintext), and translation into the runtime types
//! of `hubpanel_api` and `hubpanel_core`. Core never reads files; this
//! crate does it for it.

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use hubpanel_api::{TlsMode, TransportConfig};
use hubpanel_core::{PollerConfig, StoreConfig};

/// Keyring service name for stored secrets.
const KEYRING_SERVICE: &str = "hubpanel";
/// Keyring user under which the hub token is stored.
const KEYRING_HUB_TOKEN: &str = "hub-token";
/// Env var consulted for the hub token when `hub.token_env` is unset.
pub const DEFAULT_TOKEN_ENV: &str = "HUBPANEL_TOKEN";
/// Prefix of environment overrides; nested keys split on `__`.
pub const ENV_PREFIX: &str = "HUBPANEL_";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no hub token configured (set {env}, store one in the keyring, or set hub.token)")]
    NoToken { env: String },

    #[error("{field} is not configured")]
    Missing { field: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub defaults: Defaults,
    #[serde(default)]
    pub hub: HubSection,
    #[serde(default)]
    pub settings: SettingsSection,
    #[serde(default)]
    pub poller: PollerSection,
    #[serde(default)]
    pub mirror: MirrorSection,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_color() -> String {
    "auto".into()
}

/// The automation hub holding entity state.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct HubSection {
    /// Hub base URL (e.g., "http://homeassistant.local:8123").
    pub url: Option<String>,

    /// Long-lived access token (plaintext; prefer keyring or env var).
    pub token: Option<String>,

    /// Environment variable holding the token.
    pub token_env: Option<String>,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Accept self-signed certificates.
    #[serde(default)]
    pub insecure: bool,

    /// Path to a custom CA certificate.
    pub ca_cert: Option<PathBuf>,
}

impl Default for HubSection {
    fn default() -> Self {
        Self {
            url: None,
            token: None,
            token_env: None,
            timeout: default_timeout(),
            insecure: false,
            ca_cert: None,
        }
    }
}

/// The settings server holding the panel configuration document.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SettingsSection {
    /// Settings server base URL. Defaults to the hub URL.
    pub url: Option<String>,

    /// Identity the document is stored under.
    #[serde(default = "default_identity")]
    pub identity: String,

    /// Read/write timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

impl Default for SettingsSection {
    fn default() -> Self {
        Self {
            url: None,
            identity: default_identity(),
            timeout: default_timeout(),
        }
    }
}

fn default_timeout() -> u64 {
    10
}
fn default_identity() -> String {
    "default".into()
}

/// Poller tuning. Field names carry their unit.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct PollerSection {
    pub interval_ms: u64,
    pub batch_window_ms: u64,
    pub sweep_interval_secs: u64,
    pub backoff_after: u32,
    pub max_backoff_secs: u64,
    pub fetch_timeout_secs: u64,
}

impl Default for PollerSection {
    fn default() -> Self {
        let core = PollerConfig::default();
        Self {
            interval_ms: millis(core.default_interval),
            batch_window_ms: millis(core.batch_window),
            sweep_interval_secs: core.sweep_interval.as_secs(),
            backoff_after: core.backoff_after,
            max_backoff_secs: core.max_backoff.as_secs(),
            fetch_timeout_secs: core.fetch_timeout.as_secs(),
        }
    }
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

/// Local copy of the configuration document used while offline.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct MirrorSection {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Mirror file. Defaults to the platform data directory.
    pub path: Option<PathBuf>,
}

impl Default for MirrorSection {
    fn default() -> Self {
        Self {
            enabled: true,
            path: None,
        }
    }
}

fn default_true() -> bool {
    true
}

// ── Paths ───────────────────────────────────────────────────────────

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("dev", "hubpanel", "hubpanel")
}

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    project_dirs().map_or_else(
        || dirs_fallback().join("config.toml"),
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

/// Default location of the configuration mirror.
pub fn default_mirror_path() -> PathBuf {
    project_dirs().map_or_else(
        || dirs_fallback().join("mirror.json"),
        |dirs| dirs.data_dir().join("mirror.json"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("hubpanel");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Layering used by every loader: defaults, then the TOML file at
/// `path`, then `HUBPANEL_*` variables (`HUBPANEL_HUB__URL` → `hub.url`).
pub fn figment(path: &Path) -> Figment {
    Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
}

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load the full Config from `path` + environment.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    Ok(figment(path).extract()?)
}

/// Load config, returning a default if the file is missing or broken.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Credential resolution ───────────────────────────────────────────

/// Resolve the hub token: env var, then system keyring, then plaintext.
pub fn resolve_hub_token(hub: &HubSection) -> Result<SecretString, ConfigError> {
    let env_name = hub.token_env.as_deref().unwrap_or(DEFAULT_TOKEN_ENV);

    // 1. Env var
    if let Ok(val) = std::env::var(env_name) {
        if !val.trim().is_empty() {
            return Ok(SecretString::from(val));
        }
    }

    // 2. System keyring
    if let Ok(entry) = keyring::Entry::new(KEYRING_SERVICE, KEYRING_HUB_TOKEN) {
        if let Ok(secret) = entry.get_password() {
            return Ok(SecretString::from(secret));
        }
    }

    // 3. Plaintext in config
    if let Some(ref token) = hub.token {
        return Ok(SecretString::from(token.clone()));
    }

    Err(ConfigError::NoToken {
        env: env_name.into(),
    })
}

/// Store the hub token in the system keyring.
pub fn store_hub_token(token: &str) -> Result<(), ConfigError> {
    keyring::Entry::new(KEYRING_SERVICE, KEYRING_HUB_TOKEN)
        .and_then(|entry| entry.set_password(token))
        .map_err(|e| ConfigError::Validation {
            field: "keyring".into(),
            reason: e.to_string(),
        })
}

// ── Translation to runtime types ────────────────────────────────────

fn parse_url(field: &str, raw: Option<&str>) -> Result<Url, ConfigError> {
    let raw = raw.ok_or_else(|| ConfigError::Missing {
        field: field.into(),
    })?;
    raw.parse().map_err(|e: url::ParseError| ConfigError::Validation {
        field: field.into(),
        reason: format!("invalid URL '{raw}': {e}"),
    })
}

/// Hub base URL.
pub fn hub_url(cfg: &Config) -> Result<Url, ConfigError> {
    parse_url("hub.url", cfg.hub.url.as_deref())
}

/// Settings server base URL, falling back to the hub URL.
pub fn settings_url(cfg: &Config) -> Result<Url, ConfigError> {
    match cfg.settings.url.as_deref() {
        Some(raw) => parse_url("settings.url", Some(raw)),
        None => hub_url(cfg).map_err(|_| ConfigError::Missing {
            field: "settings.url (or hub.url)".into(),
        }),
    }
}

/// TLS and timeout settings for the hub client.
pub fn hub_transport(hub: &HubSection) -> TransportConfig {
    let tls = if hub.insecure {
        TlsMode::DangerAcceptInvalid
    } else if let Some(ref ca_path) = hub.ca_cert {
        TlsMode::CustomCa(ca_path.clone())
    } else {
        TlsMode::System
    };
    TransportConfig {
        tls,
        timeout: Duration::from_secs(hub.timeout),
    }
}

/// Transport for the settings server; shares the hub's TLS choice.
pub fn settings_transport(cfg: &Config) -> TransportConfig {
    TransportConfig {
        timeout: Duration::from_secs(cfg.settings.timeout),
        ..hub_transport(&cfg.hub)
    }
}

pub fn store_config(cfg: &Config) -> StoreConfig {
    StoreConfig {
        identity: cfg.settings.identity.clone(),
        remote_timeout: Duration::from_secs(cfg.settings.timeout),
    }
}

pub fn poller_config(cfg: &Config) -> PollerConfig {
    let p = &cfg.poller;
    PollerConfig {
        default_interval: Duration::from_millis(p.interval_ms),
        batch_window: Duration::from_millis(p.batch_window_ms),
        sweep_interval: Duration::from_secs(p.sweep_interval_secs),
        backoff_after: p.backoff_after,
        max_backoff: Duration::from_secs(p.max_backoff_secs),
        fetch_timeout: Duration::from_secs(p.fetch_timeout_secs),
        ..PollerConfig::default()
    }
}

/// Mirror file to use, or `None` when mirroring is disabled.
pub fn mirror_path(cfg: &Config) -> Option<PathBuf> {
    cfg.mirror
        .enabled
        .then(|| cfg.mirror.path.clone().unwrap_or_else(default_mirror_path))
}
