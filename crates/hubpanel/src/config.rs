//! Runtime wiring: config file + command-line overrides → clients,
//! store, and poller.
//!
//! Commands never build `hubpanel_api` clients themselves; everything
//! that needs the hub or the settings server goes through here.

use std::path::PathBuf;
use std::sync::Arc;

use secrecy::SecretString;
use tracing::debug;

use hubpanel_api::{HubClient, SettingsClient};
use hubpanel_config::{Config, ConfigError};
use hubpanel_core::{
    ChangeBus, ConfigStore, EntityPoller, FileMirror, LocalMirror, MemoryMirror,
};

use crate::cli::{GlobalOpts, OutputFormat};
use crate::error::CliError;

/// Config file in effect: `--config` / `HUBPANEL_CONFIG`, else the
/// platform default.
pub fn config_file(global: &GlobalOpts) -> PathBuf {
    global
        .config
        .clone()
        .unwrap_or_else(hubpanel_config::config_path)
}

/// Load the config file and environment, then apply command-line flags.
pub fn resolve(global: &GlobalOpts) -> Result<Config, CliError> {
    let path = config_file(global);
    debug!(path = %path.display(), "loading config");
    let mut cfg = hubpanel_config::load_config_from(&path)?;

    if let Some(ref hub) = global.hub {
        cfg.hub.url = Some(hub.clone());
    }
    if let Some(ref settings) = global.settings {
        cfg.settings.url = Some(settings.clone());
    }
    if let Some(ref identity) = global.identity {
        cfg.settings.identity.clone_from(identity);
    }
    if global.insecure {
        cfg.hub.insecure = true;
    }
    if let Some(secs) = global.timeout {
        cfg.hub.timeout = secs;
        cfg.settings.timeout = secs;
    }
    Ok(cfg)
}

/// Output format: `--output`, else `defaults.output`, else table.
pub fn output_format(global: &GlobalOpts, cfg: &Config) -> OutputFormat {
    use clap::ValueEnum;

    global.output.unwrap_or_else(|| {
        OutputFormat::from_str(&cfg.defaults.output, true).unwrap_or(OutputFormat::Table)
    })
}

// ── Clients ──────────────────────────────────────────────────────────

fn hub_token(global: &GlobalOpts, cfg: &Config) -> Result<SecretString, CliError> {
    if let Some(ref token) = global.token {
        return Ok(SecretString::from(token.clone()));
    }
    Ok(hubpanel_config::resolve_hub_token(&cfg.hub)?)
}

/// Hub client for entity reads and commands.
pub fn hub_client(global: &GlobalOpts, cfg: &Config) -> Result<Arc<HubClient>, CliError> {
    let url = hubpanel_config::hub_url(cfg).map_err(|e| with_path(e, global))?;
    let token = hub_token(global, cfg)?;
    let client = HubClient::new(url, &token, &hubpanel_config::hub_transport(&cfg.hub))?;
    Ok(Arc::new(client))
}

/// Configuration store backed by the settings server and the mirror.
pub fn config_store(global: &GlobalOpts, cfg: &Config) -> Result<ConfigStore, CliError> {
    let url = hubpanel_config::settings_url(cfg).map_err(|e| with_path(e, global))?;
    let remote = SettingsClient::new(url, &hubpanel_config::settings_transport(cfg))?;

    let mirror: Arc<dyn LocalMirror> = match hubpanel_config::mirror_path(cfg) {
        Some(path) => {
            debug!(path = %path.display(), "using file mirror");
            Arc::new(FileMirror::new(path))
        }
        None => Arc::new(MemoryMirror::new()),
    };

    Ok(ConfigStore::new(
        hubpanel_config::store_config(cfg),
        Arc::new(remote),
        mirror,
        ChangeBus::new(),
    ))
}

/// Poller over the hub, tuned by the `[poller]` section.
pub fn poller(global: &GlobalOpts, cfg: &Config) -> Result<EntityPoller, CliError> {
    let source = hub_client(global, cfg)?;
    Ok(EntityPoller::start(source, hubpanel_config::poller_config(cfg)))
}

/// Point "not configured" errors at the config file actually in use.
fn with_path(err: ConfigError, global: &GlobalOpts) -> CliError {
    match CliError::from(err) {
        CliError::NoConfig { field, flag, .. } => CliError::NoConfig {
            field,
            flag,
            path: config_file(global).display().to_string(),
        },
        other => other,
    }
}
