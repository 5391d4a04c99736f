//! Config subcommand handlers.
//!
//! `show`, `set`, and `entities` work on the panel configuration document
//! through `ConfigStore`; `path` and `set-token` concern the CLI's own
//! config file and credentials.

use serde::Serialize;
use strum::IntoEnumIterator;
use tabled::Tabled;

use hubpanel_core::{ConfigDocument, ConfigStore, Loaded, Section, SectionUpdate};

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts, OutputFormat};
use crate::config;
use crate::error::CliError;
use crate::output;

use super::util;

// ── Table rows ──────────────────────────────────────────────────────

#[derive(Clone, Tabled, Serialize)]
struct SectionRow {
    #[tabled(rename = "Section")]
    section: &'static str,
    #[tabled(rename = "Widget")]
    widget: &'static str,
    #[tabled(rename = "Entities")]
    entities: String,
}

impl SectionRow {
    fn new(doc: &ConfigDocument, section: Section) -> Self {
        let key = section.key();
        let widget = match doc.widgets.get(key) {
            Some(true) => "on",
            Some(false) => "off",
            None => "-",
        };
        Self {
            section: key,
            widget,
            entities: util::entity_ids_in(&doc.section_value(section)).join(", "),
        }
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

/// Load through the store, telling the user when the copy is not live.
async fn load(store: &ConfigStore, quiet: bool) -> Loaded {
    let loaded = store.load().await;
    if loaded.is_degraded() && !quiet {
        eprintln!(
            "warning: settings server unavailable; showing the {} copy",
            loaded.source
        );
    }
    loaded
}

fn read_token_from_stdin() -> Result<String, CliError> {
    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;
    Ok(line.trim().to_owned())
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Path => {
            let path = config::config_file(global);
            output::print_output(&path.display().to_string(), global.quiet);
            Ok(())
        }

        ConfigCommand::Show { section } => {
            let cfg = config::resolve(global)?;
            let format = config::output_format(global, &cfg);
            // Validate before touching the network.
            let section = section.as_deref().map(util::parse_section).transpose()?;

            let store = config::config_store(global, &cfg)?;
            let loaded = load(&store, global.quiet).await;
            let doc = &loaded.document;

            let out = match section {
                Some(section) => output::render_single(
                    format,
                    &doc.section_value(section),
                    |v| format!("{v:#}"),
                    ToString::to_string,
                )?,
                None if matches!(format, OutputFormat::Json | OutputFormat::JsonCompact) => {
                    output::render_json(&doc.to_value(), format == OutputFormat::JsonCompact)?
                }
                None => {
                    let rows: Vec<SectionRow> =
                        Section::iter().map(|s| SectionRow::new(doc, s)).collect();
                    output::render_list(format, &rows, SectionRow::clone, |r| r.section.to_owned())?
                }
            };
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ConfigCommand::Set { section, value } => {
            let cfg = config::resolve(global)?;
            let section = util::parse_section(&section)?;
            let value = util::parse_json("value", &value)?;
            let update = SectionUpdate::from_json(section, value)?;

            let store = config::config_store(global, &cfg)?;
            store.update_section(update).await?;
            if !global.quiet {
                eprintln!("Section '{section}' saved for identity '{}'", store.identity());
            }
            Ok(())
        }

        ConfigCommand::Entities => {
            let cfg = config::resolve(global)?;
            let format = config::output_format(global, &cfg);
            let store = config::config_store(global, &cfg)?;
            let loaded = load(&store, global.quiet).await;

            let ids: Vec<String> = loaded
                .document
                .bound_entities()
                .iter()
                .map(ToString::to_string)
                .collect();
            let out = match format {
                OutputFormat::Table | OutputFormat::Plain => ids.join("\n"),
                OutputFormat::Json => output::render_json(&ids, false)?,
                OutputFormat::JsonCompact => output::render_json(&ids, true)?,
            };
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ConfigCommand::SetToken { token } => {
            let token = match token {
                Some(token) => token,
                None => read_token_from_stdin()?,
            };
            if token.is_empty() {
                return Err(CliError::Validation {
                    field: "token".into(),
                    reason: "token cannot be empty".into(),
                });
            }
            hubpanel_config::store_hub_token(&token)?;
            if !global.quiet {
                eprintln!("Hub token stored in system keyring");
            }
            Ok(())
        }
    }
}
