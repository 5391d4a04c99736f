//! `state`: one-shot read of an entity.

use hubpanel_core::{EntityId, EntitySnapshot, EntityStateSource};

use crate::cli::{GlobalOpts, StateArgs};
use crate::config;
use crate::error::CliError;
use crate::output;

use super::util;

// ── Detail view ─────────────────────────────────────────────────────

pub fn detail(snap: &EntitySnapshot, color: bool) -> String {
    let mut lines = vec![
        format!("Entity:      {}", snap.entity_id),
        format!("Name:        {}", snap.friendly_name().unwrap_or("-")),
        format!("State:       {}", output::paint_state(&snap.state, color)),
        format!("Changed:     {}", util::local_time(snap.last_changed)),
        format!("Updated:     {}", util::local_time(snap.last_updated)),
    ];

    let attributes: Vec<_> = snap
        .attributes
        .iter()
        .filter(|(name, _)| name.as_str() != "friendly_name")
        .collect();
    if !attributes.is_empty() {
        lines.push("Attributes:".into());
        for (name, value) in attributes {
            lines.push(format!("  {name}: {}", util::attribute_text(value)));
        }
    }
    lines.join("\n")
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(args: StateArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let cfg = config::resolve(global)?;
    let format = config::output_format(global, &cfg);
    let color = output::should_color(global.color);

    let hub = config::hub_client(global, &cfg)?;
    let snap = hub.fetch_one(&EntityId::from(args.entity)).await?;

    let out = output::render_single(format, &snap, |s| detail(s, color), |s| s.state.clone())?;
    output::print_output(&out, global.quiet);
    Ok(())
}
