//! `watch`: stream entity updates through the poller until Ctrl-C.

use std::time::Duration;

use futures_util::StreamExt;
use tracing::info;

use hubpanel_core::{EntitySnapshot, SubscriptionId};

use crate::cli::{GlobalOpts, OutputFormat, WatchArgs};
use crate::config;
use crate::error::CliError;
use crate::output;

use super::util;

/// One printed line per update. JSON formats emit one object per line.
pub fn update_line(snap: &EntitySnapshot, format: OutputFormat, color: bool) -> Result<String, CliError> {
    Ok(match format {
        OutputFormat::Table => format!(
            "{}  {:<32} {}",
            util::local_time(snap.fetched_at),
            snap.entity_id,
            output::paint_state(&snap.state, color)
        ),
        OutputFormat::Json | OutputFormat::JsonCompact => output::render_json(snap, true)?,
        OutputFormat::Plain => format!("{} {}", snap.entity_id, snap.state),
    })
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(args: WatchArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let cfg = config::resolve(global)?;
    let format = config::output_format(global, &cfg);
    let color = output::should_color(global.color);

    let poller = config::poller(global, &cfg)?;
    let interval = args
        .interval_ms
        .map_or(poller.config().default_interval, Duration::from_millis);

    let stream = poller.subscribe(
        SubscriptionId::random(),
        args.entities.iter().map(String::as_str),
        interval,
    );
    info!(entities = args.entities.len(), ?interval, "watching");

    let mut updates = stream.into_stream().take(args.count.unwrap_or(usize::MAX));
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            next = updates.next() => {
                let Some(snap) = next else { break };
                output::print_output(&update_line(&snap, format, color)?, global.quiet);
            }
        }
    }

    poller.shutdown();
    Ok(())
}
