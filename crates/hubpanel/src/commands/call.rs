//! `call`: send one command to an entity. Never retried.

use tracing::debug;

use hubpanel_core::{CoreError, EntityId, EntityStateSource};

use crate::cli::{CallArgs, GlobalOpts};
use crate::config;
use crate::error::CliError;

use super::util;

pub async fn handle(args: CallArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let cfg = config::resolve(global)?;
    let params = util::parse_json_object("data", args.data.as_deref())?;
    let hub = config::hub_client(global, &cfg)?;
    let entity_id = EntityId::from(args.entity);

    debug!(%entity_id, command = %args.command, params = params.len(), "calling");
    match hub.invoke_command(&entity_id, &args.command, &params).await {
        Ok(()) => {
            if !global.quiet {
                eprintln!("Command '{}' sent to {entity_id}", args.command);
            }
            Ok(())
        }
        // Reachability and credential problems keep their own diagnostics.
        Err(
            e @ (CoreError::ConnectionFailed { .. }
            | CoreError::AuthenticationFailed { .. }
            | CoreError::Timeout { .. }),
        ) => Err(e.into()),
        Err(e) => Err(CliError::CommandFailed {
            entity_id: entity_id.to_string(),
            command: args.command,
            reason: e.to_string(),
        }),
    }
}
