//! Command dispatch: bridges CLI args -> core operations -> output formatting.

pub mod call;
pub mod config_cmd;
pub mod state;
pub mod util;
pub mod watch;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Dispatch a command to its handler.
pub async fn dispatch(cmd: Command, global: &GlobalOpts) -> Result<(), CliError> {
    match cmd {
        Command::State(args) => state::handle(args, global).await,
        Command::Watch(args) => watch::handle(args, global).await,
        Command::Call(args) => call::handle(args, global).await,
        Command::Config(args) => config_cmd::handle(args, global).await,
        // Completions are handled before dispatch
        Command::Completions(_) => unreachable!(),
    }
}
