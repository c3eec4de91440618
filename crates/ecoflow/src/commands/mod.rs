//! Command dispatch: bridges CLI args -> controller calls -> output formatting.

pub mod config_cmd;
pub mod devices;
pub mod listen;
pub mod params;

use ecoflow_core::Controller;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Dispatch a controller-bound command to the appropriate handler.
pub async fn dispatch(
    cmd: Command,
    controller: &Controller,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match cmd {
        Command::Devices => devices::handle(controller, global).await,
        Command::Params(args) => params::handle(controller, &args, global).await,
        Command::SetWatts(args) => params::set_watts(controller, &args, global).await,
        Command::Listen(args) => listen::handle(controller, &args, global).await,
        // Handled in main before a controller exists
        Command::Config(_) | Command::Completions(_) => Ok(()),
    }
}
