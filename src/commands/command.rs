//! Command trait definition for CLI commands.
//!
//! The [`Command`] trait is implemented by every fgbaq subcommand and
//! dispatched with `enum_dispatch` across the subcommand enum.

use anyhow::Result;
use enum_dispatch::enum_dispatch;

/// Trait implemented by all fgbaq CLI commands.
///
/// The `command_line` parameter carries the full invocation for logging.
#[enum_dispatch]
pub trait Command {
    #[allow(clippy::missing_errors_doc)]
    fn execute(&self, command_line: &str) -> Result<()>;
}
