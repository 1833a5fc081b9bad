// Command module routing
//
// To add a new command:
// 1. Create a new file in this directory (e.g., `mycommand.rs`)
// 2. Add `pub mod mycommand;` below
// 3. Add a variant to `Commands` and the match arm in `handle_command`

pub mod update;

use anyhow::Result;
use clap::Subcommand;

pub use update::UpdateCommands;

/// Flags shared by every command
#[derive(Debug, Clone, Copy, Default)]
pub struct GlobalOptions {
    /// Never prompt; every confirmation is answered "yes"
    pub batch_mode: bool,
}

#[derive(Subcommand, Clone, Debug)]
pub enum Commands {
    /// Update existing resources
    Update {
        #[command(subcommand)]
        command: UpdateCommands,
    },
}

/// Dispatch command to appropriate handler
pub fn handle_command(global: &GlobalOptions, command: Commands) -> Result<()> {
    match command {
        Commands::Update { command } => update::handle_update(global, command),
    }
}
