use anyhow::Result;
use clap::{ArgAction, Parser};
use jx_terraform::commands::{self, Commands, GlobalOptions};
use jx_terraform::logging;

#[derive(Parser)]
#[command(name = "jx")]
#[command(about = "Manage Jenkins X clusters provisioned with terraform", long_about = None)]
#[command(version)]
struct Cli {
    /// Run without prompting; all confirmations are accepted
    #[arg(long, short = 'b', global = true)]
    batch_mode: bool,
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(long, short = 'v', action = ArgAction::Count, global = true)]
    verbose: u8,
    #[command(subcommand)]
    command: Commands,
}

fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let global = GlobalOptions {
        batch_mode: cli.batch_mode,
    };
    commands::handle_command(&global, cli.command)
}
