//! Scenario runner CLI
//!
//! Runs YAML-described browser scenarios against a shop through a W3C
//! WebDriver endpoint and reports every step.

use clap::Parser;
use commands::Commands;
use scenario::common::logging;
use scenario::{cli, commands};

#[derive(Parser)]
#[command(name = "scenario", about = "Browser-driven scenario test runner")]
#[command(version, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let verbose = matches!(cli.command, Commands::Run { verbose: true, .. });
    let guard = logging::init_cli(verbose);

    let result = cli::dispatch(cli.command).await;
    drop(guard);

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
