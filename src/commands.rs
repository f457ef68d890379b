//! CLI command definitions
//!
//! Defines the clap commands for the scenario CLI.

use clap::Subcommand;
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum Commands {
    /// Run a YAML scenario against a WebDriver endpoint
    Run {
        /// Path to the YAML scenario file
        path: PathBuf,

        /// Verbose output
        #[arg(long, short)]
        verbose: bool,

        /// WebDriver endpoint (overrides the config file)
        #[arg(long)]
        webdriver: Option<String>,

        /// Base URL of the shop, available to steps as ${base_url}
        #[arg(long)]
        base_url: Option<String>,

        /// Extra context value, e.g. --var admin_email=demo@example.com
        /// Can be specified multiple times
        #[arg(long = "var", value_parser = parse_var)]
        vars: Vec<(String, String)>,

        /// Write the JSON run report to this file
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Parse and compile a scenario without running it
    Validate {
        /// Path to the YAML scenario file
        path: PathBuf,
    },

    /// View the run log
    Logs {
        /// Number of lines to show (default: 50)
        #[arg(long, short = 'n', default_value = "50")]
        lines: usize,

        /// Clear the log file
        #[arg(long)]
        clear: bool,
    },
}

/// Parse a `key=value` pair
pub fn parse_var(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{}'", s))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty key in '{}'", s));
    }
    Ok((key.to_string(), value.to_string()))
}
