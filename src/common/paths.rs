//! Configuration and log file locations
//!
//! Uses the directories crate for platform-appropriate locations:
//! - Linux: `~/.config/scenario-runner/`, `~/.local/share/scenario-runner/logs/`
//! - macOS: `~/Library/Application Support/scenario-runner/`
//! - Windows: `%APPDATA%\scenario-runner\`

use std::io;
use std::path::PathBuf;

/// Name used for the configuration and data directories
const APP_NAME: &str = "scenario-runner";

/// File name of the run log inside the log directory
pub const RUN_LOG_FILE: &str = "runs.log";

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("", "", APP_NAME)
}

/// Get the configuration directory path
pub fn config_dir() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the path to the configuration file
pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join("config.toml"))
}

/// Get the path to the log directory
pub fn log_dir() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.data_dir().join("logs"))
}

/// Get the path to the run log file
pub fn run_log_path() -> Option<PathBuf> {
    log_dir().map(|dir| dir.join(RUN_LOG_FILE))
}

/// Ensure the log directory exists
pub fn ensure_log_dir() -> io::Result<Option<PathBuf>> {
    if let Some(dir) = log_dir() {
        if !dir.exists() {
            std::fs::create_dir_all(&dir)?;
        }
        Ok(Some(dir))
    } else {
        Ok(None)
    }
}
