//! Error types for the scenario runner
//!
//! Messages carry enough detail (selector, expected/actual values) to
//! diagnose a failed run from the report alone.

use std::fmt::Debug;
use std::io;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the scenario runner
#[derive(Error, Debug)]
pub enum Error {
    // === Assertion Errors ===
    #[error("{message}: expected {expected}, got {actual}")]
    Assertion {
        message: String,
        expected: String,
        actual: String,
    },

    #[error("Context key '{0}' not found. Was it stored by an earlier step?")]
    KeyNotFound(String),

    #[error("Invalid value: {0}")]
    InvalidValue(String),

    // === Session Errors ===
    #[error("Failed to open browser session: {0}")]
    SessionOpen(String),

    #[error("Failed to close browser session: {0}")]
    SessionClose(String),

    #[error("No browser session is open")]
    SessionNotOpen,

    #[error("No element matches selector '{0}'")]
    ElementNotFound(String),

    #[error("Tab {index} does not exist (only {count} open)")]
    TabNotFound { index: usize, count: usize },

    // === WebDriver Errors ===
    #[error("WebDriver error '{error}': {message}")]
    WebDriver { error: String, message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Operation timed out after {0} ms")]
    Timeout(u64),

    // === Configuration Errors ===
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration file: {0}")]
    ConfigParse(String),

    #[error("Failed to read file '{path}': {error}")]
    FileRead { path: String, error: String },

    // === IO Errors ===
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    // === Serialization Errors ===
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid scenario file: {0}")]
    Yaml(#[from] serde_yaml::Error),

    // === Run Errors ===
    #[error("Scenario '{name}' {status}")]
    RunFailed { name: String, status: String },
}

impl Error {
    /// Create an assertion error, formatting both sides with `Debug`
    pub fn assertion(message: impl Into<String>, expected: impl Debug, actual: impl Debug) -> Self {
        Self::Assertion {
            message: message.into(),
            expected: format!("{:?}", expected),
            actual: format!("{:?}", actual),
        }
    }

    /// Create a WebDriver protocol error
    pub fn webdriver(error: &str, message: &str) -> Self {
        Self::WebDriver {
            error: error.to_string(),
            message: message.to_string(),
        }
    }

    /// Whether this error means the browser session itself is unusable
    pub fn is_resource(&self) -> bool {
        matches!(self, Error::SessionOpen(_) | Error::SessionClose(_))
    }

    /// Whether this error is an assertion about application state
    pub fn is_assertion(&self) -> bool {
        matches!(self, Error::Assertion { .. } | Error::KeyNotFound(_))
    }
}
