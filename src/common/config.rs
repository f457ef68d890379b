//! Configuration file handling

use serde::Deserialize;
use std::path::Path;

use super::paths::config_path;
use super::{Error, Result};

/// Main configuration structure
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// WebDriver endpoint settings
    #[serde(default)]
    pub webdriver: WebDriverConfig,

    /// Timeout settings
    #[serde(default)]
    pub timeouts: Timeouts,

    /// Application under test
    #[serde(default)]
    pub shop: ShopConfig,
}

/// Browser family requested from the WebDriver endpoint
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Browser {
    #[default]
    Chrome,
    Firefox,
    Edge,
}

impl Browser {
    /// The W3C `browserName` capability value
    pub fn capability_name(self) -> &'static str {
        match self {
            Self::Chrome => "chrome",
            Self::Firefox => "firefox",
            Self::Edge => "MicrosoftEdge",
        }
    }
}

/// WebDriver endpoint settings
#[derive(Debug, Deserialize, Clone)]
pub struct WebDriverConfig {
    /// Base URL of the WebDriver server (chromedriver, geckodriver, selenium)
    #[serde(default = "default_webdriver_url")]
    pub url: String,

    /// Browser to request
    #[serde(default)]
    pub browser: Browser,

    /// Run the browser without a window
    #[serde(default = "default_headless")]
    pub headless: bool,

    /// Extra browser command-line arguments
    #[serde(default)]
    pub args: Vec<String>,
}

impl Default for WebDriverConfig {
    fn default() -> Self {
        Self {
            url: default_webdriver_url(),
            browser: Browser::default(),
            headless: default_headless(),
            args: Vec::new(),
        }
    }
}

fn default_webdriver_url() -> String {
    "http://localhost:4444".to_string()
}

fn default_headless() -> bool {
    true
}

/// Timeout settings
#[derive(Debug, Deserialize, Clone)]
pub struct Timeouts {
    /// Timeout for a single WebDriver HTTP request, in seconds
    #[serde(default = "default_request")]
    pub request_secs: u64,

    /// Implicit wait for element lookups, in milliseconds
    #[serde(default = "default_element")]
    pub element_ms: u64,

    /// How long `open_tab` waits for the new tab to appear, in milliseconds
    #[serde(default = "default_tab")]
    pub tab_ms: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            request_secs: default_request(),
            element_ms: default_element(),
            tab_ms: default_tab(),
        }
    }
}

fn default_request() -> u64 {
    60
}
fn default_element() -> u64 {
    5_000
}
fn default_tab() -> u64 {
    10_000
}

/// Application under test
#[derive(Debug, Deserialize, Clone)]
pub struct ShopConfig {
    /// Root URL of the shop, available to scenarios as `${base_url}`
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

impl Default for ShopConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:8080".to_string()
}

impl Config {
    /// Load configuration from the default config file
    ///
    /// Returns default configuration if file doesn't exist
    pub fn load() -> Result<Self> {
        if let Some(path) = config_path() {
            if path.exists() {
                return Self::load_from(&path);
            }
        }
        Ok(Self::default())
    }

    /// Load configuration from an explicit path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::FileRead {
            path: path.display().to_string(),
            error: e.to_string(),
        })?;
        toml::from_str(&content).map_err(|e| Error::ConfigParse(e.to_string()))
    }
}
