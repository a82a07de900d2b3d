//! Configuration file handling
//!
//! Settings come from three layers, later ones winning: the TOML config
//! file, environment variables (`FRONTEND_URL`, `BACKEND_URL`,
//! `WEBDRIVER_URL`), and command-line flags applied by the caller.

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use super::paths::config_path;
use super::Result;

/// Environment variable overriding the frontend base URL
pub const FRONTEND_URL_ENV: &str = "FRONTEND_URL";
/// Environment variable overriding the backend base URL
pub const BACKEND_URL_ENV: &str = "BACKEND_URL";
/// Environment variable overriding the WebDriver endpoint
pub const WEBDRIVER_URL_ENV: &str = "WEBDRIVER_URL";

/// Main configuration structure
#[derive(Debug, Deserialize, Default, Clone)]
pub struct Config {
    /// Addresses of the system under test
    #[serde(default)]
    pub targets: Targets,

    /// Timeout settings
    #[serde(default)]
    pub timeouts: Timeouts,

    /// Browser settings
    #[serde(default)]
    pub browser: BrowserConfig,
}

/// Base addresses of the application under test
#[derive(Debug, Deserialize, Clone)]
pub struct Targets {
    /// Backend API base URL
    #[serde(default = "default_backend_url")]
    pub backend_url: String,

    /// Frontend base URL
    #[serde(default = "default_frontend_url")]
    pub frontend_url: String,

    /// W3C WebDriver endpoint (chromedriver, geckodriver, selenium)
    #[serde(default = "default_webdriver_url")]
    pub webdriver_url: String,
}

impl Default for Targets {
    fn default() -> Self {
        Self {
            backend_url: default_backend_url(),
            frontend_url: default_frontend_url(),
            webdriver_url: default_webdriver_url(),
        }
    }
}

fn default_backend_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_frontend_url() -> String {
    "http://localhost:5173".to_string()
}

fn default_webdriver_url() -> String {
    "http://localhost:4444".to_string()
}

/// Timeout settings
#[derive(Debug, Deserialize, Clone)]
pub struct Timeouts {
    /// Upper bound for a single HTTP exchange
    #[serde(default = "default_request")]
    pub request_secs: u64,

    /// Default bound for UI waits
    #[serde(default = "default_wait")]
    pub default_wait_ms: u64,

    /// Bound for navigation-dependent assertions
    #[serde(default = "default_extended_wait")]
    pub extended_wait_ms: u64,

    /// Delay between polls while waiting on UI state
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            request_secs: default_request(),
            default_wait_ms: default_wait(),
            extended_wait_ms: default_extended_wait(),
            poll_interval_ms: default_poll_interval(),
        }
    }
}

fn default_request() -> u64 {
    30
}
fn default_wait() -> u64 {
    4_000
}
fn default_extended_wait() -> u64 {
    10_000
}
fn default_poll_interval() -> u64 {
    100
}

impl Timeouts {
    pub fn request(&self) -> Duration {
        Duration::from_secs(self.request_secs)
    }

    pub fn default_wait(&self) -> Duration {
        Duration::from_millis(self.default_wait_ms)
    }

    pub fn extended_wait(&self) -> Duration {
        Duration::from_millis(self.extended_wait_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

/// Browser configuration
#[derive(Debug, Deserialize, Clone)]
pub struct BrowserConfig {
    /// Browser name requested from the WebDriver endpoint
    #[serde(default = "default_browser_name")]
    pub browser_name: String,

    /// Run the browser without a visible window
    #[serde(default = "default_headless")]
    pub headless: bool,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            browser_name: default_browser_name(),
            headless: default_headless(),
        }
    }
}

fn default_browser_name() -> String {
    "chrome".to_string()
}

fn default_headless() -> bool {
    true
}

impl Config {
    /// Load configuration from the default config file, then apply
    /// environment overrides
    ///
    /// Returns default configuration if file doesn't exist
    pub fn load() -> Result<Self> {
        let mut config = match config_path() {
            Some(path) if path.exists() => Self::from_file(&path)?,
            _ => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Load configuration from an explicit file, then apply environment
    /// overrides
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = Self::from_file(path)?;
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| super::Error::FileRead {
            path: path.display().to_string(),
            error: e.to_string(),
        })?;
        Self::parse(&content)
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| super::Error::ConfigParse(e.to_string()))
    }

    /// Apply environment overrides using the given lookup
    ///
    /// Empty values are ignored so that `FRONTEND_URL=` does not blank the URL.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = get(FRONTEND_URL_ENV) {
            self.targets.frontend_url = url;
        }
        if let Some(url) = get(BACKEND_URL_ENV) {
            self.targets.backend_url = url;
        }
        if let Some(url) = get(WEBDRIVER_URL_ENV) {
            self.targets.webdriver_url = url;
        }
    }
}
