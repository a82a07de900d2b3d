//! Error types for the e2e runner
//!
//! Errors fall into two families that the runner reports differently:
//! assertion failures (the system under test behaved unexpectedly) and
//! infrastructure errors (transport, timeouts, configuration).

use std::io;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the e2e runner
#[derive(Error, Debug)]
pub enum Error {
    // === Transport Errors ===
    #[error("Request to {url} failed: {message}")]
    Transport { url: String, message: String },

    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    #[error("Timed out after {waited_ms}ms waiting for {what}")]
    WaitTimeout { what: String, waited_ms: u64 },

    // === Browser Errors ===
    #[error("WebDriver command '{command}' failed: {message}")]
    WebDriver { command: String, message: String },

    #[error("No element matches selector '{0}'")]
    ElementNotFound(String),

    // === Scenario Errors ===
    #[error("Assertion failed: {0}")]
    TestAssertion(String),

    #[error("Variable '{0}' is not set. An earlier scenario was expected to provide it")]
    MissingVariable(String),

    #[error("Unknown request alias '{0}'. Register it with an 'intercept' step first")]
    UnknownAlias(String),

    #[error("Unknown built-in suite '{name}'. Available: {available}")]
    UnknownSuite { name: String, available: String },

    #[error("Failed to parse suite '{name}': {message}")]
    SuiteParse { name: String, message: String },

    // === Configuration Errors ===
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration file: {0}")]
    ConfigParse(String),

    // === IO Errors ===
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to read file '{path}': {error}")]
    FileRead { path: String, error: String },

    // === Serialization Errors ===
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Internal Errors ===
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a transport error for a request URL
    pub fn transport(url: &str, message: impl ToString) -> Self {
        Self::Transport {
            url: url.to_string(),
            message: message.to_string(),
        }
    }

    /// Create a WebDriver command failure
    pub fn webdriver(command: &str, message: impl ToString) -> Self {
        Self::WebDriver {
            command: command.to_string(),
            message: message.to_string(),
        }
    }

    /// Create a bounded-wait timeout error
    pub fn wait_timeout(what: impl Into<String>, waited_ms: u64) -> Self {
        Self::WaitTimeout {
            what: what.into(),
            waited_ms,
        }
    }

    /// Whether this error means the system under test misbehaved, as opposed
    /// to the runner failing to talk to it.
    ///
    /// Wait timeouts on UI state count as assertion failures: the page never
    /// reached the expected state. Timeouts of the transport itself do not.
    pub fn is_assertion(&self) -> bool {
        matches!(
            self,
            Error::TestAssertion(_) | Error::WaitTimeout { .. } | Error::ElementNotFound(_)
        )
    }

    /// Whether the error comes from the network layer
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Transport { .. } | Error::Timeout(_))
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        let url = e
            .url()
            .map(|u| u.to_string())
            .unwrap_or_else(|| "<unknown>".to_string());
        Error::Transport {
            url,
            message: e.to_string(),
        }
    }
}
