//! Browser automation
//!
//! The runner talks to the browser through the [`UiDriver`] trait. The
//! production implementation is [`WebDriverSession`], which speaks the W3C
//! WebDriver protocol to chromedriver, geckodriver or a Selenium server.

pub mod network;
mod webdriver;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::common::config::Config;
use crate::common::Result;

pub use webdriver::{WebDriverFactory, WebDriverSession};

/// W3C identifier key for element references in JSON payloads
pub const ELEMENT_KEY: &str = "element-6066-11e4-a52f-4a0e4c75f4b5";

/// Handle to an element in the current page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementRef(pub String);

impl ElementRef {
    /// Encode as a script argument
    pub fn to_json(&self) -> Value {
        json!({ ELEMENT_KEY: self.0 })
    }

    /// Decode from a WebDriver element reference object
    pub fn from_json(value: &Value) -> Option<Self> {
        value
            .get(ELEMENT_KEY)
            .and_then(Value::as_str)
            .map(|id| Self(id.to_string()))
    }
}

/// Operations the runner needs from a browser
///
/// Lookups are single attempts; retrying until an element appears is the
/// caller's job.
#[async_trait]
pub trait UiDriver: Send + Sync {
    /// Navigate to an absolute URL
    async fn goto(&self, url: &str) -> Result<()>;

    /// Current page URL
    async fn current_url(&self) -> Result<String>;

    /// First element matching a CSS selector, optionally inside `scope`
    ///
    /// Returns `Error::ElementNotFound` when nothing matches.
    async fn find(&self, scope: Option<&ElementRef>, selector: &str) -> Result<ElementRef>;

    async fn click(&self, element: &ElementRef) -> Result<()>;

    /// Type text into an element
    async fn send_keys(&self, element: &ElementRef, text: &str) -> Result<()>;

    async fn clear(&self, element: &ElementRef) -> Result<()>;

    /// Rendered text of the page, or of `scope` when given
    async fn text(&self, scope: Option<&ElementRef>) -> Result<String>;

    /// Run a synchronous script in the page and return its result
    async fn execute(&self, script: &str, args: Vec<Value>) -> Result<Value>;

    /// End the browser session
    async fn close(&self) -> Result<()>;
}

/// Opens browser sessions on demand
///
/// Suites that never touch the UI never open a browser.
#[async_trait]
pub trait DriverFactory: Send + Sync {
    async fn connect(&self, config: &Config) -> Result<Box<dyn UiDriver>>;
}

/// Expand the test-id shorthand used in suite files
///
/// `@login-email` becomes `[data-cy='login-email']`; a trailing `*`
/// (`@todo-card-*`) turns it into a prefix match. Anything else is
/// returned unchanged as a CSS selector.
pub fn expand_selector(selector: &str) -> String {
    match selector.strip_prefix('@') {
        Some(id) => match id.strip_suffix('*') {
            Some(prefix) => format!("[data-cy^='{}']", prefix),
            None => format!("[data-cy='{}']", id),
        },
        None => selector.to_string(),
    }
}
