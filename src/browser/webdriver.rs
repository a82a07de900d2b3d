//! W3C WebDriver client
//!
//! Minimal session client covering the commands the runner issues:
//! navigation, element lookup, clicks, typing and script execution.
//! Every command is a JSON exchange `{"value": ...}` over HTTP.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Method;
use serde_json::{json, Value};

use crate::common::config::{BrowserConfig, Config};
use crate::common::{Error, Result};

use super::{DriverFactory, ElementRef, UiDriver};

/// Outcome of a single WebDriver command
enum Reply {
    Value(Value),
    Failure { error: String, message: String },
}

/// An open WebDriver session
pub struct WebDriverSession {
    http: reqwest::Client,
    /// Endpoint root, e.g. `http://localhost:4444`
    endpoint: String,
    session_id: String,
    timeout: Duration,
}

impl WebDriverSession {
    /// Open a new browser session
    pub async fn start(endpoint: &str, browser: &BrowserConfig, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("Failed to build WebDriver client: {}", e)))?;
        let endpoint = endpoint.trim_end_matches('/').to_string();

        let url = format!("{}/session", endpoint);
        let response = http
            .post(&url)
            .json(&new_session_body(browser))
            .send()
            .await
            .map_err(|e| Error::transport(&url, e))?;
        let status = response.status();
        let body: Value = response.json().await.map_err(|e| Error::transport(&url, e))?;

        let value = body.get("value").cloned().unwrap_or(Value::Null);
        if !status.is_success() || value.get("error").is_some() {
            return Err(Error::webdriver("new session", failure_message(&value)));
        }

        let session_id = value
            .get("sessionId")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::webdriver("new session", "response has no sessionId"))?
            .to_string();

        tracing::info!(%endpoint, %session_id, browser = %browser.browser_name, "browser session opened");

        Ok(Self {
            http,
            endpoint,
            session_id,
            timeout,
        })
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    async fn raw_command(&self, method: Method, path: &str, body: Option<Value>) -> Result<Reply> {
        let url = format!("{}/session/{}{}", self.endpoint, self.session_id, path);
        tracing::trace!(%method, %url, "webdriver command");

        let mut request = self.http.request(method, &url);
        // POST commands need a JSON body even when they take no parameters
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                Error::Timeout(self.timeout.as_secs())
            } else {
                Error::transport(&url, e)
            }
        })?;
        let status = response.status();
        let body: Value = response.json().await.map_err(|e| Error::transport(&url, e))?;
        let value = body.get("value").cloned().unwrap_or(Value::Null);

        if let Some(error) = value.get("error").and_then(Value::as_str) {
            return Ok(Reply::Failure {
                error: error.to_string(),
                message: failure_message(&value),
            });
        }
        if !status.is_success() {
            return Ok(Reply::Failure {
                error: format!("http {}", status.as_u16()),
                message: failure_message(&value),
            });
        }
        Ok(Reply::Value(value))
    }

    async fn command(&self, name: &str, method: Method, path: &str, body: Option<Value>) -> Result<Value> {
        match self.raw_command(method, path, body).await? {
            Reply::Value(value) => Ok(value),
            Reply::Failure { error, message } => {
                Err(Error::webdriver(name, format!("{}: {}", error, message)))
            }
        }
    }

    fn locate_path(scope: Option<&ElementRef>) -> String {
        match scope {
            Some(el) => format!("/element/{}/element", el.0),
            None => "/element".to_string(),
        }
    }
}

#[async_trait]
impl UiDriver for WebDriverSession {
    async fn goto(&self, url: &str) -> Result<()> {
        tracing::debug!(%url, "navigate");
        self.command("navigate", Method::POST, "/url", Some(json!({ "url": url })))
            .await?;
        Ok(())
    }

    async fn current_url(&self) -> Result<String> {
        let value = self.command("get url", Method::GET, "/url", None).await?;
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| Error::webdriver("get url", "URL is not a string"))
    }

    async fn find(&self, scope: Option<&ElementRef>, selector: &str) -> Result<ElementRef> {
        let body = json!({ "using": "css selector", "value": selector });
        match self
            .raw_command(Method::POST, &Self::locate_path(scope), Some(body))
            .await?
        {
            Reply::Value(value) => ElementRef::from_json(&value)
                .ok_or_else(|| Error::webdriver("find element", "malformed element reference")),
            Reply::Failure { error, .. } if error == "no such element" => {
                Err(Error::ElementNotFound(selector.to_string()))
            }
            Reply::Failure { error, message } => {
                Err(Error::webdriver("find element", format!("{}: {}", error, message)))
            }
        }
    }

    async fn click(&self, element: &ElementRef) -> Result<()> {
        self.command(
            "click",
            Method::POST,
            &format!("/element/{}/click", element.0),
            Some(json!({})),
        )
        .await?;
        Ok(())
    }

    async fn send_keys(&self, element: &ElementRef, text: &str) -> Result<()> {
        self.command(
            "send keys",
            Method::POST,
            &format!("/element/{}/value", element.0),
            Some(json!({ "text": text })),
        )
        .await?;
        Ok(())
    }

    async fn clear(&self, element: &ElementRef) -> Result<()> {
        self.command(
            "clear",
            Method::POST,
            &format!("/element/{}/clear", element.0),
            Some(json!({})),
        )
        .await?;
        Ok(())
    }

    async fn text(&self, scope: Option<&ElementRef>) -> Result<String> {
        let (script, args) = match scope {
            Some(el) => ("return arguments[0].innerText || '';", vec![el.to_json()]),
            None => (
                "return document.body ? document.body.innerText : '';",
                Vec::new(),
            ),
        };
        let value = self.execute(script, args).await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn execute(&self, script: &str, args: Vec<Value>) -> Result<Value> {
        self.command(
            "execute script",
            Method::POST,
            "/execute/sync",
            Some(json!({ "script": script, "args": args })),
        )
        .await
    }

    async fn close(&self) -> Result<()> {
        self.command("delete session", Method::DELETE, "", None).await?;
        tracing::info!(session_id = %self.session_id, "browser session closed");
        Ok(())
    }
}

/// Capabilities payload for `POST /session`
fn new_session_body(browser: &BrowserConfig) -> Value {
    let name = browser.browser_name.to_lowercase();
    let mut always_match = json!({ "browserName": name });

    if browser.headless {
        match name.as_str() {
            "chrome" | "chromium" => {
                always_match["goog:chromeOptions"] =
                    json!({ "args": ["--headless=new", "--no-sandbox", "--disable-gpu"] });
            }
            "firefox" => {
                always_match["moz:firefoxOptions"] = json!({ "args": ["-headless"] });
            }
            "msedge" | "edge" => {
                always_match["ms:edgeOptions"] = json!({ "args": ["--headless=new"] });
            }
            _ => {}
        }
    }

    json!({ "capabilities": { "alwaysMatch": always_match } })
}

fn failure_message(value: &Value) -> String {
    value
        .get("message")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| value.to_string())
}

/// Opens [`WebDriverSession`]s against the configured endpoint
#[derive(Debug, Default, Clone, Copy)]
pub struct WebDriverFactory;

#[async_trait]
impl DriverFactory for WebDriverFactory {
    async fn connect(&self, config: &Config) -> Result<Box<dyn UiDriver>> {
        let session = WebDriverSession::start(
            &config.targets.webdriver_url,
            &config.browser,
            config.timeouts.request(),
        )
        .await?;
        Ok(Box::new(session))
    }
}
