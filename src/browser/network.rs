//! In-page network recorder
//!
//! WebDriver has no request interception, so the page's `fetch` and
//! `XMLHttpRequest` are wrapped by an injected script that appends every
//! request to `window.__todoE2eNetwork` as it is sent, and fills in its
//! status once the response arrives. The recorder lives in the page: a
//! full navigation drops it and it must be installed again.

use reqwest::Url;
use serde::Deserialize;
use serde_json::Value;

use crate::common::{Error, Result};

use super::UiDriver;

/// Installs the recorder; does nothing if it is already present
const INSTALL_SCRIPT: &str = r#"
return (function () {
  if (window.__todoE2eNetwork) { return false; }
  var log = [];
  window.__todoE2eNetwork = log;
  var absolute = function (url) {
    try { return new URL(url, window.location.href).href; } catch (e) { return String(url); }
  };
  var sent = function (method, url) {
    var entry = { method: String(method).toUpperCase(), url: absolute(url), status: null };
    log.push(entry);
    return entry;
  };
  if (window.fetch) {
    var originalFetch = window.fetch;
    window.fetch = function (input, init) {
      var method = (init && init.method) || (input && input.method) || 'GET';
      var url = typeof input === 'string' ? input : (input && input.url) || String(input);
      var entry = sent(method, url);
      return originalFetch.apply(this, arguments).then(function (res) {
        entry.status = res.status;
        return res;
      }, function (err) {
        entry.status = 0;
        throw err;
      });
    };
  }
  var open = XMLHttpRequest.prototype.open;
  var send = XMLHttpRequest.prototype.send;
  XMLHttpRequest.prototype.open = function (method, url) {
    this.__todoE2e = { method: method, url: url };
    return open.apply(this, arguments);
  };
  XMLHttpRequest.prototype.send = function () {
    var xhr = this;
    if (xhr.__todoE2e) {
      var entry = sent(xhr.__todoE2e.method, xhr.__todoE2e.url);
      xhr.addEventListener('loadend', function () { entry.status = xhr.status; });
    }
    return send.apply(this, arguments);
  };
  return true;
})();
"#;

const READ_SCRIPT: &str = "return window.__todoE2eNetwork || null;";

/// Base for resolving relative URLs; only the path is kept
const RELATIVE_BASE: &str = "http://relative.invalid/";

/// One request observed in the page
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct NetworkEntry {
    pub method: String,
    pub url: String,
    /// HTTP status; `None` while the response is pending, 0 when the
    /// request failed at the network level
    pub status: Option<u16>,
}

impl NetworkEntry {
    pub fn is_pending(&self) -> bool {
        self.status.is_none()
    }
}

/// Request pattern bound to an alias by an `intercept` step
#[derive(Debug, Clone)]
pub struct RequestPattern {
    pub method: String,
    /// URL path glob, `*` matching within one path segment
    pub path: String,
}

impl RequestPattern {
    pub fn new(method: &str, path: &str) -> Self {
        Self {
            method: method.to_uppercase(),
            path: path.to_string(),
        }
    }

    pub fn matches(&self, entry: &NetworkEntry) -> bool {
        entry.method.eq_ignore_ascii_case(&self.method)
            && glob_match(&self.path, &url_path(&entry.url))
    }
}

/// Install the recorder in the current page
///
/// Returns `true` when it was newly installed.
pub async fn install(driver: &dyn UiDriver) -> Result<bool> {
    let value = driver.execute(INSTALL_SCRIPT, Vec::new()).await?;
    Ok(value.as_bool().unwrap_or(false))
}

/// Read every request recorded since installation, pending ones included
///
/// Fails if the recorder is missing, which happens after a full page load.
pub async fn entries(driver: &dyn UiDriver) -> Result<Vec<NetworkEntry>> {
    let value = driver.execute(READ_SCRIPT, Vec::new()).await?;
    if value.is_null() {
        return Err(Error::Internal(
            "Network recorder is not installed in the current page".to_string(),
        ));
    }
    parse_entries(value)
}

fn parse_entries(value: Value) -> Result<Vec<NetworkEntry>> {
    serde_json::from_value(value)
        .map_err(|e| Error::Internal(format!("Malformed network log: {}", e)))
}

/// Path component of an absolute or relative URL, without query or fragment
pub fn url_path(url: &str) -> String {
    let parsed = Url::parse(url)
        .or_else(|_| Url::parse(RELATIVE_BASE).and_then(|base| base.join(url)));
    match parsed {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => url.to_string(),
    }
}

/// Match a path against a glob where `*` matches any run of characters
/// other than `/` and `**` also crosses segments
pub fn glob_match(pattern: &str, path: &str) -> bool {
    fn go(p: &[u8], s: &[u8]) -> bool {
        match p.first() {
            None => s.is_empty(),
            Some(b'*') => {
                let crosses = p.get(1) == Some(&b'*');
                let rest = if crosses { &p[2..] } else { &p[1..] };
                let mut i = 0;
                loop {
                    if go(rest, &s[i..]) {
                        return true;
                    }
                    if i == s.len() || (!crosses && s[i] == b'/') {
                        return false;
                    }
                    i += 1;
                }
            }
            Some(&c) => s.first() == Some(&c) && go(&p[1..], &s[1..]),
        }
    }
    go(pattern.as_bytes(), path.as_bytes())
}
