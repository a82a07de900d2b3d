//! Shared suite state
//!
//! A [`SuiteContext`] is created per suite run and passed to every scenario.
//! Earlier scenarios write into it (auth token, created ids) and later ones
//! read from it through `${name}` placeholders.

use std::collections::HashMap;

use chrono::{SecondsFormat, Utc};
use serde_json::Value;

use crate::api::AuthToken;
use crate::common::config::Config;
use crate::common::{Error, Result};

/// Variable holding the bearer token
pub const TOKEN_VAR: &str = "token";

/// Per-run random suffix, six lowercase alphanumerics
pub const RAND_VAR: &str = "rand";

/// Run start time, ISO-8601 UTC with milliseconds
pub const NOW_VAR: &str = "now";

/// Mutable state shared by the scenarios of one suite
#[derive(Debug, Clone, Default)]
pub struct SuiteContext {
    vars: HashMap<String, Value>,
}

impl SuiteContext {
    /// Create a context seeded with built-in variables
    ///
    /// Built-ins: `rand`, `now`, `frontend_url`, `backend_url`.
    pub fn new(config: &Config) -> Self {
        let mut ctx = Self::default();
        ctx.set(RAND_VAR, Value::String(random_suffix()));
        ctx.set(
            NOW_VAR,
            Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)),
        );
        ctx.set(
            "frontend_url",
            Value::String(config.targets.frontend_url.trim_end_matches('/').to_string()),
        );
        ctx.set(
            "backend_url",
            Value::String(config.targets.backend_url.trim_end_matches('/').to_string()),
        );
        ctx
    }

    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        self.vars.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.vars.get(name)
    }

    /// Variable value, failing if an earlier scenario never set it
    pub fn require(&self, name: &str) -> Result<&Value> {
        self.vars
            .get(name)
            .ok_or_else(|| Error::MissingVariable(name.to_string()))
    }

    pub fn set_token(&mut self, token: &AuthToken) {
        self.set(TOKEN_VAR, Value::String(token.as_str().to_string()));
    }

    /// The stored bearer token
    pub fn token(&self) -> Result<AuthToken> {
        match self.require(TOKEN_VAR)? {
            Value::String(s) if !s.is_empty() => Ok(AuthToken::new(s.clone())),
            _ => Err(Error::MissingVariable(TOKEN_VAR.to_string())),
        }
    }

    /// Replace `${name}` placeholders in a string
    ///
    /// An unterminated `${` is kept literally.
    pub fn interpolate(&self, input: &str) -> Result<String> {
        let mut out = String::with_capacity(input.len());
        let mut rest = input;

        while let Some(start) = rest.find("${") {
            let after = &rest[start + 2..];
            let Some(end) = after.find('}') else {
                break;
            };
            out.push_str(&rest[..start]);
            let name = after[..end].trim();
            out.push_str(&render(self.require(name)?));
            rest = &after[end + 1..];
        }

        out.push_str(rest);
        Ok(out)
    }

    /// Interpolate every string inside a JSON value
    ///
    /// A string that is exactly one placeholder is replaced by the variable's
    /// JSON value, keeping numbers and arrays typed.
    pub fn interpolate_value(&self, value: &Value) -> Result<Value> {
        Ok(match value {
            Value::String(s) => match single_placeholder(s) {
                Some(name) => self.require(name)?.clone(),
                None => Value::String(self.interpolate(s)?),
            },
            Value::Array(items) => Value::Array(
                items
                    .iter()
                    .map(|v| self.interpolate_value(v))
                    .collect::<Result<_>>()?,
            ),
            Value::Object(map) => {
                let mut out = serde_json::Map::with_capacity(map.len());
                for (k, v) in map {
                    out.insert(k.clone(), self.interpolate_value(v)?);
                }
                Value::Object(out)
            }
            other => other.clone(),
        })
    }
}

fn single_placeholder(s: &str) -> Option<&str> {
    let name = s.strip_prefix("${")?.strip_suffix('}')?;
    if name.contains("${") || name.contains('}') {
        None
    } else {
        Some(name.trim())
    }
}

fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn random_suffix() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..6].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctx() -> SuiteContext {
        let mut ctx = SuiteContext::new(&Config::default());
        ctx.set("todo_id", json!("t-42"));
        ctx.set("count", json!(3));
        ctx
    }

    #[test]
    fn test_builtins() {
        let ctx = ctx();
        let rand = ctx.get(RAND_VAR).unwrap().as_str().unwrap();
        assert_eq!(rand.len(), 6);
        assert!(rand.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_eq!(ctx.get("frontend_url").unwrap(), "http://localhost:5173");
    }

    #[test]
    fn test_now_is_iso_timestamp() {
        let ctx = ctx();
        let now = ctx.get(NOW_VAR).unwrap().as_str().unwrap();
        assert!(chrono::DateTime::parse_from_rfc3339(now).is_ok(), "{now}");
        assert!(now.ends_with('Z'));
        assert_eq!(now.len(), "2024-01-01T00:00:00.000Z".len());
    }

    #[test]
    fn test_interpolate() {
        let ctx = ctx();
        assert_eq!(ctx.interpolate("/todos/${todo_id}").unwrap(), "/todos/t-42");
        assert_eq!(ctx.interpolate("n=${ count }").unwrap(), "n=3");
        assert_eq!(ctx.interpolate("cost ${").unwrap(), "cost ${");
        assert_eq!(ctx.interpolate("plain").unwrap(), "plain");
    }

    #[test]
    fn test_missing_variable() {
        let err = ctx().interpolate("/todos/${nope}").unwrap_err();
        assert!(matches!(err, Error::MissingVariable(ref n) if n == "nope"));
        assert!(!err.is_assertion());
    }

    #[test]
    fn test_interpolate_value_keeps_types() {
        let ctx = ctx();
        let value = ctx
            .interpolate_value(&json!({
                "id": "${todo_id}",
                "n": "${count}",
                "label": "item ${count}",
                "list": ["${todo_id}", 1]
            }))
            .unwrap();
        assert_eq!(
            value,
            json!({ "id": "t-42", "n": 3, "label": "item 3", "list": ["t-42", 1] })
        );
    }

    #[test]
    fn test_token_roundtrip_and_absence() {
        let mut ctx = ctx();
        assert!(matches!(ctx.token(), Err(Error::MissingVariable(_))));
        ctx.set_token(&AuthToken::new("abc"));
        assert_eq!(ctx.token().unwrap().as_str(), "abc");
    }

    #[test]
    fn test_rand_differs_between_runs() {
        let a = SuiteContext::new(&Config::default());
        let b = SuiteContext::new(&Config::default());
        assert_ne!(a.get(RAND_VAR), b.get(RAND_VAR));
    }
}
