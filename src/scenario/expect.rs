//! Response assertions for backend steps

use serde_json::Value;

use crate::api::{lookup, ApiResponse};
use crate::common::{Error, Result};

use super::config::ResponseExpectation;
use super::context::SuiteContext;

/// Check a response against its expectation, recording `store_length`
pub fn check_response(
    response: &ApiResponse,
    expect: &ResponseExpectation,
    ctx: &mut SuiteContext,
) -> Result<()> {
    if let Some(expected) = expect.status {
        if response.status != expected {
            return Err(Error::TestAssertion(format!(
                "Expected status {}, got {}. Body: {}",
                expected,
                response.status,
                truncate(&response.body.to_string(), 200)
            )));
        }
    }

    for key in &expect.has {
        if response.field(key).is_none() {
            return Err(Error::TestAssertion(format!(
                "Expected response to have property '{}'. Body: {}",
                key,
                truncate(&response.body.to_string(), 200)
            )));
        }
    }

    for (key, expected) in &expect.fields {
        let expected = ctx.interpolate_value(expected)?;
        match response.field(key) {
            Some(actual) if *actual == expected => {}
            Some(actual) => {
                return Err(Error::TestAssertion(format!(
                    "Property '{}': expected {}, got {}",
                    key, expected, actual
                )));
            }
            None => {
                return Err(Error::TestAssertion(format!(
                    "Expected response to have property '{}' = {}",
                    key, expected
                )));
            }
        }
    }

    for key in &expect.non_empty_string {
        match response.field(key) {
            Some(Value::String(s)) if !s.trim().is_empty() => {}
            other => {
                return Err(Error::TestAssertion(format!(
                    "Property '{}': expected a non-empty string, got {}",
                    key,
                    other.map(Value::to_string).unwrap_or_else(|| "nothing".into())
                )));
            }
        }
    }

    if let Some(want_array) = expect.is_array {
        if response.body.is_array() != want_array {
            return Err(Error::TestAssertion(format!(
                "Expected body {}to be an array, got {}",
                if want_array { "" } else { "not " },
                json_kind(&response.body)
            )));
        }
    }

    if expect.length_var.is_some() || expect.store_length.is_some() {
        let length = response.body.as_array().map(Vec::len).ok_or_else(|| {
            Error::TestAssertion(format!(
                "Expected an array body to measure its length, got {}",
                json_kind(&response.body)
            ))
        })?;

        if let Some(var) = &expect.length_var {
            let expected = ctx.require(var)?.as_u64().ok_or_else(|| {
                Error::Config(format!("Variable '{}' does not hold a length", var))
            })?;
            if length as u64 != expected {
                return Err(Error::TestAssertion(format!(
                    "Expected {} items, got {}",
                    expected, length
                )));
            }
        }

        if let Some(var) = &expect.store_length {
            ctx.set(var.clone(), Value::from(length));
        }
    }

    Ok(())
}

/// Copy response fields into suite variables
pub fn capture(
    response: &ApiResponse,
    captures: &std::collections::BTreeMap<String, String>,
    ctx: &mut SuiteContext,
) -> Result<()> {
    for (var, key) in captures {
        let value = lookup(&response.body, key).ok_or_else(|| {
            Error::TestAssertion(format!(
                "Cannot capture '{}': response has no property '{}'",
                var, key
            ))
        })?;
        tracing::debug!(variable = %var, field = %key, "captured");
        ctx.set(var.clone(), value.clone());
    }
    Ok(())
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() > max {
        format!("{}...", s.chars().take(max).collect::<String>())
    } else {
        s.to_string()
    }
}
