//! Suite file format
//!
//! Defines the data structures for deserializing YAML suites.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::common::{Error, Result};

/// An ordered group of scenarios sharing state
#[derive(Deserialize, Debug, Clone)]
pub struct Suite {
    /// Name of the suite
    pub name: String,
    /// Optional description of what the suite covers
    pub description: Option<String>,
    /// Initial suite variables in declaration order; values may reference
    /// built-ins like `${rand}` and variables declared above them
    #[serde(default, deserialize_with = "ordered_vars")]
    pub vars: Vec<(String, String)>,
    /// Steps run once before the first scenario
    #[serde(default)]
    pub before: Vec<Step>,
    /// Steps run before every scenario
    #[serde(default)]
    pub before_each: Vec<Step>,
    /// Scenarios, executed in declaration order
    pub scenarios: Vec<Scenario>,
}

impl Suite {
    /// Parse a suite from YAML text
    pub fn parse(name: &str, content: &str) -> Result<Self> {
        serde_yaml::from_str(content).map_err(|e| Error::SuiteParse {
            name: name.to_string(),
            message: e.to_string(),
        })
    }
}

/// Read a YAML mapping of scalars, keeping declaration order
fn ordered_vars<'de, D>(deserializer: D) -> std::result::Result<Vec<(String, String)>, D::Error>
where
    D: Deserializer<'de>,
{
    let mapping = serde_yaml::Mapping::deserialize(deserializer)?;
    mapping
        .into_iter()
        .map(|(key, value)| {
            let name = scalar(key)
                .ok_or_else(|| D::Error::custom("variable names must be scalars"))?;
            let value = scalar(value).ok_or_else(|| {
                D::Error::custom(format!("variable '{}' must be a scalar", name))
            })?;
            Ok::<_, D::Error>((name, value))
        })
        .collect()
}

fn scalar(value: serde_yaml::Value) -> Option<String> {
    match value {
        serde_yaml::Value::String(s) => Some(s),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        serde_yaml::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// One named test case
#[derive(Deserialize, Debug, Clone)]
pub struct Scenario {
    pub name: String,
    pub description: Option<String>,
    pub steps: Vec<Step>,
}

/// A single step in a scenario
#[derive(Deserialize, Debug, Clone)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Step {
    /// Call the backend directly
    Request {
        /// HTTP method (GET, POST, PUT, DELETE)
        method: String,
        /// Path relative to the backend base URL
        path: String,
        /// Attach the stored bearer token
        #[serde(default)]
        auth: bool,
        /// JSON body
        body: Option<Value>,
        /// Extra request headers
        #[serde(default)]
        headers: BTreeMap<String, String>,
        /// Expected response
        expect: Option<ResponseExpectation>,
        /// Variables to set from the response: variable name -> field
        #[serde(default)]
        capture: BTreeMap<String, String>,
    },
    /// Log in through the backend and store the issued token
    Login {
        email: String,
        password: String,
        /// Display name the backend must report
        expect_name: Option<String>,
    },
    /// Navigate the browser to a frontend path
    Visit { path: String },
    /// Start recording requests matching a pattern under an alias
    Intercept {
        method: String,
        /// URL path glob, e.g. `/api/todos/*`
        path: String,
        alias: String,
    },
    /// Type into an input
    Type {
        selector: String,
        text: String,
        /// Clear the input first
        #[serde(default)]
        clear: bool,
    },
    /// Clear an input
    Clear { selector: String },
    /// Click an element
    Click { selector: String },
    /// Run nested steps scoped to the first element matching `selector`
    Within { selector: String, steps: Vec<Step> },
    /// Wait for the next request recorded under an alias
    WaitRequest {
        alias: String,
        /// Expected response status
        status: Option<u16>,
        timeout_ms: Option<u64>,
    },
    /// Assert that no request was recorded under an alias
    ExpectNoRequest { alias: String },
    /// Wait until the browser URL matches
    ExpectUrl {
        contains: Option<String>,
        equals: Option<String>,
        timeout_ms: Option<u64>,
    },
    /// Wait until text is present (or absent) in the page
    ExpectText {
        text: String,
        #[serde(default = "default_true")]
        exists: bool,
        timeout_ms: Option<u64>,
    },
    /// Set a suite variable
    SetVar { name: String, value: String },
}

fn default_true() -> bool {
    true
}

impl Step {
    /// Whether the step needs a browser session
    pub fn is_ui(&self) -> bool {
        !matches!(
            self,
            Step::Request { .. } | Step::Login { .. } | Step::SetVar { .. }
        )
    }

    /// Short human-readable description for progress output
    pub fn describe(&self) -> String {
        match self {
            Step::Request { method, path, .. } => format!("{} {}", method.to_uppercase(), path),
            Step::Login { email, .. } => format!("login as {}", email),
            Step::Visit { path } => format!("visit {}", path),
            Step::Intercept { method, path, alias } => {
                format!("intercept {} {} as @{}", method.to_uppercase(), path, alias)
            }
            Step::Type { selector, text, .. } => format!("type '{}' into {}", text, selector),
            Step::Clear { selector } => format!("clear {}", selector),
            Step::Click { selector } => format!("click {}", selector),
            Step::Within { selector, steps } => {
                format!("within {} ({} steps)", selector, steps.len())
            }
            Step::WaitRequest { alias, status, .. } => match status {
                Some(s) => format!("wait @{} -> {}", alias, s),
                None => format!("wait @{}", alias),
            },
            Step::ExpectNoRequest { alias } => format!("no request @{}", alias),
            Step::ExpectUrl {
                contains, equals, ..
            } => match (contains, equals) {
                (_, Some(eq)) => format!("url == {}", eq),
                (Some(c), None) => format!("url contains {}", c),
                (None, None) => "url".to_string(),
            },
            Step::ExpectText { text, exists, .. } => {
                if *exists {
                    format!("text '{}' exists", text)
                } else {
                    format!("text '{}' absent", text)
                }
            }
            Step::SetVar { name, value } => format!("set {} = {}", name, value),
        }
    }
}

/// Expectations for a backend response
#[derive(Deserialize, Debug, Clone, Default)]
pub struct ResponseExpectation {
    /// Expected status code
    pub status: Option<u16>,
    /// Field (key or JSON pointer) -> expected value
    #[serde(default)]
    pub fields: BTreeMap<String, Value>,
    /// Fields that must be present
    #[serde(default)]
    pub has: Vec<String>,
    /// Fields that must hold a non-empty string
    #[serde(default)]
    pub non_empty_string: Vec<String>,
    /// Body must (or must not) be an array
    pub is_array: Option<bool>,
    /// Variable holding the expected array length
    pub length_var: Option<String>,
    /// Variable to store the array length into
    pub store_length: Option<String>,
}
