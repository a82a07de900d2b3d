//! Record shapes exchanged with the backend
//!
//! These mirror the JSON the todo backend sends and accepts. Only the fields
//! the suites observe are modeled; unknown fields are ignored.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Body of `POST /auth/register`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    /// Display name
    pub name: String,
}

/// Body of `POST /auth/login`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Successful login response
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoginResponse {
    pub access_token: AuthToken,
    pub name: String,
}

/// Opaque bearer credential issued at login
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuthToken(String);

impl AuthToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Value for the `Authorization` header
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.0)
    }
}

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AuthToken(<redacted>)")
    }
}

/// Body of `POST /todos`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewTodo {
    pub title: String,
    pub note: String,
    /// ISO-8601 timestamp
    pub timestamp: String,
    /// CSS color, e.g. `#ff0000`
    pub color: String,
}

/// Body of `PUT /todos/{id}`; absent fields are left unchanged by the backend
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TodoPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// A todo as returned by the backend
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TodoItem {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub note: String,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    /// Owner identifier
    #[serde(rename = "userId")]
    pub user_id: String,
}

impl TodoItem {
    /// An authenticated caller must always see a non-empty owner
    pub fn has_owner(&self) -> bool {
        !self.user_id.trim().is_empty()
    }
}
