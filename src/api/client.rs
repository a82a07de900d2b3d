//! HTTP client for the todo backend
//!
//! Every call resolves to an [`ApiResponse`] whatever the status code, so
//! scenarios can assert on 401 and 500 answers. Only failures to complete
//! the exchange (connection refused, timeout) become errors.

use std::time::Duration;

use reqwest::{header, Method};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::common::{join_url, Error, Result};

use super::types::{AuthToken, LoginRequest, NewTodo, RegisterRequest, TodoPatch};

/// Status and decoded body of a completed exchange
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: u16,
    /// JSON body, or a string value when the body was not JSON, or null
    /// when it was empty
    pub body: Value,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Decode the body into a typed record
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(self.body.clone()).map_err(|e| {
            Error::TestAssertion(format!(
                "Response body (status {}) has unexpected shape: {}",
                self.status, e
            ))
        })
    }

    /// Look up a field by JSON pointer (`/id`) or top-level key (`id`)
    pub fn field(&self, key: &str) -> Option<&Value> {
        lookup(&self.body, key)
    }
}

/// Resolve `key` against a JSON value, as a pointer when it starts with `/`
pub fn lookup<'a>(value: &'a Value, key: &str) -> Option<&'a Value> {
    if key.starts_with('/') {
        value.pointer(key)
    } else {
        value.get(key)
    }
}

/// Client for the backend routes under test
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl ApiClient {
    /// Create a client for the given backend base URL
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("todo-e2e/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: base_url.into(),
            timeout,
        })
    }

    /// Send a request and capture the response regardless of status
    pub async fn send<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        token: Option<&AuthToken>,
        body: Option<&B>,
        headers: &[(String, String)],
    ) -> Result<ApiResponse> {
        let url = join_url(&self.base_url, path);
        tracing::debug!(%method, %url, authenticated = token.is_some(), "backend request");

        let mut request = self.http.request(method.clone(), &url);
        if let Some(token) = token {
            request = request.header(header::AUTHORIZATION, token.bearer());
        }
        for (name, value) in headers {
            request = request.header(name.as_str(), value.as_str());
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|e| self.transport_error(&url, e))?;
        let status = response.status().as_u16();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| self.transport_error(&url, e))?;

        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };

        tracing::debug!(%method, %url, status, "backend response");
        Ok(ApiResponse { status, body })
    }

    fn transport_error(&self, url: &str, e: reqwest::Error) -> Error {
        if e.is_timeout() {
            Error::Timeout(self.timeout.as_secs())
        } else {
            Error::transport(url, e)
        }
    }

    /// `POST /auth/register`
    pub async fn register(&self, request: &RegisterRequest) -> Result<ApiResponse> {
        self.send(Method::POST, "/auth/register", None, Some(request), &[])
            .await
    }

    /// `POST /auth/login`
    pub async fn login(&self, request: &LoginRequest) -> Result<ApiResponse> {
        self.send(Method::POST, "/auth/login", None, Some(request), &[])
            .await
    }

    /// `GET /users`
    pub async fn list_users(&self) -> Result<ApiResponse> {
        self.send::<Value>(Method::GET, "/users", None, None, &[])
            .await
    }

    /// `GET /todos`
    pub async fn list_todos(&self, token: Option<&AuthToken>) -> Result<ApiResponse> {
        self.send::<Value>(Method::GET, "/todos", token, None, &[])
            .await
    }

    /// `POST /todos`
    pub async fn create_todo(
        &self,
        token: Option<&AuthToken>,
        todo: &NewTodo,
    ) -> Result<ApiResponse> {
        self.send(Method::POST, "/todos", token, Some(todo), &[])
            .await
    }

    /// `PUT /todos/{id}`
    pub async fn update_todo(
        &self,
        token: Option<&AuthToken>,
        id: &str,
        patch: &TodoPatch,
    ) -> Result<ApiResponse> {
        self.send(Method::PUT, &format!("/todos/{}", id), token, Some(patch), &[])
            .await
    }

    /// `DELETE /todos/{id}`
    pub async fn delete_todo(&self, token: Option<&AuthToken>, id: &str) -> Result<ApiResponse> {
        self.send::<Value>(Method::DELETE, &format!("/todos/{}", id), token, None, &[])
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_field_lookup() {
        let response = ApiResponse {
            status: 201,
            body: json!({ "id": "t1", "owner": { "id": "u1" } }),
        };
        assert_eq!(response.field("id"), Some(&json!("t1")));
        assert_eq!(response.field("/owner/id"), Some(&json!("u1")));
        assert_eq!(response.field("missing"), None);
        assert!(response.is_success());
    }

    #[test]
    fn test_json_shape_mismatch_is_assertion() {
        let response = ApiResponse {
            status: 200,
            body: json!("not an object"),
        };
        let err = response.json::<super::super::types::TodoItem>().unwrap_err();
        assert!(err.is_assertion());
    }

    #[tokio::test]
    async fn test_connection_refused_is_transport_error() {
        // Port 9 (discard) is essentially never listening on loopback
        let client = ApiClient::new("http://127.0.0.1:9", Duration::from_secs(2)).unwrap();
        let err = client.list_users().await.unwrap_err();
        assert!(err.is_transport(), "unexpected error: {err}");
    }
}
