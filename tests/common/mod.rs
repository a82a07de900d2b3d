//! Shared test support: an in-process todo backend
//!
//! Mirrors the observable contract of the real backend, including its use
//! of 500 for duplicate registration and unknown todo ids.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde_json::{json, Value};

use todo_e2e::common::config::Config;

#[derive(Clone)]
struct User {
    id: String,
    email: String,
    password: String,
    name: String,
}

#[derive(Default)]
pub struct Backend {
    users: Vec<User>,
    /// token -> user id
    tokens: HashMap<String, String>,
    todos: Vec<Value>,
    next_id: u64,
}

impl Backend {
    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}-{}", prefix, self.next_id)
    }

    fn caller(&self, headers: &HeaderMap) -> Option<String> {
        let header = headers.get("authorization")?.to_str().ok()?;
        let token = header.strip_prefix("Bearer ")?;
        self.tokens.get(token).cloned()
    }
}

pub type Shared = Arc<Mutex<Backend>>;

type Reply = (StatusCode, Json<Value>);

fn unauthorized() -> Reply {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({ "statusCode": 401, "message": "Unauthorized" })),
    )
}

fn server_error(message: &str) -> Reply {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "statusCode": 500, "message": message })),
    )
}

async fn register(State(state): State<Shared>, Json(body): Json<Value>) -> Reply {
    let mut backend = state.lock().unwrap();
    let email = body["email"].as_str().unwrap_or_default().to_string();
    if backend.users.iter().any(|u| u.email == email) {
        return server_error("Internal server error");
    }
    let user = User {
        id: backend.next_id("user"),
        email,
        password: body["password"].as_str().unwrap_or_default().to_string(),
        name: body["name"].as_str().unwrap_or_default().to_string(),
    };
    let reply = json!({ "id": user.id, "email": user.email, "name": user.name });
    backend.users.push(user);
    (StatusCode::CREATED, Json(reply))
}

async fn login(State(state): State<Shared>, Json(body): Json<Value>) -> Reply {
    let mut backend = state.lock().unwrap();
    let user = backend
        .users
        .iter()
        .find(|u| u.email == body["email"] && u.password == body["password"])
        .cloned();
    match user {
        Some(user) => {
            let token = backend.next_id("token");
            backend.tokens.insert(token.clone(), user.id);
            (
                StatusCode::CREATED,
                Json(json!({ "access_token": token, "name": user.name })),
            )
        }
        None => unauthorized(),
    }
}

async fn list_users(State(state): State<Shared>) -> Reply {
    let backend = state.lock().unwrap();
    let users: Vec<Value> = backend
        .users
        .iter()
        .map(|u| json!({ "id": u.id, "email": u.email, "name": u.name }))
        .collect();
    (StatusCode::OK, Json(Value::Array(users)))
}

async fn list_todos(State(state): State<Shared>, headers: HeaderMap) -> Reply {
    let backend = state.lock().unwrap();
    let Some(user_id) = backend.caller(&headers) else {
        return unauthorized();
    };
    let todos: Vec<Value> = backend
        .todos
        .iter()
        .filter(|t| t["userId"] == user_id.as_str())
        .cloned()
        .collect();
    (StatusCode::OK, Json(Value::Array(todos)))
}

async fn create_todo(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Reply {
    let mut backend = state.lock().unwrap();
    let Some(user_id) = backend.caller(&headers) else {
        return unauthorized();
    };
    let todo = json!({
        "id": backend.next_id("todo"),
        "title": body["title"],
        "note": body["note"],
        "timestamp": body["timestamp"],
        "color": body["color"],
        "userId": user_id,
    });
    backend.todos.push(todo.clone());
    (StatusCode::CREATED, Json(todo))
}

async fn update_todo(
    State(state): State<Shared>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Reply {
    let mut backend = state.lock().unwrap();
    let Some(user_id) = backend.caller(&headers) else {
        return unauthorized();
    };
    let Some(todo) = backend
        .todos
        .iter_mut()
        .find(|t| t["id"] == id.as_str() && t["userId"] == user_id.as_str())
    else {
        return server_error("Internal server error");
    };
    for field in ["title", "note"] {
        if let Some(value) = body.get(field) {
            todo[field] = value.clone();
        }
    }
    (StatusCode::OK, Json(todo.clone()))
}

async fn delete_todo(
    State(state): State<Shared>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Reply {
    let mut backend = state.lock().unwrap();
    let Some(user_id) = backend.caller(&headers) else {
        return unauthorized();
    };
    let before = backend.todos.len();
    backend
        .todos
        .retain(|t| !(t["id"] == id.as_str() && t["userId"] == user_id.as_str()));
    if backend.todos.len() == before {
        return server_error("Internal server error");
    }
    (StatusCode::OK, Json(json!({ "id": id })))
}

/// Start the fake backend on an ephemeral port, returning its base URL
pub async fn spawn_backend() -> (String, Shared) {
    let state: Shared = Arc::default();
    let app = Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/users", get(list_users))
        .route("/todos", get(list_todos).post(create_todo))
        .route("/todos/{id}", put(update_todo).delete(delete_todo))
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{}", addr), state)
}

/// Config pointing at a backend, with short waits
pub fn test_config(backend_url: &str) -> Config {
    let mut config = Config::default();
    config.targets.backend_url = backend_url.to_string();
    config.targets.frontend_url = "http://app.test".to_string();
    config.timeouts.request_secs = 5;
    config.timeouts.default_wait_ms = 500;
    config.timeouts.extended_wait_ms = 1_000;
    config.timeouts.poll_interval_ms = 10;
    config
}

/// A base URL nothing listens on
pub async fn dead_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    tokio::time::sleep(Duration::from_millis(10)).await;
    format!("http://{}", addr)
}
