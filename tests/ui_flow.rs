//! Browser-step tests against a scripted fake frontend
//!
//! The fake implements `UiDriver` directly and behaves like the todo
//! frontend closely enough to run the built-in `login` and `todo` suites:
//! form validation messages, redirects, a todo board with edit/cancel/delete
//! and an in-page network log that only records once installed.

mod common;

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};

use common::{spawn_backend, test_config};
use todo_e2e::browser::{DriverFactory, ElementRef, UiDriver};
use todo_e2e::common::config::Config;
use todo_e2e::common::{Error, Result};
use todo_e2e::scenario::{RunOptions, Runner, ScenarioOutcome, Suite};
use todo_e2e::suites;

const ORIGIN: &str = "http://app.test";

#[derive(Default)]
struct FakeApp {
    url: String,
    inputs: HashMap<String, String>,
    messages: Vec<String>,
    registered: HashSet<String>,
    todos: Vec<(u32, String, String)>,
    next_todo: u32,
    editing: bool,
    /// `None` until the recorder is installed in the current page
    network: Option<Vec<Value>>,
    /// Leave every recorded request without a response
    hold_responses: bool,
    sessions_opened: usize,
    sessions_closed: usize,
}

impl FakeApp {
    fn record(&mut self, method: &str, path: &str, status: u16) {
        let status = if self.hold_responses { Value::Null } else { json!(status) };
        if let Some(log) = &mut self.network {
            log.push(json!({ "method": method, "url": format!("{}{}", ORIGIN, path), "status": status }));
        }
    }

    fn input(&self, id: &str) -> String {
        self.inputs.get(id).cloned().unwrap_or_default()
    }

    fn click(&mut self, id: &str) {
        match id {
            "register-submit" => {
                let email = self.input("register-email");
                let valid = email
                    .split_once('@')
                    .is_some_and(|(user, domain)| !user.is_empty() && domain.contains('.'));
                if !valid {
                    self.messages.push("อีเมลไม่ถูกต้อง".into());
                } else if !self.registered.insert(email) {
                    self.record("POST", "/api/auth/register", 500);
                    self.messages.push("อีเมลนี้ถูกใช้แล้ว".into());
                } else {
                    self.record("POST", "/api/auth/register", 201);
                    self.url = format!("{}/login", ORIGIN);
                }
            }
            "login-submit" => {
                let email = self.input("login-email");
                let password = self.input("login-password");
                if email.is_empty() || password.is_empty() {
                    if email.is_empty() {
                        self.messages.push("กรุณากรอกอีเมล".into());
                    }
                    if password.is_empty() {
                        self.messages.push("กรุณากรอกรหัสผ่าน".into());
                    }
                } else if password == "Admin1234" {
                    self.record("POST", "/api/auth/login", 201);
                    self.url = format!("{}/", ORIGIN);
                    self.inputs.clear();
                } else {
                    self.record("POST", "/api/auth/login", 401);
                    self.messages.push("เข้าสู่ระบบไม่สำเร็จ".into());
                }
            }
            "add-task" => {
                let title = self.input("title-input");
                if title.trim().is_empty() {
                    self.messages.push("Title is required".into());
                } else {
                    self.record("POST", "/api/todos", 201);
                    self.next_todo += 1;
                    let note = self.input("note-input");
                    self.todos.push((self.next_todo, title, note));
                    self.inputs.remove("title-input");
                    self.inputs.remove("note-input");
                }
            }
            "edit-task" => {
                self.editing = true;
                if let Some((_, title, note)) = self.todos.first() {
                    self.inputs.insert("edit-title-input".into(), title.clone());
                    self.inputs.insert("edit-note-input".into(), note.clone());
                }
            }
            "save-task" => {
                let (title, note) = (self.input("edit-title-input"), self.input("edit-note-input"));
                let saved = self.todos.first_mut().map(|todo| {
                    todo.1 = title;
                    todo.2 = note;
                    todo.0
                });
                if let Some(id) = saved {
                    self.record("PUT", &format!("/api/todos/{}", id), 200);
                }
                self.editing = false;
            }
            "cancel-edit" => self.editing = false,
            "delete-task" => {
                if !self.todos.is_empty() {
                    let (id, _, _) = self.todos.remove(0);
                    self.record("DELETE", &format!("/api/todos/{}", id), 200);
                }
            }
            _ => {}
        }
    }

    fn exists(&self, id: &str) -> bool {
        match id {
            "edit-title-input" | "edit-note-input" | "save-task" | "cancel-edit" => self.editing,
            _ => true,
        }
    }
}

/// Extract the test id from `[data-cy='x']` / `[data-cy^='x']`
fn parse_selector(selector: &str) -> Option<(&str, bool)> {
    let inner = selector.strip_prefix("[data-cy")?.strip_suffix("']")?;
    if let Some(prefix) = inner.strip_prefix("^='") {
        Some((prefix, true))
    } else {
        inner.strip_prefix("='").map(|id| (id, false))
    }
}

#[derive(Clone, Default)]
struct FakeBrowser {
    app: Arc<Mutex<FakeApp>>,
}

#[async_trait]
impl UiDriver for FakeBrowser {
    async fn goto(&self, url: &str) -> Result<()> {
        let mut app = self.app.lock().unwrap();
        app.url = url.to_string();
        app.inputs.clear();
        app.messages.clear();
        app.editing = false;
        // Full page load
        app.network = None;
        Ok(())
    }

    async fn current_url(&self) -> Result<String> {
        Ok(self.app.lock().unwrap().url.clone())
    }

    async fn find(&self, _scope: Option<&ElementRef>, selector: &str) -> Result<ElementRef> {
        let app = self.app.lock().unwrap();
        let (id, prefix) =
            parse_selector(selector).ok_or_else(|| Error::ElementNotFound(selector.into()))?;
        if prefix {
            return app
                .todos
                .iter()
                .map(|(n, _, _)| format!("todo-card-{}", n))
                .find(|card| card.starts_with(id))
                .map(ElementRef)
                .ok_or_else(|| Error::ElementNotFound(selector.into()));
        }
        if app.exists(id) {
            Ok(ElementRef(id.to_string()))
        } else {
            Err(Error::ElementNotFound(selector.into()))
        }
    }

    async fn click(&self, element: &ElementRef) -> Result<()> {
        self.app.lock().unwrap().click(&element.0);
        Ok(())
    }

    async fn send_keys(&self, element: &ElementRef, text: &str) -> Result<()> {
        let mut app = self.app.lock().unwrap();
        app.inputs.entry(element.0.clone()).or_default().push_str(text);
        Ok(())
    }

    async fn clear(&self, element: &ElementRef) -> Result<()> {
        self.app.lock().unwrap().inputs.remove(&element.0);
        Ok(())
    }

    async fn text(&self, _scope: Option<&ElementRef>) -> Result<String> {
        let app = self.app.lock().unwrap();
        let mut text = app.messages.join("\n");
        for (_, title, note) in &app.todos {
            text.push('\n');
            text.push_str(title);
            text.push('\n');
            text.push_str(note);
        }
        Ok(text)
    }

    async fn execute(&self, script: &str, _args: Vec<Value>) -> Result<Value> {
        let mut app = self.app.lock().unwrap();
        if script.contains("window.__todoE2eNetwork = log") {
            if app.network.is_some() {
                return Ok(json!(false));
            }
            app.network = Some(Vec::new());
            return Ok(json!(true));
        }
        if script.contains("return window.__todoE2eNetwork") {
            return Ok(app.network.clone().map(Value::Array).unwrap_or(Value::Null));
        }
        Err(Error::webdriver("execute script", "unsupported script"))
    }

    async fn close(&self) -> Result<()> {
        self.app.lock().unwrap().sessions_closed += 1;
        Ok(())
    }
}

#[async_trait]
impl DriverFactory for FakeBrowser {
    async fn connect(&self, _config: &Config) -> Result<Box<dyn UiDriver>> {
        self.app.lock().unwrap().sessions_opened += 1;
        Ok(Box::new(self.clone()))
    }
}

async fn runner_with(browser: &FakeBrowser) -> Runner {
    let (base, _) = spawn_backend().await;
    let mut config = test_config(&base);
    config.targets.frontend_url = ORIGIN.to_string();
    Runner::new(config, RunOptions::default())
        .unwrap()
        .with_driver_factory(browser.clone())
}

fn assert_all_passed(report: &todo_e2e::SuiteReport) {
    for result in &report.results {
        assert_eq!(
            result.outcome,
            ScenarioOutcome::Passed,
            "scenario '{}' did not pass",
            result.name
        );
    }
}

#[tokio::test]
async fn test_builtin_login_suite_passes() {
    let browser = FakeBrowser::default();
    let runner = runner_with(&browser).await;

    let report = runner.run_suite(&suites::builtin("login").unwrap()).await;

    assert_all_passed(&report);
    let app = browser.app.lock().unwrap();
    assert_eq!(app.sessions_opened, 1);
    assert_eq!(app.sessions_closed, 1);
}

#[tokio::test]
async fn test_builtin_todo_suite_passes() {
    let browser = FakeBrowser::default();
    let runner = runner_with(&browser).await;

    let report = runner.run_suite(&suites::builtin("todo").unwrap()).await;

    assert_all_passed(&report);
    // Added, edited, then deleted
    assert!(browser.app.lock().unwrap().todos.is_empty());
}

#[tokio::test]
async fn test_api_only_suite_never_opens_a_browser() {
    let browser = FakeBrowser::default();
    let runner = runner_with(&browser).await;
    let suite = Suite::parse(
        "api-only",
        "name: x\nscenarios:\n  - name: users\n    steps:\n      - action: request\n        method: GET\n        path: /users\n        expect: { status: 200 }\n",
    )
    .unwrap();

    let report = runner.run_suite(&suite).await;

    assert!(report.is_success());
    assert_eq!(browser.app.lock().unwrap().sessions_opened, 0);
}

#[tokio::test]
async fn test_missing_text_fails_within_bound() {
    let browser = FakeBrowser::default();
    let runner = runner_with(&browser).await;
    let suite = Suite::parse(
        "missing-text",
        r#"
name: Missing text
scenarios:
  - name: never rendered
    steps:
      - action: visit
        path: /
      - action: expect_text
        text: Nothing like this
        timeout_ms: 50
"#,
    )
    .unwrap();

    let report = runner.run_suite(&suite).await;

    match &report.results[0].outcome {
        ScenarioOutcome::Failed { reason } => {
            assert!(reason.contains("Nothing like this"), "{reason}");
            assert!(reason.contains("50ms"), "{reason}");
        }
        other => panic!("Expected Failed outcome, got {:?}", other),
    }
}

#[tokio::test]
async fn test_request_before_intercept_is_not_claimed() {
    let browser = FakeBrowser::default();
    let runner = runner_with(&browser).await;
    let suite = Suite::parse(
        "intercept-order",
        r#"
name: Intercept order
scenarios:
  - name: earlier failed login is invisible to a later alias
    steps:
      - action: visit
        path: /login
      - action: intercept
        method: POST
        path: /api/auth/login
        alias: first
      - action: type
        selector: "@login-email"
        text: someone@example.com
      - action: type
        selector: "@login-password"
        text: wrongpass
      - action: click
        selector: "@login-submit"
      - action: wait_request
        alias: first
        status: 401
      - action: intercept
        method: POST
        path: /api/auth/login
        alias: second
      - action: expect_no_request
        alias: second
  - name: unknown alias errors
    steps:
      - action: wait_request
        alias: never-registered
"#,
    )
    .unwrap();

    let report = runner.run_suite(&suite).await;

    assert_eq!(report.results[0].outcome, ScenarioOutcome::Passed);
    assert!(matches!(
        &report.results[1].outcome,
        ScenarioOutcome::Errored { reason } if reason.contains("never-registered")
    ));
}

#[tokio::test]
async fn test_within_without_cards_fails() {
    let browser = FakeBrowser::default();
    let runner = runner_with(&browser).await;
    let suite = Suite::parse(
        "no-cards",
        r#"
name: No cards
scenarios:
  - name: edit with an empty board
    steps:
      - action: visit
        path: /
      - action: within
        selector: "@todo-card-*"
        steps:
          - action: click
            selector: "@edit-task"
"#,
    )
    .unwrap();

    let report = runner.run_suite(&suite).await;

    let result = &report.results[0];
    assert!(matches!(result.outcome, ScenarioOutcome::Failed { .. }));
    assert_eq!(result.steps_run, 2);
    assert_eq!(result.steps_total, 3);
}

const ADD_TODO: &str = r#"
name: Add todo
scenarios:
  - name: submitted title is noticed
    steps:
      - action: visit
        path: /
      - action: intercept
        method: POST
        path: /api/todos
        alias: todoRequest
      - action: type
        selector: "@title-input"
        text: Real title
      - action: click
        selector: "@add-task"
      - action: expect_no_request
        alias: todoRequest
"#;

#[tokio::test]
async fn test_sent_request_fails_expect_no_request() {
    let browser = FakeBrowser::default();
    let runner = runner_with(&browser).await;

    let report = runner.run_suite(&Suite::parse("add", ADD_TODO).unwrap()).await;

    match &report.results[0].outcome {
        ScenarioOutcome::Failed { reason } => {
            assert!(reason.contains("Expected no request @todoRequest"), "{reason}")
        }
        other => panic!("Expected Failed outcome, got {:?}", other),
    }
}

#[tokio::test]
async fn test_pending_request_counts_as_sent() {
    let browser = FakeBrowser::default();
    browser.app.lock().unwrap().hold_responses = true;
    let runner = runner_with(&browser).await;

    let report = runner.run_suite(&Suite::parse("add", ADD_TODO).unwrap()).await;

    assert!(matches!(report.results[0].outcome, ScenarioOutcome::Failed { .. }));
}

#[tokio::test]
async fn test_wait_request_waits_for_the_response() {
    let browser = FakeBrowser::default();
    browser.app.lock().unwrap().hold_responses = true;
    let runner = runner_with(&browser).await;
    let suite = Suite::parse(
        "pending",
        r#"
name: Pending
scenarios:
  - name: response never arrives
    steps:
      - action: visit
        path: /login
      - action: intercept
        method: POST
        path: /api/auth/login
        alias: loginRequest
      - action: type
        selector: "@login-email"
        text: someone@example.com
      - action: type
        selector: "@login-password"
        text: Admin1234
      - action: click
        selector: "@login-submit"
      - action: wait_request
        alias: loginRequest
        timeout_ms: 50
"#,
    )
    .unwrap();

    let report = runner.run_suite(&suite).await;

    match &report.results[0].outcome {
        ScenarioOutcome::Failed { reason } => {
            assert!(reason.contains("response to request @loginRequest"), "{reason}")
        }
        other => panic!("Expected Failed outcome, got {:?}", other),
    }
}

#[tokio::test]
async fn test_clear_step_empties_input() {
    let browser = FakeBrowser::default();
    let runner = runner_with(&browser).await;
    let suite = Suite::parse(
        "clear",
        r#"
name: Clear
scenarios:
  - name: cleared title is rejected
    steps:
      - action: visit
        path: /
      - action: intercept
        method: POST
        path: /api/todos
        alias: todoRequest
      - action: type
        selector: "@title-input"
        text: Soon gone
      - action: clear
        selector: "@title-input"
      - action: click
        selector: "@add-task"
      - action: expect_text
        text: Title is required
      - action: expect_no_request
        alias: todoRequest
"#,
    )
    .unwrap();

    let report = runner.run_suite(&suite).await;

    assert_eq!(report.results[0].outcome, ScenarioOutcome::Passed);
    assert!(browser.app.lock().unwrap().todos.is_empty());
}
