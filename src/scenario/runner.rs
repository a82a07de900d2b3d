//! Suite runner
//!
//! Executes the scenarios of a suite strictly in declaration order. State
//! flows between scenarios only through the [`SuiteContext`]; a failing
//! scenario leaves the context as it was, so later scenarios that depend on
//! it fail too.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::time::{Duration, Instant};

use colored::Colorize;
use reqwest::Method;
use serde_json::Value;

use crate::api::{ApiClient, LoginRequest, LoginResponse};
use crate::browser::network::{self, NetworkEntry, RequestPattern};
use crate::browser::{expand_selector, DriverFactory, ElementRef, UiDriver, WebDriverFactory};
use crate::common::config::Config;
use crate::common::{join_url, Error, Result};

use super::config::{Scenario, Step, Suite};
use super::context::SuiteContext;
use super::expect::{capture, check_response};
use super::wait::Deadline;

/// Options controlling a run
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Print every step, not only scenario outcomes
    pub verbose: bool,
    /// Stop the suite at the first scenario that does not pass
    pub fail_fast: bool,
    /// Only run scenarios whose name contains this text (case-insensitive)
    pub filter: Option<String>,
}

/// How a scenario ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScenarioOutcome {
    Passed,
    /// The system under test did not behave as expected
    Failed { reason: String },
    /// The runner could not complete the scenario (transport, config, ...)
    Errored { reason: String },
    /// Not run because of `fail_fast`
    Skipped,
}

impl ScenarioOutcome {
    fn from_error(e: &Error) -> Self {
        if e.is_assertion() {
            Self::Failed {
                reason: e.to_string(),
            }
        } else {
            Self::Errored {
                reason: e.to_string(),
            }
        }
    }

    pub fn is_passed(&self) -> bool {
        matches!(self, Self::Passed)
    }
}

/// Result of one scenario
#[derive(Debug, Clone)]
pub struct ScenarioResult {
    pub name: String,
    pub outcome: ScenarioOutcome,
    pub steps_run: usize,
    pub steps_total: usize,
    pub duration: Duration,
}

/// Results of one suite run
#[derive(Debug, Clone)]
pub struct SuiteReport {
    pub name: String,
    pub results: Vec<ScenarioResult>,
}

impl SuiteReport {
    fn count(&self, pred: impl Fn(&ScenarioOutcome) -> bool) -> usize {
        self.results.iter().filter(|r| pred(&r.outcome)).count()
    }

    pub fn passed(&self) -> usize {
        self.count(|o| matches!(o, ScenarioOutcome::Passed))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, ScenarioOutcome::Failed { .. }))
    }

    pub fn errored(&self) -> usize {
        self.count(|o| matches!(o, ScenarioOutcome::Errored { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, ScenarioOutcome::Skipped))
    }

    pub fn is_success(&self) -> bool {
        self.passed() == self.results.len()
    }

    /// Result for a scenario by name
    pub fn get(&self, name: &str) -> Option<&ScenarioResult> {
        self.results.iter().find(|r| r.name == name)
    }
}

/// Runs suites against the configured backend and frontend
pub struct Runner {
    config: Config,
    api: ApiClient,
    drivers: Box<dyn DriverFactory>,
    options: RunOptions,
}

impl Runner {
    /// Create a runner that opens WebDriver sessions for UI steps
    pub fn new(config: Config, options: RunOptions) -> Result<Self> {
        let api = ApiClient::new(config.targets.backend_url.clone(), config.timeouts.request())?;
        Ok(Self {
            config,
            api,
            drivers: Box::new(WebDriverFactory),
            options,
        })
    }

    /// Replace the browser factory
    pub fn with_driver_factory(mut self, factory: impl DriverFactory + 'static) -> Self {
        self.drivers = Box::new(factory);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run every selected scenario of a suite
    pub async fn run_suite(&self, suite: &Suite) -> SuiteReport {
        println!("\n{} {}", "Suite:".blue().bold(), suite.name.white().bold());
        if let Some(desc) = &suite.description {
            println!("  {}", desc.dimmed());
        }
        tracing::info!(suite = %suite.name, scenarios = suite.scenarios.len(), "suite started");

        let selected: Vec<&Scenario> = suite
            .scenarios
            .iter()
            .filter(|s| self.is_selected(s))
            .collect();

        let mut run = SuiteRun {
            runner: self,
            ctx: SuiteContext::new(&self.config),
            ui: None,
        };

        let setup = match run.seed_vars(suite) {
            Ok(()) if !suite.before.is_empty() => {
                if self.options.verbose {
                    println!("\n  {}", "before:".cyan());
                }
                let mut progress = 0;
                run.run_steps(&suite.before, None, &mut progress).await
            }
            other => other,
        };

        let mut results = Vec::with_capacity(selected.len());

        if let Err(e) = setup {
            println!("  {} {}: {}", "✗".red(), "before".red(), e);
            tracing::warn!(suite = %suite.name, error = %e, "suite setup failed");
            let reason = format!("suite setup failed: {}", e);
            for scenario in selected {
                let outcome = if e.is_assertion() {
                    ScenarioOutcome::Failed {
                        reason: reason.clone(),
                    }
                } else {
                    ScenarioOutcome::Errored {
                        reason: reason.clone(),
                    }
                };
                results.push(ScenarioResult {
                    name: scenario.name.clone(),
                    outcome,
                    steps_run: 0,
                    steps_total: count_steps(&suite.before_each) + count_steps(&scenario.steps),
                    duration: Duration::ZERO,
                });
            }
        } else {
            let mut stopped = false;
            for scenario in selected {
                if stopped {
                    results.push(ScenarioResult {
                        name: scenario.name.clone(),
                        outcome: ScenarioOutcome::Skipped,
                        steps_run: 0,
                        steps_total: count_steps(&suite.before_each)
                            + count_steps(&scenario.steps),
                        duration: Duration::ZERO,
                    });
                    println!("  {} {}", "-".dimmed(), scenario.name.dimmed());
                    continue;
                }

                let result = run.run_scenario(suite, scenario).await;
                print_result(&result);
                if self.options.fail_fast && !result.outcome.is_passed() {
                    stopped = true;
                }
                results.push(result);
            }
        }

        run.close().await;

        let report = SuiteReport {
            name: suite.name.clone(),
            results,
        };
        print_summary(&report);
        tracing::info!(
            suite = %suite.name,
            passed = report.passed(),
            failed = report.failed(),
            errored = report.errored(),
            "suite finished"
        );
        report
    }

    fn is_selected(&self, scenario: &Scenario) -> bool {
        match &self.options.filter {
            Some(filter) => scenario
                .name
                .to_lowercase()
                .contains(&filter.to_lowercase()),
            None => true,
        }
    }
}

/// Alias registered by an `intercept` step
struct Alias {
    pattern: RequestPattern,
    /// Matching exchanges already claimed by `wait_request` or present
    /// before the alias was registered
    consumed: usize,
}

/// Open browser session and its intercepts
struct UiSession {
    driver: Box<dyn UiDriver>,
    aliases: HashMap<String, Alias>,
}

/// State of one suite run
struct SuiteRun<'a> {
    runner: &'a Runner,
    ctx: SuiteContext,
    ui: Option<UiSession>,
}

impl<'a> SuiteRun<'a> {
    fn seed_vars(&mut self, suite: &Suite) -> Result<()> {
        for (name, value) in &suite.vars {
            let value = self.ctx.interpolate(value)?;
            self.ctx.set(name.clone(), Value::String(value));
        }
        Ok(())
    }

    async fn run_scenario(&mut self, suite: &Suite, scenario: &Scenario) -> ScenarioResult {
        let started = Instant::now();
        let steps_total = count_steps(&suite.before_each) + count_steps(&scenario.steps);
        let mut progress = 0;

        if self.runner.options.verbose {
            println!("\n  {}", scenario.name.white());
        }
        tracing::debug!(scenario = %scenario.name, "scenario started");

        let mut result = self
            .run_steps(&suite.before_each, None, &mut progress)
            .await;
        if result.is_ok() {
            result = self.run_steps(&scenario.steps, None, &mut progress).await;
        }

        let outcome = match &result {
            Ok(()) => ScenarioOutcome::Passed,
            Err(e) => {
                tracing::warn!(scenario = %scenario.name, step = progress, error = %e, "scenario did not pass");
                ScenarioOutcome::from_error(e)
            }
        };

        ScenarioResult {
            name: scenario.name.clone(),
            outcome,
            steps_run: progress,
            steps_total,
            duration: started.elapsed(),
        }
    }

    fn run_steps<'s>(
        &'s mut self,
        steps: &'s [Step],
        scope: Option<&'s ElementRef>,
        progress: &'s mut usize,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + 's>> {
        Box::pin(async move {
            for step in steps {
                *progress += 1;
                let step_num = *progress;
                match self.execute_step(step, scope, progress).await {
                    Ok(()) => {
                        if self.runner.options.verbose && !matches!(step, Step::Within { .. }) {
                            println!(
                                "    {} {}. {}",
                                "✓".green(),
                                step_num,
                                step.describe().dimmed()
                            );
                        }
                    }
                    Err(e) => {
                        if self.runner.options.verbose {
                            println!("    {} {}. {}: {}", "✗".red(), step_num, step.describe(), e);
                        }
                        return Err(e);
                    }
                }
            }
            Ok(())
        })
    }

    /// Execute a single step
    async fn execute_step(
        &mut self,
        step: &Step,
        scope: Option<&ElementRef>,
        progress: &mut usize,
    ) -> Result<()> {
        match step {
            Step::Request {
                method,
                path,
                auth,
                body,
                headers,
                expect,
                capture: captures,
            } => {
                let method = Method::from_bytes(method.to_uppercase().as_bytes())
                    .map_err(|_| Error::Config(format!("Invalid HTTP method '{}'", method)))?;
                let path = self.ctx.interpolate(path)?;
                let token = if *auth { Some(self.ctx.token()?) } else { None };
                let body = body
                    .as_ref()
                    .map(|b| self.ctx.interpolate_value(b))
                    .transpose()?;
                let headers = headers
                    .iter()
                    .map(|(k, v)| Ok((k.clone(), self.ctx.interpolate(v)?)))
                    .collect::<Result<Vec<_>>>()?;

                let response = self
                    .runner
                    .api
                    .send(method, &path, token.as_ref(), body.as_ref(), &headers)
                    .await?;

                if let Some(expect) = expect {
                    check_response(&response, expect, &mut self.ctx)?;
                }
                capture(&response, captures, &mut self.ctx)
            }

            Step::Login {
                email,
                password,
                expect_name,
            } => {
                let request = LoginRequest {
                    email: self.ctx.interpolate(email)?,
                    password: self.ctx.interpolate(password)?,
                };
                let response = self.runner.api.login(&request).await?;
                if response.status != 201 {
                    return Err(Error::TestAssertion(format!(
                        "Login as {} returned status {}, expected 201",
                        request.email, response.status
                    )));
                }
                let login: LoginResponse = response.json()?;
                if let Some(name) = expect_name {
                    let name = self.ctx.interpolate(name)?;
                    if login.name != name {
                        return Err(Error::TestAssertion(format!(
                            "Login returned name '{}', expected '{}'",
                            login.name, name
                        )));
                    }
                }
                self.ctx.set_token(&login.access_token);
                Ok(())
            }

            Step::SetVar { name, value } => {
                let value = self.ctx.interpolate(value)?;
                self.ctx.set(name.clone(), Value::String(value));
                Ok(())
            }

            Step::Within { selector, steps } => {
                let selector = expand_selector(&self.ctx.interpolate(selector)?);
                let deadline = self.deadline(None, false);
                let element = {
                    let ui = self.ui().await?;
                    wait_for_element(ui.driver.as_ref(), scope, &selector, &deadline).await?
                };
                self.run_steps(steps, Some(&element), progress).await
            }

            ui_step => self.execute_ui_step(ui_step, scope).await,
        }
    }

    /// Execute a browser step
    async fn execute_ui_step(&mut self, step: &Step, scope: Option<&ElementRef>) -> Result<()> {
        match step {
            Step::Visit { path } => {
                let url = join_url(
                    &self.runner.config.targets.frontend_url,
                    &self.ctx.interpolate(path)?,
                );
                let ui = self.ui().await?;
                ui.driver.goto(&url).await?;
                // A full page load discards the recorder; intercepts survive it
                if !ui.aliases.is_empty() {
                    network::install(ui.driver.as_ref()).await?;
                    for alias in ui.aliases.values_mut() {
                        alias.consumed = 0;
                    }
                }
                Ok(())
            }

            Step::Intercept {
                method,
                path,
                alias,
            } => {
                let pattern = RequestPattern::new(method, &self.ctx.interpolate(path)?);
                let ui = self.ui().await?;
                network::install(ui.driver.as_ref()).await?;
                let existing = network::entries(ui.driver.as_ref())
                    .await?
                    .iter()
                    .filter(|e| pattern.matches(e))
                    .count();
                ui.aliases.insert(
                    alias.clone(),
                    Alias {
                        pattern,
                        consumed: existing,
                    },
                );
                Ok(())
            }

            Step::Type {
                selector,
                text,
                clear,
            } => {
                let selector = expand_selector(&self.ctx.interpolate(selector)?);
                let text = self.ctx.interpolate(text)?;
                let deadline = self.deadline(None, false);
                let ui = self.ui().await?;
                let element =
                    wait_for_element(ui.driver.as_ref(), scope, &selector, &deadline).await?;
                if *clear {
                    ui.driver.clear(&element).await?;
                }
                ui.driver.send_keys(&element, &text).await
            }

            Step::Clear { selector } => {
                let selector = expand_selector(&self.ctx.interpolate(selector)?);
                let deadline = self.deadline(None, false);
                let ui = self.ui().await?;
                let element =
                    wait_for_element(ui.driver.as_ref(), scope, &selector, &deadline).await?;
                ui.driver.clear(&element).await
            }

            Step::Click { selector } => {
                let selector = expand_selector(&self.ctx.interpolate(selector)?);
                let deadline = self.deadline(None, false);
                let ui = self.ui().await?;
                let element =
                    wait_for_element(ui.driver.as_ref(), scope, &selector, &deadline).await?;
                ui.driver.click(&element).await
            }

            Step::WaitRequest {
                alias,
                status,
                timeout_ms,
            } => {
                let deadline = self.deadline(*timeout_ms, true);
                let ui = self.ui().await?;
                let registered = ui
                    .aliases
                    .get(alias)
                    .ok_or_else(|| Error::UnknownAlias(alias.clone()))?;
                let (pattern, consumed) = (registered.pattern.clone(), registered.consumed);

                // The next unclaimed request, once its response has arrived
                let (entry, observed) = loop {
                    let found = network::entries(ui.driver.as_ref())
                        .await?
                        .into_iter()
                        .filter(|e| pattern.matches(e))
                        .nth(consumed);
                    let pending = found.as_ref().is_some_and(NetworkEntry::is_pending);
                    if let Some(entry) = found {
                        if let Some(observed) = entry.status {
                            break (entry, observed);
                        }
                    }
                    if deadline.expired() {
                        let what = if pending { "response to request" } else { "request" };
                        return Err(Error::wait_timeout(
                            format!("{} @{} ({} {})", what, alias, pattern.method, pattern.path),
                            deadline.budget_ms(),
                        ));
                    }
                    deadline.tick().await;
                };

                if let Some(a) = ui.aliases.get_mut(alias) {
                    a.consumed = consumed + 1;
                }
                tracing::debug!(alias = %alias, url = %entry.url, status = observed, "request observed");

                if let Some(expected) = status {
                    if observed != *expected {
                        return Err(Error::TestAssertion(format!(
                            "Request @{} ({} {}) returned status {}, expected {}",
                            alias, entry.method, entry.url, observed, expected
                        )));
                    }
                }
                Ok(())
            }

            // Requests still awaiting their response count as sent
            Step::ExpectNoRequest { alias } => {
                let ui = self.ui().await?;
                let registered = ui
                    .aliases
                    .get(alias)
                    .ok_or_else(|| Error::UnknownAlias(alias.clone()))?;
                let seen = network::entries(ui.driver.as_ref())
                    .await?
                    .iter()
                    .filter(|e| registered.pattern.matches(e))
                    .count();
                if seen > registered.consumed {
                    return Err(Error::TestAssertion(format!(
                        "Expected no request @{} ({} {}), but {} were sent",
                        alias,
                        registered.pattern.method,
                        registered.pattern.path,
                        seen - registered.consumed
                    )));
                }
                Ok(())
            }

            Step::ExpectUrl {
                contains,
                equals,
                timeout_ms,
            } => {
                let contains = contains
                    .as_deref()
                    .map(|c| self.ctx.interpolate(c))
                    .transpose()?;
                let equals = equals
                    .as_deref()
                    .map(|e| self.ctx.interpolate(e))
                    .transpose()?;
                let deadline = self.deadline(*timeout_ms, true);
                let ui = self.ui().await?;

                loop {
                    let url = ui.driver.current_url().await?;
                    let contains_ok = contains.as_deref().map_or(true, |c| url.contains(c));
                    let equals_ok = equals.as_deref().map_or(true, |e| url == e);
                    if contains_ok && equals_ok {
                        return Ok(());
                    }
                    if deadline.expired() {
                        let wanted = match (&equals, &contains) {
                            (Some(e), _) => format!("to equal '{}'", e),
                            (None, Some(c)) => format!("to contain '{}'", c),
                            (None, None) => "to match".to_string(),
                        };
                        return Err(Error::TestAssertion(format!(
                            "Expected URL {} within {}ms, last URL was '{}'",
                            wanted,
                            deadline.budget_ms(),
                            url
                        )));
                    }
                    deadline.tick().await;
                }
            }

            Step::ExpectText {
                text,
                exists,
                timeout_ms,
            } => {
                let text = self.ctx.interpolate(text)?;
                let deadline = self.deadline(*timeout_ms, false);
                let ui = self.ui().await?;

                loop {
                    let page = ui.driver.text(scope).await?;
                    if page.contains(&text) == *exists {
                        return Ok(());
                    }
                    if deadline.expired() {
                        return Err(Error::TestAssertion(format!(
                            "Expected text '{}' to {} within {}ms",
                            text,
                            if *exists { "exist" } else { "not exist" },
                            deadline.budget_ms()
                        )));
                    }
                    deadline.tick().await;
                }
            }

            Step::Request { .. } | Step::Login { .. } | Step::SetVar { .. } | Step::Within { .. } => {
                Err(Error::Internal(format!(
                    "'{}' is not a browser step",
                    step.describe()
                )))
            }
        }
    }

    /// Browser session, opened on first use
    async fn ui(&mut self) -> Result<&mut UiSession> {
        if self.ui.is_none() {
            let driver = self.runner.drivers.connect(&self.runner.config).await?;
            self.ui = Some(UiSession {
                driver,
                aliases: HashMap::new(),
            });
        }
        self.ui
            .as_mut()
            .ok_or_else(|| Error::Internal("browser session unavailable".to_string()))
    }

    fn deadline(&self, override_ms: Option<u64>, extended: bool) -> Deadline {
        let timeouts = &self.runner.config.timeouts;
        let budget = match override_ms {
            Some(ms) => Duration::from_millis(ms),
            None if extended => timeouts.extended_wait(),
            None => timeouts.default_wait(),
        };
        Deadline::new(budget, timeouts.poll_interval())
    }

    async fn close(&mut self) {
        if let Some(ui) = self.ui.take() {
            if let Err(e) = ui.driver.close().await {
                tracing::warn!(error = %e, "failed to close browser session");
            }
        }
    }
}

/// Retry a lookup until the element appears or the deadline passes
async fn wait_for_element(
    driver: &dyn UiDriver,
    scope: Option<&ElementRef>,
    selector: &str,
    deadline: &Deadline,
) -> Result<ElementRef> {
    loop {
        match driver.find(scope, selector).await {
            Ok(element) => return Ok(element),
            Err(Error::ElementNotFound(_)) if !deadline.expired() => deadline.tick().await,
            Err(Error::ElementNotFound(sel)) => {
                return Err(Error::wait_timeout(
                    format!("element '{}'", sel),
                    deadline.budget_ms(),
                ))
            }
            Err(e) => return Err(e),
        }
    }
}

/// Number of steps including those nested in `within`
fn count_steps(steps: &[Step]) -> usize {
    steps
        .iter()
        .map(|s| match s {
            Step::Within { steps, .. } => 1 + count_steps(steps),
            _ => 1,
        })
        .sum()
}

fn print_result(result: &ScenarioResult) {
    let elapsed = format!("({}ms)", result.duration.as_millis());
    match &result.outcome {
        ScenarioOutcome::Passed => {
            println!("  {} {} {}", "✓".green(), result.name, elapsed.dimmed());
        }
        ScenarioOutcome::Failed { reason } => {
            println!("  {} {}", "✗".red(), result.name.red());
            println!(
                "      {} step {}/{}: {}",
                "failed at".red(),
                result.steps_run,
                result.steps_total,
                reason
            );
        }
        ScenarioOutcome::Errored { reason } => {
            println!("  {} {}", "!".yellow(), result.name.yellow());
            println!(
                "      {} step {}/{}: {}",
                "error at".yellow(),
                result.steps_run,
                result.steps_total,
                reason
            );
        }
        ScenarioOutcome::Skipped => {
            println!("  {} {}", "-".dimmed(), result.name.dimmed());
        }
    }
}

fn print_summary(report: &SuiteReport) {
    let mut parts = vec![format!("{} passing", report.passed()).green().to_string()];
    if report.failed() > 0 {
        parts.push(format!("{} failing", report.failed()).red().to_string());
    }
    if report.errored() > 0 {
        parts.push(format!("{} errored", report.errored()).yellow().to_string());
    }
    if report.skipped() > 0 {
        parts.push(format!("{} skipped", report.skipped()).dimmed().to_string());
    }
    println!("\n  {}\n", parts.join(", "));
}
