//! Scenario runner
//!
//! Reads YAML suites and executes their scenarios in order against the
//! backend API and, for UI steps, a WebDriver-controlled browser. Scenarios
//! share state through an explicit [`SuiteContext`].

mod config;
mod context;
mod expect;
mod runner;
mod wait;

pub use config::*;
pub use context::{SuiteContext, NOW_VAR, RAND_VAR, TOKEN_VAR};
pub use runner::{RunOptions, Runner, ScenarioOutcome, ScenarioResult, SuiteReport};
