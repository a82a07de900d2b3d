//! todo-e2e - end-to-end suites for the todo-list application
//!
//! This library provides the scenario runner, a typed client for the
//! backend API and a WebDriver browser driver.

pub mod api;
pub mod browser;
pub mod cli;
pub mod commands;
pub mod common;
pub mod scenario;
pub mod suites;

// Re-export commonly used types for tests
pub use common::{Error, Result};
pub use scenario::{RunOptions, Runner, Suite, SuiteReport};
