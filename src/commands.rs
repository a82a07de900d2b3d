//! CLI command definitions
//!
//! Defines the clap commands for the e2e runner.

use clap::{Args, Subcommand};
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum Commands {
    /// Run suites (built-in names or YAML files); all built-ins when none given
    Run {
        /// Suite names (api, login, todo) or paths to suite files
        suites: Vec<String>,

        /// Only run scenarios whose name contains this text
        #[arg(long, short)]
        filter: Option<String>,

        /// Stop a suite at the first scenario that does not pass
        #[arg(long)]
        fail_fast: bool,

        #[command(flatten)]
        targets: TargetArgs,
    },

    /// List built-in suites and their scenarios
    List,

    /// Print the YAML source of a built-in suite
    Show {
        /// Suite name
        name: String,
    },

    /// Print the effective configuration
    Config {
        #[command(flatten)]
        targets: TargetArgs,
    },
}

/// Overrides for the configured targets
#[derive(Args, Debug, Default, Clone)]
pub struct TargetArgs {
    /// Configuration file (default: platform config dir)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Backend base URL
    #[arg(long)]
    pub backend_url: Option<String>,

    /// Frontend base URL
    #[arg(long)]
    pub frontend_url: Option<String>,

    /// WebDriver endpoint
    #[arg(long)]
    pub webdriver_url: Option<String>,

    /// Show the browser window
    #[arg(long)]
    pub headed: bool,
}
