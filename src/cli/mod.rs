//! CLI command handling
//!
//! Dispatches CLI commands and formats their output.

use colored::Colorize;

use crate::commands::{Commands, TargetArgs};
use crate::common::config::Config;
use crate::common::Result;
use crate::scenario::{RunOptions, Runner, SuiteReport};
use crate::suites;

/// Dispatch a CLI command
///
/// Returns `Ok(false)` when suites ran but not every scenario passed.
pub async fn dispatch(command: Commands, verbose: bool) -> Result<bool> {
    match command {
        Commands::Run {
            suites: names,
            filter,
            fail_fast,
            targets,
        } => {
            let config = load_config(&targets)?;
            let names = if names.is_empty() {
                suites::names().into_iter().map(str::to_string).collect()
            } else {
                names
            };
            // Resolve everything up front so a typo fails before any request
            let suites = names
                .iter()
                .map(|n| suites::resolve(n))
                .collect::<Result<Vec<_>>>()?;

            let runner = Runner::new(
                config,
                RunOptions {
                    verbose,
                    fail_fast,
                    filter,
                },
            )?;

            let mut reports = Vec::with_capacity(suites.len());
            for suite in &suites {
                reports.push(runner.run_suite(suite).await);
            }

            print_totals(&reports);
            Ok(reports.iter().all(SuiteReport::is_success))
        }

        Commands::List => {
            for name in suites::names() {
                let suite = suites::builtin(name)?;
                println!("{} {}", name.cyan().bold(), suite.name.dimmed());
                for scenario in &suite.scenarios {
                    println!("  - {}", scenario.name);
                }
            }
            Ok(true)
        }

        Commands::Show { name } => {
            print!("{}", suites::source(&name)?);
            Ok(true)
        }

        Commands::Config { targets } => {
            let config = load_config(&targets)?;
            println!("backend_url   = {}", config.targets.backend_url);
            println!("frontend_url  = {}", config.targets.frontend_url);
            println!("webdriver_url = {}", config.targets.webdriver_url);
            println!(
                "browser       = {}{}",
                config.browser.browser_name,
                if config.browser.headless { " (headless)" } else { "" }
            );
            println!(
                "waits         = {}ms default, {}ms extended, {}s per request",
                config.timeouts.default_wait_ms,
                config.timeouts.extended_wait_ms,
                config.timeouts.request_secs
            );
            Ok(true)
        }
    }
}

/// Load the config file and environment, then apply flag overrides
fn load_config(targets: &TargetArgs) -> Result<Config> {
    let mut config = match &targets.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    apply_target_args(&mut config, targets);
    Ok(config)
}

fn apply_target_args(config: &mut Config, targets: &TargetArgs) {
    if let Some(url) = &targets.backend_url {
        config.targets.backend_url = url.clone();
    }
    if let Some(url) = &targets.frontend_url {
        config.targets.frontend_url = url.clone();
    }
    if let Some(url) = &targets.webdriver_url {
        config.targets.webdriver_url = url.clone();
    }
    if targets.headed {
        config.browser.headless = false;
    }
}

fn print_totals(reports: &[SuiteReport]) {
    if reports.len() < 2 {
        return;
    }
    println!("{}", "Totals:".blue().bold());
    for report in reports {
        let mark = if report.is_success() {
            "✓".green()
        } else {
            "✗".red()
        };
        println!(
            "  {} {} ({}/{} passed)",
            mark,
            report.name,
            report.passed(),
            report.results.len()
        );
    }
}
