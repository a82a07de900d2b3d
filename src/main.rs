//! todo-e2e - end-to-end checks for the todo-list application
//!
//! Runs YAML suites against the backend API and, through WebDriver, the
//! frontend UI.

use clap::Parser;
use commands::Commands;
use todo_e2e::common::logging;
use todo_e2e::{cli, commands};

#[derive(Parser)]
#[command(name = "todo-e2e", about = "End-to-end suites for the todo-list app")]
#[command(version, long_about = None)]
struct Cli {
    /// Print every step and debug logs
    #[arg(long, short, global = true)]
    verbose: bool,

    /// Also write logs to a file in the platform data directory
    #[arg(long, global = true)]
    log_file: bool,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Guard flushes the file writer on drop
    let _log_guard = if cli.log_file {
        logging::init_with_file(cli.verbose).map(|(path, guard)| {
            tracing::info!(path = %path.display(), "logging to file");
            guard
        })
    } else {
        logging::init_cli(cli.verbose);
        None
    };

    match cli::dispatch(cli.command, cli.verbose).await {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}
