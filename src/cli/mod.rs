//! The apicheck command-line interface.
//!
//! This module parses arguments, initialises logging and dispatches to the
//! library: suite discovery, the orchestrator, reporting and the Postman
//! converter.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::Parser;
use miette::{Diagnostic, IntoDiagnostic};
use thiserror::Error;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::cli::args::{ApicheckArgs, Command};
use crate::config::RunConfig;
use crate::discovery::discover_suite_files;
use crate::postman;
use crate::report::RunReport;
use crate::runner::Orchestrator;
use crate::transport::HttpTransport;

pub mod args;
pub mod output;

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    #[error("the file '{}' does not exist", .path.display())]
    #[diagnostic(code(apicheck::cli::missing_file))]
    MissingFile { path: PathBuf },

    #[error("no YAML files found in '{}'", .dir.display())]
    #[diagnostic(
        code(apicheck::cli::no_suites),
        help("pass suite files explicitly, or use --dir / --recursive")
    )]
    NoSuites { dir: PathBuf },
}

/// The main entry point for the CLI.
pub fn run() -> miette::Result<ExitCode> {
    let command = ApicheckArgs::parse().into_command();

    match command {
        Command::Run(run) => {
            init_tracing(run.log_level());
            run_suites(&run.to_config())
        }
        Command::Convert { collection, output } => {
            init_tracing("info");
            let conversion = postman::convert_file(&collection, &output)?;
            println!(
                "Converted {} request(s) into '{}' ({} skipped)",
                conversion.converted(),
                output.display(),
                conversion.skipped.len()
            );
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Logs go to stderr. `RUST_LOG` wins over the `-v`/`-q` derived level.
fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("apicheck={level}")));
    // A subscriber may already be installed when embedded; keep it.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Runs every configured suite, prints the report and maps it to an exit code.
pub fn run_suites(config: &RunConfig) -> miette::Result<ExitCode> {
    let files = suite_files(config)?;
    info!(files = files.len(), parallel = config.parallel, "starting run");

    let transport = HttpTransport::new()?;
    let orchestrator = Orchestrator::new(&transport).with_timeout(config.timeout);
    cancel_on_interrupt(orchestrator.cancel_flag());
    let suites = orchestrator.run_files(&files, config.parallel);
    if orchestrator.cancel_flag().load(Ordering::SeqCst) {
        warn!("run interrupted; tests that had not started are reported as cancelled");
    }

    let report = RunReport::from_suites(&suites);
    output::print_report(&report, config).into_diagnostic()?;

    Ok(if report.summary().success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// Ctrl-C lets the running test finish, then cancels the rest so the report
/// still covers every test. A second Ctrl-C exits at once.
fn cancel_on_interrupt(cancel: Arc<AtomicBool>) {
    let installed = ctrlc::set_handler(move || {
        if cancel.swap(true, Ordering::SeqCst) {
            std::process::exit(130);
        }
    });
    if let Err(err) = installed {
        warn!(error = %err, "could not install the interrupt handler");
    }
}

fn suite_files(config: &RunConfig) -> Result<Vec<PathBuf>, miette::Report> {
    if !config.files.is_empty() {
        if let Some(missing) = config.files.iter().find(|file| !file.is_file()) {
            return Err(CliError::MissingFile {
                path: missing.clone(),
            }
            .into());
        }
        return Ok(config.files.clone());
    }

    let files = discover_suite_files(&config.dir, config.recursive)?;
    if files.is_empty() {
        return Err(CliError::NoSuites {
            dir: config.dir.clone(),
        }
        .into());
    }
    Ok(files)
}
