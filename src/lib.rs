//! treemerge - Directory tree reconciliation and deduplication
//!
//! Compares two directory trees by file name or by content (BLAKE3), reports
//! duplicates and files unique to each side, and can write a single merged
//! tree that keeps one copy of every logically distinct file.

pub mod actions;
pub mod cli;
pub mod config;
pub mod duplicates;
pub mod engine;
pub mod error;
pub mod logging;
pub mod output;
pub mod progress;
pub mod report;
pub mod scanner;
pub mod signal;
pub mod warning;

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;

use crate::actions::{CompletionStatus, MaterializeSummary};
use crate::cli::{Cli, Commands, FormatArg};
use crate::config::Config;
use crate::engine::{Engine, Reconciliation};
use crate::error::ExitCode;
use crate::output::{JsonOutput, TextOutput};
use crate::progress::{Progress, ProgressCallback};
use crate::signal::{CancelToken, Outcome};

/// Run the application for parsed arguments.
///
/// # Errors
///
/// Returns an error for configuration problems and for fatal engine failures
/// (missing roots, unusable or busy output). Use [`ExitCode::for_error`] to map
/// it to an exit code.
pub fn run_app(cli: Cli) -> anyhow::Result<ExitCode> {
    logging::init_logging(cli.verbose, cli.quiet);
    log::debug!("Log level: {}", logging::current_level_name());

    let mut config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;
    let token = signal::install_handler().context("Failed to set up Ctrl+C handling")?;
    let progress: Arc<dyn ProgressCallback> = Arc::new(Progress::new(cli.quiet));

    match cli.command {
        Commands::Compare(args) => {
            args.apply_to(&mut config);
            let engine = build_engine(&config, token, progress);

            let Some(rec) = reconcile(&engine, &config, &args.dir_a, &args.dir_b)? else {
                return Ok(ExitCode::Interrupted);
            };

            let code = if rec.has_warnings() {
                ExitCode::PartialSuccess
            } else if !rec.report.has_duplicates() {
                ExitCode::NoDuplicates
            } else {
                ExitCode::Success
            };
            render(args.format, &rec, None, code)?;
            Ok(code)
        }
        Commands::Merge(args) => {
            args.apply_to(&mut config);
            let engine = build_engine(&config, token, progress);

            let dirs = &args.compare;
            let Some(rec) = reconcile(&engine, &config, &dirs.dir_a, &dirs.dir_b)? else {
                return Ok(ExitCode::Interrupted);
            };

            let summary = match engine.materialize(&rec, &args.output, &config.policy())? {
                Outcome::Completed(summary) => summary,
                Outcome::Cancelled => {
                    log::warn!("Merge interrupted, partial output removed");
                    return Ok(ExitCode::Interrupted);
                }
            };

            let code = if rec.has_warnings() || summary.status() != CompletionStatus::Clean {
                ExitCode::PartialSuccess
            } else {
                ExitCode::Success
            };
            render(dirs.format, &rec, Some(&summary), code)?;
            Ok(code)
        }
    }
}

fn build_engine(config: &Config, token: CancelToken, progress: Arc<dyn ProgressCallback>) -> Engine {
    Engine::new(
        config
            .engine_config()
            .with_cancel_token(token)
            .with_progress_callback(progress),
    )
}

/// `None` when interrupted.
fn reconcile(
    engine: &Engine,
    config: &Config,
    dir_a: &Path,
    dir_b: &Path,
) -> anyhow::Result<Option<Reconciliation>> {
    match engine.reconcile(dir_a, dir_b, &config.reconcile_options())? {
        Outcome::Completed(rec) => Ok(Some(rec)),
        Outcome::Cancelled => {
            log::warn!("Comparison interrupted");
            Ok(None)
        }
    }
}

fn render(
    format: FormatArg,
    rec: &Reconciliation,
    materialized: Option<&MaterializeSummary>,
    code: ExitCode,
) -> anyhow::Result<()> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    match format {
        FormatArg::Json => {
            let mut output = JsonOutput::new(rec, code);
            if let Some(summary) = materialized {
                output = output.with_materialized(summary);
            }
            output
                .write_to(&mut out, true)
                .context("Failed to write JSON output")?;
        }
        FormatArg::Text => {
            let mut output = TextOutput::new(rec);
            if let Some(summary) = materialized {
                output = output.with_materialized(summary);
            }
            output
                .write_to(&mut out)
                .context("Failed to write output")?;
        }
    }

    out.flush().context("Failed to flush output")?;
    Ok(())
}
