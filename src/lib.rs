// src/lib.rs

pub mod actions;
pub mod borg;
pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod hooks;
pub mod logging;
pub mod signals;
pub mod system;
pub mod types;

use std::io::Write;
use std::process::ExitCode;

use anyhow::{Context, Result};
use tracing::debug;

use crate::cli::Arguments;
use crate::engine::{RunContext, RunSummary};
use crate::exec::RealRunner;
use crate::hooks::monitor::HttpTransport;
use crate::types::{LogLevel, LogRecord};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - the real process runner and HTTP transport
/// - the run coordinator
/// - JSON output on stdout and the summary block on stderr
pub async fn run(arguments: Arguments) -> Result<ExitCode> {
    let runner = RealRunner::new();
    let transport = HttpTransport::new().context("building HTTP client for monitors")?;

    let summary = engine::run(&RunContext {
        runner: &runner,
        transport: &transport,
        arguments: &arguments,
    })
    .await;

    write_json(&summary)?;
    log_summary(&summary);

    debug!(exit_code = summary.exit_code(), "run complete");
    Ok(ExitCode::from(summary.exit_code()))
}

/// All JSON documents as a single array; nothing at all when there are none.
fn write_json(summary: &RunSummary) -> Result<()> {
    if summary.json.is_empty() {
        return Ok(());
    }
    let mut stdout = std::io::stdout().lock();
    serde_json::to_writer(&mut stdout, &summary.json)?;
    writeln!(stdout)?;
    Ok(())
}

/// Emit the `summary:` block at the most severe level seen.
fn log_summary(summary: &RunSummary) {
    let Some(level) = summary.max_level() else {
        return;
    };
    let header_level = level.max(LogLevel::Info);
    LogRecord::new(header_level, "summary:").emit();
    for record in &summary.records {
        record.emit();
    }
    if summary.has_critical() {
        LogRecord::new(
            header_level,
            "Need some help? Run with --verbosity 2 for the full engine output, or see borgkeeper --help.",
        )
        .emit();
    }
}
