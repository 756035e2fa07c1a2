// src/logging.rs

//! Logging setup for `borgkeeper` using `tracing` + `tracing-subscriber`.
//!
//! Priority for determining the console log level:
//! 1. `--verbosity` CLI flag (if provided)
//! 2. `BORGKEEPER_LOG` environment variable (e.g. "info", "debug")
//! 3. default to `info`
//!
//! Logs are sent to STDERR so that stdout carries nothing but the JSON
//! results array. `--log-file` adds a second, uncoloured sink.

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, Layer};

/// Initialise the global logging subscriber.
///
/// Safe to call once at startup.
pub fn init_logging(
    verbosity: Option<i8>,
    log_file: Option<&Path>,
    log_file_verbosity: Option<i8>,
) -> Result<()> {
    let console_level = match verbosity {
        Some(v) => level_from_verbosity(v),
        None => std::env::var("BORGKEEPER_LOG")
            .ok()
            .and_then(|s| parse_level_str(&s))
            .unwrap_or(LevelFilter::INFO),
    };

    let console = fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(console_level);

    let file = match log_file {
        Some(path) => {
            let handle = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("opening log file {}", path.display()))?;
            let level = log_file_verbosity
                .map(level_from_verbosity)
                .unwrap_or(LevelFilter::INFO);
            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_target(true)
                    .with_writer(Mutex::new(handle))
                    .with_filter(level),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(console)
        .with(file)
        .try_init()
        .context("installing tracing subscriber")?;

    Ok(())
}

/// Map the `-2..=2` verbosity scale onto a tracing filter.
pub fn level_from_verbosity(verbosity: i8) -> LevelFilter {
    match verbosity {
        i8::MIN..=-2 => LevelFilter::OFF,
        -1 => LevelFilter::ERROR,
        0 => LevelFilter::INFO,
        1 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    }
}

fn parse_level_str(s: &str) -> Option<LevelFilter> {
    match s.trim().to_lowercase().as_str() {
        "off" => Some(LevelFilter::OFF),
        "error" => Some(LevelFilter::ERROR),
        "warn" | "warning" => Some(LevelFilter::WARN),
        "info" => Some(LevelFilter::INFO),
        "debug" => Some(LevelFilter::DEBUG),
        "trace" => Some(LevelFilter::TRACE),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_scale_maps_to_filters() {
        assert_eq!(level_from_verbosity(-2), LevelFilter::OFF);
        assert_eq!(level_from_verbosity(-1), LevelFilter::ERROR);
        assert_eq!(level_from_verbosity(0), LevelFilter::INFO);
        assert_eq!(level_from_verbosity(1), LevelFilter::DEBUG);
        assert_eq!(level_from_verbosity(2), LevelFilter::TRACE);
    }

    #[test]
    fn env_level_strings() {
        assert_eq!(parse_level_str(" Debug "), Some(LevelFilter::DEBUG));
        assert_eq!(parse_level_str("warning"), Some(LevelFilter::WARN));
        assert_eq!(parse_level_str("loud"), None);
    }
}
