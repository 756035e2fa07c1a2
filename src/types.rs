// src/types.rs

//! Small shared value types: log levels and records, action names.

use std::fmt;
use std::str::FromStr;

use tracing::{debug, error, info, warn};

/// Severity of a log record flowing through the pipeline.
///
/// Ordered from least to most severe so the summary can pick the maximum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl LogLevel {
    /// Emit `message` through `tracing` at this level.
    pub fn log(self, message: &str) {
        match self {
            LogLevel::Debug => debug!("{message}"),
            LogLevel::Info => info!("{message}"),
            LogLevel::Warning => warn!("{message}"),
            LogLevel::Error => error!("{message}"),
            LogLevel::Critical => error!(critical = true, "{message}"),
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warning => "WARNING",
            LogLevel::Error => "ERROR",
            LogLevel::Critical => "CRITICAL",
        };
        f.write_str(name)
    }
}

/// A log record carried as a value until the run summary is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    pub level: LogLevel,
    pub message: String,
}

impl LogRecord {
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
        }
    }

    pub fn emit(&self) {
        self.level.log(&self.message);
    }
}

/// Every action the CLI understands.
///
/// Declaration order is the canonical execution order within a repository;
/// `Ord` is derived so that a `BTreeMap<Action, _>` iterates in that order
/// no matter how the actions were given on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Action {
    RepoCreate,
    Transfer,
    Prune,
    Compact,
    Create,
    Check,
    Extract,
    ExportTar,
    Mount,
    Restore,
    RepoList,
    List,
    RepoInfo,
    Info,
    BreakLock,
    Borg,
    Umount,
    Config,
}

impl Action {
    pub fn as_str(self) -> &'static str {
        match self {
            Action::RepoCreate => "repo-create",
            Action::Transfer => "transfer",
            Action::Prune => "prune",
            Action::Compact => "compact",
            Action::Create => "create",
            Action::Check => "check",
            Action::Extract => "extract",
            Action::ExportTar => "export-tar",
            Action::Mount => "mount",
            Action::Restore => "restore",
            Action::RepoList => "repo-list",
            Action::List => "list",
            Action::RepoInfo => "repo-info",
            Action::Info => "info",
            Action::BreakLock => "break-lock",
            Action::Borg => "borg",
            Action::Umount => "umount",
            Action::Config => "config",
        }
    }

    /// Actions that drive monitor pings.
    pub fn is_primary(self) -> bool {
        matches!(
            self,
            Action::Create | Action::Prune | Action::Compact | Action::Check
        )
    }

    /// Actions that run per repository inside the pipeline.
    pub fn runs_per_repository(self) -> bool {
        !matches!(self, Action::Umount | Action::Config)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "repo-create" | "rcreate" | "init" => Ok(Action::RepoCreate),
            "transfer" => Ok(Action::Transfer),
            "prune" => Ok(Action::Prune),
            "compact" => Ok(Action::Compact),
            "create" => Ok(Action::Create),
            "check" => Ok(Action::Check),
            "extract" => Ok(Action::Extract),
            "export-tar" => Ok(Action::ExportTar),
            "mount" => Ok(Action::Mount),
            "restore" => Ok(Action::Restore),
            "repo-list" | "rlist" => Ok(Action::RepoList),
            "list" => Ok(Action::List),
            "repo-info" | "rinfo" => Ok(Action::RepoInfo),
            "info" => Ok(Action::Info),
            "break-lock" => Ok(Action::BreakLock),
            "borg" => Ok(Action::Borg),
            "umount" => Ok(Action::Umount),
            "config" => Ok(Action::Config),
            other => Err(format!("unknown action: {other}")),
        }
    }
}
