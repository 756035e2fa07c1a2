// src/errors.rs

//! Crate-wide error aliases and helpers.

use thiserror::Error;

/// Exit code a hook or child command uses to request a soft failure.
pub const SOFT_FAIL_EXIT_CODE: i32 = 75;

#[derive(Error, Debug)]
pub enum BorgkeeperError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("YAML parsing error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Command '{command}' returned non-zero exit status {exit_code}")]
    CommandFailed {
        command: String,
        exit_code: i32,
        output: String,
    },

    #[error("Command '{command}' exited with soft failure status")]
    SoftFailure { command: String },

    #[error("Cannot run '{command}': {source}")]
    CommandNotFound {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{0}")]
    Restore(String),

    #[error("{0}")]
    Credential(String),

    #[error("{monitor}: {message}")]
    Monitor { monitor: String, message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl BorgkeeperError {
    /// Whether this error should end the enclosing scope cleanly rather than
    /// count as a failure.
    pub fn is_soft_failure(&self) -> bool {
        matches!(self, BorgkeeperError::SoftFailure { .. })
    }

    /// Captured child output, if the error came from a command.
    pub fn output(&self) -> Option<&str> {
        match self {
            BorgkeeperError::CommandFailed { output, .. } if !output.is_empty() => {
                Some(output.as_str())
            }
            _ => None,
        }
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, BorgkeeperError>;
