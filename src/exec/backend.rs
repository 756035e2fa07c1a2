// src/exec/backend.rs

//! Pluggable command runner abstraction.
//!
//! Everything that starts a child process goes through a [`CommandRunner`].
//! Production code uses [`crate::exec::RealRunner`]; tests provide a fake
//! that records argument vectors and replays scripted exit codes, so the
//! whole pipeline can run without touching the engine or a database.

use std::collections::BTreeMap;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;

use crate::errors::Result;
use crate::exec::exit_code::ExitCodePolicy;
use crate::exec::process::ProcessHandle;
use crate::types::LogLevel;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

const SECRET_ENV_PREFIXES: [&str; 4] = ["BORG_", "PG", "MARIADB_", "MYSQL_"];
const MAX_LOGGED_COMMAND_LENGTH: usize = 1000;

/// Everything needed to start one child process.
#[derive(Debug, Clone)]
pub struct CommandSpec {
    /// Program and arguments. For shell commands, a single string.
    pub argv: Vec<String>,
    pub shell: bool,
    /// Set only in the child; the orchestrator's own environment is untouched.
    pub extra_env: BTreeMap<String, String>,
    pub working_directory: Option<PathBuf>,
    /// Level at which output lines are re-emitted.
    pub output_log_level: LogLevel,
    pub exit_codes: Option<ExitCodePolicy>,
    /// Return stdout instead of logging it.
    pub capture: bool,
    /// Hand the child our own stdout, e.g. for a tarball streamed to `-`.
    pub inherit_stdout: bool,
}

impl CommandSpec {
    pub fn new<I, S>(argv: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            argv: argv.into_iter().map(Into::into).collect(),
            shell: false,
            extra_env: BTreeMap::new(),
            working_directory: None,
            output_log_level: LogLevel::Info,
            exit_codes: None,
            capture: false,
            inherit_stdout: false,
        }
    }

    /// A command string run through `sh -c`.
    pub fn shell(command: impl Into<String>) -> Self {
        Self {
            shell: true,
            ..Self::new([command.into()])
        }
    }

    pub fn with_env(mut self, extra_env: BTreeMap<String, String>) -> Self {
        self.extra_env.extend(extra_env);
        self
    }

    pub fn working_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_directory = Some(dir.into());
        self
    }

    pub fn output_log_level(mut self, level: LogLevel) -> Self {
        self.output_log_level = level;
        self
    }

    pub fn exit_codes(mut self, policy: ExitCodePolicy) -> Self {
        self.exit_codes = Some(policy);
        self
    }

    pub fn capture_output(mut self) -> Self {
        self.capture = true;
        self
    }

    pub fn inherit_stdout(mut self) -> Self {
        self.inherit_stdout = true;
        self
    }

    /// First word of the command, used for exit code interpretation.
    pub fn program(&self) -> &str {
        let first = self.argv.first().map(String::as_str).unwrap_or_default();
        if self.shell {
            first.split(' ').next().unwrap_or_default()
        } else {
            first
        }
    }

    /// Loggable rendering with secrets masked.
    pub fn display(&self) -> String {
        let tokens: Vec<&str> = if self.shell {
            self.argv.iter().flat_map(|a| a.split(' ')).collect()
        } else {
            self.argv.iter().map(String::as_str).collect()
        };
        format_command(&tokens, &self.extra_env)
    }
}

/// Render a command for logging: secret environment values and the value
/// after `--password` become `***`, and very long commands are shortened.
pub fn format_command(argv: &[&str], extra_env: &BTreeMap<String, String>) -> String {
    let mut parts: Vec<String> = extra_env
        .iter()
        .map(|(key, value)| {
            if SECRET_ENV_PREFIXES.iter().any(|prefix| key.starts_with(prefix)) {
                format!("{key}=***")
            } else {
                format!("{key}={value}")
            }
        })
        .collect();

    let mut mask_next = false;
    for arg in argv {
        if mask_next {
            parts.push("***".to_string());
            mask_next = false;
        } else if arg.starts_with("--password=") {
            parts.push("--password=***".to_string());
        } else {
            mask_next = *arg == "--password";
            parts.push((*arg).to_string());
        }
    }

    let joined = parts.join(" ");
    if joined.chars().count() > MAX_LOGGED_COMMAND_LENGTH {
        let mut short: String = joined.chars().take(MAX_LOGGED_COMMAND_LENGTH).collect();
        short.push_str(" ...");
        short
    } else {
        joined
    }
}

/// Trait abstracting how child processes are run.
///
/// Every method applies the same exit code policy: `0` succeeds, `75` is
/// [`crate::errors::BorgkeeperError::SoftFailure`], engine warnings are
/// logged and tolerated, anything else is
/// [`crate::errors::BorgkeeperError::CommandFailed`] carrying the tail of the
/// child's output.
pub trait CommandRunner: Send + Sync {
    /// Run to completion, re-emitting output lines at the spec's level.
    fn execute<'a>(&'a self, spec: &'a CommandSpec) -> BoxFuture<'a, Result<()>>;

    /// Run to completion and return stdout.
    fn capture<'a>(&'a self, spec: &'a CommandSpec) -> BoxFuture<'a, Result<String>>;

    /// Start in the background; stdout stays available for piping.
    fn spawn(&self, spec: &CommandSpec) -> Result<ProcessHandle>;

    /// Run `spec` while `processes` keep running alongside it, then wait on
    /// all of them. With `pipe_stdin`, the first process's stdout becomes the
    /// child's stdin. If anything fails, the rest are killed.
    ///
    /// Returns stdout when the spec asks for capture.
    fn execute_with_processes<'a>(
        &'a self,
        spec: &'a CommandSpec,
        processes: Vec<ProcessHandle>,
        pipe_stdin: bool,
    ) -> BoxFuture<'a, Result<Option<String>>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passwords_and_secret_env_are_masked() {
        let mut env = BTreeMap::new();
        env.insert("BORG_PASSPHRASE".to_string(), "hunter2".to_string());
        env.insert("PGPASSWORD".to_string(), "pw".to_string());
        env.insert("LANG".to_string(), "C".to_string());

        let spec = CommandSpec::new(["mongodump", "--username", "u", "--password", "pw", "--archive"])
            .with_env(env);
        let shown = spec.display();

        assert!(shown.contains("BORG_PASSPHRASE=***"));
        assert!(shown.contains("PGPASSWORD=***"));
        assert!(shown.contains("LANG=C"));
        assert!(shown.contains("--password *** --archive"));
        assert!(!shown.contains("hunter2"));
        assert!(!shown.contains(" pw "));
    }

    #[test]
    fn long_commands_are_truncated() {
        let long = "x".repeat(3000);
        let shown = format_command(&["echo", &long], &BTreeMap::new());
        assert!(shown.ends_with(" ..."));
        assert_eq!(shown.chars().count(), MAX_LOGGED_COMMAND_LENGTH + 4);
    }

    #[test]
    fn shell_program_is_first_word() {
        let spec = CommandSpec::shell("pg_dump --format custom users > /tmp/fifo");
        assert_eq!(spec.program(), "pg_dump");
        assert!(spec.shell);

        let spec = CommandSpec::new(["borg", "create"]);
        assert_eq!(spec.program(), "borg");
    }
}
