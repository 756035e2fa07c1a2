// src/exec/process.rs

//! Handles for child processes started in the background.

use std::collections::VecDeque;
use std::os::unix::process::ExitStatusExt;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};
use tokio::process::{Child, ChildStdout};
use tokio::task::JoinHandle;

use crate::errors::{BorgkeeperError, Result};
use crate::exec::backend::CommandSpec;
use crate::exec::exit_code::{check_exit_code, ExitCodePolicy};
use crate::types::LogLevel;

/// Lines of output kept for error messages.
pub const ERROR_OUTPUT_MAX_LINE_COUNT: usize = 25;

enum ProcessState {
    Running {
        child: Child,
        stdout: Option<ChildStdout>,
        stderr: Option<JoinHandle<VecDeque<String>>>,
    },
    Exited {
        code: i32,
        stdout: String,
    },
}

/// A child process whose exit status hasn't been collected yet.
///
/// Dropping a running handle without waiting kills the child.
pub struct ProcessHandle {
    command: String,
    program: String,
    exit_codes: Option<ExitCodePolicy>,
    output_log_level: LogLevel,
    state: ProcessState,
}

impl ProcessHandle {
    /// Wrap a freshly spawned child; stderr starts draining immediately.
    pub(crate) fn running(spec: &CommandSpec, mut child: Child) -> Self {
        let stdout = child.stdout.take();
        let elevate = spec.exit_codes.is_none();
        let stderr = child
            .stderr
            .take()
            .map(|stderr| drain_lines(stderr, spec.output_log_level, elevate));

        Self {
            command: spec.display(),
            program: spec.program().to_string(),
            exit_codes: spec.exit_codes.clone(),
            output_log_level: spec.output_log_level,
            state: ProcessState::Running {
                child,
                stdout,
                stderr,
            },
        }
    }

    /// A handle for a process that already finished with `code`.
    ///
    /// Used by runners that don't start real processes.
    pub fn exited(spec: &CommandSpec, code: i32, stdout: impl Into<String>) -> Self {
        Self {
            command: spec.display(),
            program: spec.program().to_string(),
            exit_codes: spec.exit_codes.clone(),
            output_log_level: spec.output_log_level,
            state: ProcessState::Exited {
                code,
                stdout: stdout.into(),
            },
        }
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    /// OS process id, while the child is running.
    pub fn id(&self) -> Option<u32> {
        match &self.state {
            ProcessState::Running { child, .. } => child.id(),
            ProcessState::Exited { .. } => None,
        }
    }

    /// Take the child's stdout, e.g. to pipe it into another child.
    pub fn take_stdout(&mut self) -> Option<ChildStdout> {
        match &mut self.state {
            ProcessState::Running { stdout, .. } => stdout.take(),
            ProcessState::Exited { .. } => None,
        }
    }

    pub async fn wait(self) -> Result<()> {
        self.wait_with_output(false).await.map(|_| ())
    }

    /// Wait for exit and apply the exit code policy.
    ///
    /// With `capture`, stdout is returned instead of logged.
    pub async fn wait_with_output(self, capture: bool) -> Result<Option<String>> {
        let ProcessHandle {
            command,
            program,
            exit_codes,
            output_log_level,
            state,
        } = self;

        match state {
            ProcessState::Exited { code, stdout } => {
                check_exit_code(&command, &program, code, exit_codes.as_ref(), &stdout)?;
                Ok(capture.then_some(stdout))
            }
            ProcessState::Running {
                mut child,
                stdout,
                stderr,
            } => {
                let (captured, stdout_tail) = match stdout {
                    Some(mut out) if capture => {
                        let mut buffer = String::new();
                        let (read, status) =
                            tokio::join!(out.read_to_string(&mut buffer), child.wait());
                        read?;
                        (Some((buffer, status?)), None)
                    }
                    Some(out) => (None, Some(drain_lines(out, output_log_level, false))),
                    None => (None, None),
                };

                let (stdout_text, status) = match captured {
                    Some((buffer, status)) => (Some(buffer), status),
                    None => (None, child.wait().await?),
                };

                let mut tail = VecDeque::new();
                for reader in [stdout_tail, stderr].into_iter().flatten() {
                    let lines = reader
                        .await
                        .map_err(|e| BorgkeeperError::Other(e.into()))?;
                    tail.extend(lines);
                }
                while tail.len() > ERROR_OUTPUT_MAX_LINE_COUNT {
                    tail.pop_front();
                }
                let output = Vec::from(tail).join("\n");

                let code = status
                    .code()
                    .or_else(|| status.signal().map(|signal| -signal))
                    .unwrap_or(-1);
                check_exit_code(&command, &program, code, exit_codes.as_ref(), &output)?;
                Ok(stdout_text)
            }
        }
    }
}

/// Log each line of `reader` and keep the last few for error reporting.
///
/// With `elevate`, lines are logged at ERROR (or WARNING when they start
/// with "warning:"), since a non-engine command writing to stderr is
/// usually complaining.
fn drain_lines<R>(reader: R, level: LogLevel, elevate: bool) -> JoinHandle<VecDeque<String>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        let mut tail = VecDeque::new();

        while let Ok(Some(line)) = lines.next_line().await {
            let line = line.trim_end();
            if line.is_empty() {
                continue;
            }
            let line_level = if !elevate {
                level
            } else if line.to_lowercase().starts_with("warning:") {
                LogLevel::Warning
            } else {
                LogLevel::Error
            };
            line_level.log(line);

            tail.push_back(line.to_string());
            if tail.len() > ERROR_OUTPUT_MAX_LINE_COUNT {
                tail.pop_front();
            }
        }
        tail
    })
}
