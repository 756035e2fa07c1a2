// src/exec/command.rs

use std::io::ErrorKind;
use std::process::Stdio;

use tokio::process::Command;
use tokio::task::JoinSet;
use tracing::debug;

use crate::errors::{BorgkeeperError, Result};
use crate::exec::backend::{BoxFuture, CommandRunner, CommandSpec};
use crate::exec::process::ProcessHandle;

/// Runner backed by real OS processes via `tokio::process`.
#[derive(Debug, Default, Clone, Copy)]
pub struct RealRunner;

impl RealRunner {
    pub fn new() -> Self {
        Self
    }
}

/// Start `spec` with the given stdin; stdout and stderr are piped.
fn spawn_process(spec: &CommandSpec, stdin: Stdio) -> Result<ProcessHandle> {
    let mut cmd = if spec.shell {
        let mut c = Command::new("sh");
        c.arg("-c").arg(spec.argv.join(" "));
        c
    } else {
        let (program, args) = spec.argv.split_first().ok_or_else(|| {
            BorgkeeperError::InvalidArguments("cannot run an empty command".to_string())
        })?;
        let mut c = Command::new(program);
        c.args(args);
        c
    };

    cmd.envs(&spec.extra_env)
        .stdin(stdin)
        .stdout(if spec.inherit_stdout {
            Stdio::inherit()
        } else {
            Stdio::piped()
        })
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    if let Some(dir) = &spec.working_directory {
        cmd.current_dir(dir);
    }

    debug!(command = %spec.display(), "starting process");

    let child = cmd.spawn().map_err(|source| {
        if source.kind() == ErrorKind::NotFound {
            BorgkeeperError::CommandNotFound {
                command: spec.program().to_string(),
                source,
            }
        } else {
            BorgkeeperError::IoError(source)
        }
    })?;

    Ok(ProcessHandle::running(spec, child))
}

impl CommandRunner for RealRunner {
    fn execute<'a>(&'a self, spec: &'a CommandSpec) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move { spawn_process(spec, Stdio::null())?.wait().await })
    }

    fn capture<'a>(&'a self, spec: &'a CommandSpec) -> BoxFuture<'a, Result<String>> {
        Box::pin(async move {
            let output = spawn_process(spec, Stdio::null())?
                .wait_with_output(true)
                .await?;
            Ok(output.unwrap_or_default())
        })
    }

    fn spawn(&self, spec: &CommandSpec) -> Result<ProcessHandle> {
        spawn_process(spec, Stdio::null())
    }

    fn execute_with_processes<'a>(
        &'a self,
        spec: &'a CommandSpec,
        mut processes: Vec<ProcessHandle>,
        pipe_stdin: bool,
    ) -> BoxFuture<'a, Result<Option<String>>> {
        Box::pin(async move {
            let stdin = match processes.first_mut().filter(|_| pipe_stdin) {
                Some(source) => match source.take_stdout() {
                    Some(stdout) => stdout.try_into()?,
                    None => Stdio::null(),
                },
                None => Stdio::null(),
            };

            let main = spawn_process(spec, stdin)?;

            let capture = spec.capture;
            let mut waits = JoinSet::new();
            waits.spawn(async move { (true, main.wait_with_output(capture).await) });
            for process in processes {
                waits.spawn(async move { (false, process.wait_with_output(false).await) });
            }

            let mut first_error = None;
            let mut captured = None;
            while let Some(joined) = waits.join_next().await {
                let (is_main, result) = match joined {
                    Ok(joined) => joined,
                    Err(err) if err.is_cancelled() => continue,
                    Err(err) => return Err(BorgkeeperError::Other(err.into())),
                };
                match result {
                    Ok(output) if is_main => captured = output,
                    Ok(_) => {}
                    Err(err) => {
                        if first_error.is_none() {
                            // Dropping the aborted waits kills whichever
                            // children haven't been reaped yet.
                            waits.abort_all();
                            first_error = Some(err);
                        }
                    }
                }
            }

            match first_error {
                Some(err) => Err(err),
                None => Ok(captured),
            }
        })
    }
}
