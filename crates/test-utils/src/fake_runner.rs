use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use borgkeeper::errors::Result;
use borgkeeper::exec::exit_code::check_exit_code;
use borgkeeper::exec::{BoxFuture, CommandRunner, CommandSpec, ProcessHandle};

/// Scripted reply for commands matching a substring.
struct Rule {
    needle: String,
    exit_code: i32,
    stdout: String,
    /// `None` means the rule never runs out.
    remaining: Option<usize>,
}

/// A fake command runner that:
/// - records every command it is asked to run, as one space-joined line
/// - answers with the first scripted rule whose substring matches, or
///   exit code 0 with no output
/// - applies the real exit code policy, so 75 is a soft failure and engine
///   warnings are tolerated exactly as in production
#[derive(Clone, Default)]
pub struct FakeRunner {
    rules: Arc<Mutex<Vec<Rule>>>,
    calls: Arc<Mutex<Vec<String>>>,
    environments: Arc<Mutex<Vec<BTreeMap<String, String>>>>,
}

impl FakeRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Commands containing `needle` exit with `exit_code` and print `stdout`.
    pub fn respond(&self, needle: &str, exit_code: i32, stdout: &str) -> &Self {
        self.push_rule(needle, exit_code, stdout, None)
    }

    /// Like [`FakeRunner::respond`], but only for the next `times` matches.
    pub fn respond_times(&self, needle: &str, times: usize, exit_code: i32, stdout: &str) -> &Self {
        self.push_rule(needle, exit_code, stdout, Some(times))
    }

    fn push_rule(&self, needle: &str, exit_code: i32, stdout: &str, remaining: Option<usize>) -> &Self {
        self.rules.lock().unwrap().push(Rule {
            needle: needle.to_string(),
            exit_code,
            stdout: stdout.to_string(),
            remaining,
        });
        self
    }

    /// Every command run so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Commands run so far that contain `needle`.
    pub fn calls_containing(&self, needle: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|call| call.contains(needle))
            .collect()
    }

    /// Extra environment of the first command containing `needle`.
    pub fn environment_of(&self, needle: &str) -> Option<BTreeMap<String, String>> {
        let position = self.calls().iter().position(|call| call.contains(needle))?;
        self.environments.lock().unwrap().get(position).cloned()
    }

    fn record(&self, spec: &CommandSpec) -> (i32, String) {
        let line = spec.argv.join(" ");
        self.calls.lock().unwrap().push(line.clone());
        self.environments.lock().unwrap().push(spec.extra_env.clone());

        let mut rules = self.rules.lock().unwrap();
        for rule in rules.iter_mut() {
            if !line.contains(&rule.needle) || rule.remaining == Some(0) {
                continue;
            }
            if let Some(remaining) = rule.remaining.as_mut() {
                *remaining -= 1;
            }
            return (rule.exit_code, rule.stdout.clone());
        }
        (0, String::new())
    }

    fn run(&self, spec: &CommandSpec) -> Result<String> {
        let (exit_code, stdout) = self.record(spec);
        check_exit_code(
            &spec.display(),
            spec.program(),
            exit_code,
            spec.exit_codes.as_ref(),
            &stdout,
        )?;
        Ok(stdout)
    }
}

impl CommandRunner for FakeRunner {
    fn execute<'a>(&'a self, spec: &'a CommandSpec) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move { self.run(spec).map(|_| ()) })
    }

    fn capture<'a>(&'a self, spec: &'a CommandSpec) -> BoxFuture<'a, Result<String>> {
        Box::pin(async move { self.run(spec) })
    }

    fn spawn(&self, spec: &CommandSpec) -> Result<ProcessHandle> {
        let (exit_code, stdout) = self.record(spec);
        Ok(ProcessHandle::exited(spec, exit_code, stdout))
    }

    fn execute_with_processes<'a>(
        &'a self,
        spec: &'a CommandSpec,
        processes: Vec<ProcessHandle>,
        _pipe_stdin: bool,
    ) -> BoxFuture<'a, Result<Option<String>>> {
        Box::pin(async move {
            let stdout = self.run(spec)?;
            for process in processes {
                process.wait().await?;
            }
            Ok(spec.capture.then_some(stdout))
        })
    }
}
