// src/hooks/command.rs

//! User shell commands run at lifecycle points (`before_backup`,
//! `on_error`, ...).

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, info};

use crate::config::model::Umask;
use crate::errors::Result;
use crate::exec::{CommandRunner, CommandSpec};
use crate::system::UmaskGuard;
use crate::types::LogLevel;

/// Placeholders the engine expands itself; passed through without a warning.
const BORG_PLACEHOLDERS: [&str; 12] = [
    "{hostname}",
    "{fqdn}",
    "{reverse-fqdn}",
    "{now}",
    "{utcnow}",
    "{unixtime}",
    "{user}",
    "{pid}",
    "{borgversion}",
    "{borgmajor}",
    "{borgminor}",
    "{borgpatch}",
];

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\w+\}").expect("placeholder pattern is valid"));

/// `{name}` placeholders left in `command` that nothing will expand.
fn unsupported_placeholders(command: &str) -> Vec<&str> {
    PLACEHOLDER
        .find_iter(command)
        .map(|found| found.as_str())
        .filter(|placeholder| !BORG_PLACEHOLDERS.contains(placeholder))
        .collect()
}

/// Replace `{name}` with the shell-quoted context value. Unknown
/// placeholders stay as they are.
pub fn interpolate_context(description: &str, command: &str, context: &[(&str, &str)]) -> String {
    let mut command = command.to_string();
    for (name, value) in context {
        command = command.replace(&format!("{{{name}}}"), &shell_words::quote(value));
    }

    for unsupported in unsupported_placeholders(&command) {
        tracing::warn!("Variable \"{unsupported}\" is not supported in the {description} hook");
    }
    command
}

/// Run each of `commands` through the shell, in order.
///
/// Output of `on-error` hooks is logged at ERROR, everything else at
/// WARNING. A soft failure is logged and handed back to the caller, which
/// ends its scope quietly; any other failure is returned as-is.
#[allow(clippy::too_many_arguments)]
pub async fn execute_hook(
    runner: &dyn CommandRunner,
    commands: &[String],
    umask: Option<Umask>,
    config_filename: &Path,
    description: &str,
    dry_run: bool,
    context: &[(&str, &str)],
) -> Result<()> {
    if commands.is_empty() {
        debug!(
            "{}: No commands to run for {description} hook",
            config_filename.display()
        );
        return Ok(());
    }

    let dry_run_label = if dry_run {
        " (dry run; not actually running hooks)"
    } else {
        ""
    };
    if commands.len() == 1 {
        info!(
            "{}: Running command for {description} hook{dry_run_label}",
            config_filename.display()
        );
    } else {
        info!(
            "{}: Running {} commands for {description} hook{dry_run_label}",
            config_filename.display(),
            commands.len()
        );
    }
    if dry_run {
        return Ok(());
    }

    let output_log_level = if description == "on-error" {
        LogLevel::Error
    } else {
        LogLevel::Warning
    };

    let _umask = umask.map(UmaskGuard::set);
    for command in commands {
        let command = interpolate_context(description, command, context);
        let spec = CommandSpec::shell(command).output_log_level(output_log_level);
        if let Err(err) = runner.execute(&spec).await {
            if err.is_soft_failure() {
                LogLevel::Info.log(&format!(
                    "{}: {description} hook requested a soft failure; skipping remaining work",
                    config_filename.display()
                ));
            } else {
                output_log_level.log(&format!(
                    "{}: Error running {description} hook: {err}",
                    config_filename.display()
                ));
            }
            return Err(err);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::RealRunner;
    use std::path::PathBuf;

    #[test]
    fn context_values_are_shell_quoted() {
        let command = interpolate_context(
            "on-error",
            "notify {repository} {error}",
            &[("repository", "/mnt/backup"), ("error", "it's broken")],
        );
        assert_eq!(command, "notify /mnt/backup 'it'\\''s broken'");
    }

    #[test]
    fn unknown_placeholders_are_kept() {
        let command = interpolate_context("before backup", "echo {hostname} {nope}", &[]);
        assert_eq!(command, "echo {hostname} {nope}");
        assert_eq!(unsupported_placeholders(&command), vec!["{nope}"]);
    }

    #[tokio::test]
    async fn empty_and_dry_run_hooks_do_nothing() {
        let runner = RealRunner::new();
        let config = PathBuf::from("test.yaml");

        execute_hook(&runner, &[], None, &config, "before backup", false, &[])
            .await
            .unwrap();
        execute_hook(
            &runner,
            &["exit 1".to_string()],
            None,
            &config,
            "before backup",
            true,
            &[],
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn soft_failure_is_propagated_for_the_caller() {
        let runner = RealRunner::new();
        let err = execute_hook(
            &runner,
            &["exit 75".to_string(), "exit 1".to_string()],
            None,
            &PathBuf::from("test.yaml"),
            "before backup",
            false,
            &[],
        )
        .await
        .unwrap_err();
        assert!(err.is_soft_failure());
    }

    #[tokio::test]
    async fn failing_command_stops_the_hook() {
        let runner = RealRunner::new();
        let err = execute_hook(
            &runner,
            &["echo oops >&2; exit 2".to_string()],
            None,
            &PathBuf::from("test.yaml"),
            "after backup",
            false,
            &[],
        )
        .await
        .unwrap_err();
        assert_eq!(err.output(), Some("oops"));
    }
}
