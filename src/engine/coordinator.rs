// src/engine/coordinator.rs

//! Top of a run: load configurations, run each one's repositories through
//! the retry queue, ping monitors, and collect everything for the summary.
//!
//! Nothing here prints. The caller gets a [`RunSummary`] and decides how to
//! present it, which keeps the whole run testable with fake runners.

use std::path::PathBuf;

use serde_json::Value;
use tracing::{debug, info};

use crate::actions::config::run_config_action;
use crate::actions::create::validate_create_arguments;
use crate::borg::commands::make_umount_command;
use crate::cli::{ActionArguments, Arguments};
use crate::config::loader::{load_configurations, LoadedConfig};
use crate::config::paths::{collect_config_filenames, default_config_paths};
use crate::config::validate::guard_configuration_contains_repository;
use crate::engine::outcome::PipelineItem;
use crate::engine::pipeline::{run_actions, PipelineContext};
use crate::engine::queue::{FailureDecision, RetryQueue};
use crate::errors::{BorgkeeperError, Result};
use crate::exec::{CommandRunner, CommandSpec};
use crate::hooks::credential::{resolve_credentials, CredentialResolver};
use crate::hooks::execute_hook;
use crate::hooks::monitor::{configured_monitors, MonitorHook, PingTransport, State};
use crate::types::{Action, LogLevel, LogRecord};

/// External collaborators of a run.
#[derive(Clone, Copy)]
pub struct RunContext<'a> {
    pub runner: &'a dyn CommandRunner,
    pub transport: &'a dyn PingTransport,
    pub arguments: &'a Arguments,
}

/// Everything a run produced: summary records and JSON documents, in
/// order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    pub records: Vec<LogRecord>,
    pub json: Vec<Value>,
}

impl RunSummary {
    fn extend(&mut self, items: Vec<PipelineItem>) {
        for item in items {
            match item {
                PipelineItem::Log(record) => self.records.push(record),
                PipelineItem::Json(value) => self.json.push(value),
            }
        }
    }

    fn critical(&mut self, message: impl Into<String>) {
        self.records.push(LogRecord::new(LogLevel::Critical, message));
    }

    /// Record a failure plus the command output that came with it.
    fn critical_error(&mut self, message: impl Into<String>, err: &BorgkeeperError) {
        self.critical(message);
        self.records.extend(error_records(LogLevel::Critical, err));
    }

    pub fn max_level(&self) -> Option<LogLevel> {
        self.records.iter().map(|record| record.level).max()
    }

    pub fn has_critical(&self) -> bool {
        self.max_level() == Some(LogLevel::Critical)
    }

    /// `1` if anything critical happened, `0` otherwise.
    pub fn exit_code(&self) -> u8 {
        u8::from(self.has_critical())
    }
}

/// Records describing `err`: its message, then the command output if any.
fn error_records(level: LogLevel, err: &BorgkeeperError) -> Vec<LogRecord> {
    let mut records = vec![LogRecord::new(level, err.to_string())];
    if let Some(output) = err.output() {
        records.push(LogRecord::new(level, output));
    }
    records
}

/// Argument problems are reported as the bare message.
fn argument_message(err: &BorgkeeperError) -> String {
    match err {
        BorgkeeperError::InvalidArguments(message) => message.clone(),
        other => other.to_string(),
    }
}

fn error_items(level: LogLevel, message: String, err: &BorgkeeperError) -> Vec<PipelineItem> {
    std::iter::once(PipelineItem::log(level, message))
        .chain(error_records(level, err).into_iter().map(PipelineItem::Log))
        .collect()
}

/// Ping every monitor with `state`. Returns `false` when a monitor asked
/// for a soft failure and the configuration should stop quietly.
async fn ping_monitors(
    run: &RunContext<'_>,
    loaded: &LoadedConfig,
    monitors: &[Box<dyn MonitorHook>],
    state: State,
    failure_level: LogLevel,
    items: &mut Vec<PipelineItem>,
) -> bool {
    let dry_run = run.arguments.global.dry_run;
    for monitor in monitors {
        let result = if state == State::Start {
            match monitor.initialize(&loaded.path, dry_run) {
                Ok(()) => monitor.ping(run.transport, &loaded.path, state, dry_run).await,
                Err(err) => Err(err),
            }
        } else {
            monitor.ping(run.transport, &loaded.path, state, dry_run).await
        };

        match result {
            Ok(()) => {}
            Err(err) if err.is_soft_failure() => return false,
            Err(err) => items.extend(error_items(
                failure_level,
                format!("{}: Error pinging monitor", loaded.path.display()),
                &err,
            )),
        }
    }
    true
}

/// Run one configuration's repositories through the retry queue.
pub async fn run_configuration(
    run: &RunContext<'_>,
    loaded: &LoadedConfig,
    config_paths: &[PathBuf],
) -> Vec<PipelineItem> {
    let mut resolver = CredentialResolver::new(run.runner, &loaded.config);
    let resolved = match resolve_credentials(&mut resolver, &loaded.config).await {
        Ok(config) => LoadedConfig {
            path: loaded.path.clone(),
            config,
        },
        Err(err) => {
            return error_items(
                LogLevel::Critical,
                format!("{}: Error loading credentials", loaded.path.display()),
                &err,
            );
        }
    };
    let loaded = &resolved;
    let config = &loaded.config;
    let dry_run = run.arguments.global.dry_run;
    let mut items = Vec::new();

    let monitors = if run.arguments.uses_primary_action() {
        configured_monitors(config)
    } else {
        Vec::new()
    };
    if !ping_monitors(run, loaded, &monitors, State::Start, LogLevel::Error, &mut items).await {
        return items;
    }

    let pipeline = PipelineContext {
        runner: run.runner,
        arguments: run.arguments,
        config_paths,
    };
    let mut queue = RetryQueue::new(&config.repositories, config.retries, config.retry_wait);
    let mut encountered_error = false;

    while let Some((unit, delay)) = queue.next() {
        let label = unit.repository.display_label().to_string();
        if !delay.is_zero() {
            info!(
                "{label}: Retrying in {} seconds (attempt {}/{})",
                delay.as_secs(),
                unit.attempt,
                config.retries
            );
            tokio::time::sleep(delay).await;
        }

        match run_actions(pipeline, loaded, &unit.repository).await {
            Ok(json) => {
                items.push(PipelineItem::log(
                    LogLevel::Info,
                    format!("{label}: Successfully ran actions for repository"),
                ));
                items.extend(json.into_iter().map(PipelineItem::Json));
            }
            Err(err) if err.is_soft_failure() => {
                debug!("{label}: Soft failure; skipping the rest of this configuration");
                return items;
            }
            Err(err) => match queue.record_failure(unit) {
                FailureDecision::Retry { next_attempt } => items.extend(error_items(
                    LogLevel::Warning,
                    format!(
                        "{label}: Error running actions for repository; retrying ({next_attempt}/{})",
                        config.retries
                    ),
                    &err,
                )),
                FailureDecision::GiveUp => {
                    encountered_error = true;
                    items.extend(error_items(
                        LogLevel::Critical,
                        format!("{label}: Error running actions for repository"),
                        &err,
                    ));
                }
            },
        }
    }

    let (state, failure_level) = if encountered_error {
        (State::Fail, LogLevel::Error)
    } else {
        (State::Finish, LogLevel::Critical)
    };
    if !ping_monitors(run, loaded, &monitors, state, failure_level, &mut items).await {
        return items;
    }
    for monitor in &monitors {
        if let Err(err) = monitor.destroy(&loaded.path, dry_run) {
            items.extend(error_items(
                LogLevel::Error,
                format!("{}: Error tearing down monitor", loaded.path.display()),
                &err,
            ));
        }
    }

    items
}

/// Configuration files to load, from `--config` or the default locations.
fn config_filenames(arguments: &Arguments) -> Vec<PathBuf> {
    let explicit = !arguments.global.config_paths.is_empty();
    let paths = if explicit {
        arguments.global.config_paths.clone()
    } else {
        default_config_paths()
    };
    collect_config_filenames(&paths, explicit)
}

/// Run `before_everything` or `after_everything` across all configurations.
async fn run_everything_hooks(
    run: &RunContext<'_>,
    configs: &[LoadedConfig],
    before: bool,
) -> Result<()> {
    for loaded in configs {
        let (commands, description) = if before {
            (&loaded.config.hooks.before_everything, "before everything")
        } else {
            (&loaded.config.hooks.after_everything, "after everything")
        };
        execute_hook(
            run.runner,
            commands,
            loaded.config.umask,
            &loaded.path,
            description,
            run.arguments.global.dry_run,
            &[],
        )
        .await?;
    }
    Ok(())
}

/// Run every requested action across every configuration.
pub async fn run(run: &RunContext<'_>) -> RunSummary {
    let mut summary = RunSummary::default();
    let arguments = run.arguments;
    let global = &arguments.global;

    if let Some(ActionArguments::Create(create)) = arguments.get(Action::Create) {
        if let Err(err) = validate_create_arguments(create) {
            summary.critical(argument_message(&err));
            return summary;
        }
    }

    let filenames = config_filenames(arguments);

    if let Some(ActionArguments::Config(config_action)) = arguments.get(Action::Config) {
        match run_config_action(run.runner, global, config_action, &filenames).await {
            Ok(records) => summary.records.extend(records),
            Err(err) => summary.critical_error("Error running configuration action", &err),
        }
        return summary;
    }

    if filenames.is_empty() {
        summary.critical("No configuration files found; use --config or create one with `borgkeeper config generate`");
        return summary;
    }

    let configs = match load_configurations(&filenames, &global.overrides) {
        Ok((configs, records)) => {
            summary.records.extend(records);
            configs
        }
        Err(err) => {
            summary.critical_error("Error loading configuration", &err);
            return summary;
        }
    };
    let config_paths: Vec<PathBuf> = configs.iter().map(|loaded| loaded.path.clone()).collect();

    for (action, action_arguments) in &arguments.actions {
        if !action.runs_per_repository() {
            continue;
        }
        if let Err(err) =
            guard_configuration_contains_repository(action_arguments.repository(), &configs, *action)
        {
            summary.critical(argument_message(&err));
            return summary;
        }
    }

    let creating = arguments.has(Action::Create);
    if creating {
        if let Err(err) = run_everything_hooks(run, &configs, true).await {
            if !err.is_soft_failure() {
                summary.critical_error("Error running before everything hook", &err);
            }
            return summary;
        }
    }

    for loaded in &configs {
        debug!(config = %loaded.path.display(), "running configuration");
        let items = run_configuration(run, loaded, &config_paths).await;
        summary.extend(items);
    }

    if creating {
        if let Err(err) = run_everything_hooks(run, &configs, false).await {
            if !err.is_soft_failure() {
                summary.critical_error("Error running after everything hook", &err);
            }
        }
    }

    if let Some(ActionArguments::Umount(umount)) = arguments.get(Action::Umount) {
        let local_path = configs
            .first()
            .map(|loaded| loaded.config.local_path.clone())
            .unwrap_or_else(|| "borg".to_string());
        info!("Unmounting mount point {}", umount.mount_point.display());
        let argv = make_umount_command(&local_path, &umount.mount_point.display().to_string(), global);
        if let Err(err) = run.runner.execute(&CommandSpec::new(argv)).await {
            summary.critical_error("Error unmounting mount point", &err);
        }
    }

    summary
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_code_follows_critical_records() {
        let mut summary = RunSummary::default();
        summary.records.push(LogRecord::new(LogLevel::Warning, "retrying"));
        assert_eq!(summary.exit_code(), 0);
        assert_eq!(summary.max_level(), Some(LogLevel::Warning));

        summary.critical("/tmp/repo: Error running actions for repository");
        assert_eq!(summary.exit_code(), 1);
    }

    #[test]
    fn command_output_is_kept_with_the_error() {
        let err = BorgkeeperError::CommandFailed {
            command: "borg create".into(),
            exit_code: 2,
            output: "Repository does not exist".into(),
        };
        let records = error_records(LogLevel::Critical, &err);
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].message, "Repository does not exist");
    }

    #[test]
    fn argument_errors_are_reported_without_prefix() {
        let err = BorgkeeperError::InvalidArguments("Repository \"x\" not found".into());
        assert_eq!(argument_message(&err), "Repository \"x\" not found");

        let err = BorgkeeperError::ConfigError("bad".into());
        assert_eq!(argument_message(&err), "Configuration error: bad");
    }
}
