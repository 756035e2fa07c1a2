// src/engine/pipeline.rs

//! Everything requested for one repository of one configuration, in
//! canonical action order, wrapped in command hooks.

use std::path::PathBuf;

use serde_json::Value;
use tracing::debug;

use crate::actions::{run_action, ActionContext};
use crate::cli::Arguments;
use crate::config::loader::LoadedConfig;
use crate::config::model::{Hooks, Repository};
use crate::config::validate::repositories_match;
use crate::errors::Result;
use crate::exec::CommandRunner;
use crate::hooks::execute_hook;
use crate::types::Action;

/// Shared by every repository of a run.
#[derive(Clone, Copy)]
pub struct PipelineContext<'a> {
    pub runner: &'a dyn CommandRunner,
    pub arguments: &'a Arguments,
    /// Every loaded configuration file, stored in archives for bootstrap.
    pub config_paths: &'a [PathBuf],
}

/// Hook phase name plus its before/after commands, for actions that have
/// them.
fn hook_phase(hooks: &Hooks, action: Action) -> Option<(&'static str, &[String], &[String])> {
    let (name, before, after) = match action {
        Action::Create => ("backup", &hooks.before_backup, &hooks.after_backup),
        Action::Prune => ("prune", &hooks.before_prune, &hooks.after_prune),
        Action::Compact => ("compact", &hooks.before_compact, &hooks.after_compact),
        Action::Check => ("check", &hooks.before_check, &hooks.after_check),
        Action::Extract => ("extract", &hooks.before_extract, &hooks.after_extract),
        _ => return None,
    };
    Some((name, before.as_slice(), after.as_slice()))
}

/// Run the requested actions against `repository`.
///
/// A hard failure runs the `on_error` hook and is then returned for the
/// retry queue to handle. A soft failure is returned untouched.
pub async fn run_actions(
    pipeline: PipelineContext<'_>,
    loaded: &LoadedConfig,
    repository: &Repository,
) -> Result<Vec<Value>> {
    let label = repository.label.clone().unwrap_or_default();
    let context = [
        ("repository", repository.path.as_str()),
        ("repository_label", label.as_str()),
    ];

    let err = match run_hooks_and_actions(pipeline, loaded, repository, &context).await {
        Ok(json) => return Ok(json),
        Err(err) if err.is_soft_failure() => return Err(err),
        Err(err) => err,
    };

    let error = err.to_string();
    let error_context = [
        ("repository", repository.path.as_str()),
        ("repository_label", label.as_str()),
        ("error", error.as_str()),
        ("output", err.output().unwrap_or_default()),
    ];
    if let Err(hook_err) = execute_hook(
        pipeline.runner,
        &loaded.config.hooks.on_error,
        loaded.config.umask,
        &loaded.path,
        "on-error",
        pipeline.arguments.global.dry_run,
        &error_context,
    )
    .await
    {
        if hook_err.is_soft_failure() {
            return Err(hook_err);
        }
    }
    Err(err)
}

async fn run_hooks_and_actions(
    pipeline: PipelineContext<'_>,
    loaded: &LoadedConfig,
    repository: &Repository,
    context: &[(&str, &str)],
) -> Result<Vec<Value>> {
    let config = &loaded.config;
    let hooks = &config.hooks;
    let global = &pipeline.arguments.global;
    let log_prefix = repository.display_label();

    let action_context = ActionContext {
        runner: pipeline.runner,
        config,
        config_path: &loaded.path,
        config_paths: pipeline.config_paths,
        repository,
        global,
        log_prefix,
    };

    execute_hook(
        pipeline.runner,
        &hooks.before_actions,
        config.umask,
        &loaded.path,
        "before actions",
        global.dry_run,
        context,
    )
    .await?;

    let mut json = Vec::new();
    for (action, arguments) in &pipeline.arguments.actions {
        if !action.runs_per_repository() {
            continue;
        }
        if let Some(wanted) = arguments.repository() {
            if !repositories_match(repository, wanted) {
                debug!("{log_prefix}: Skipping {action}; --repository {wanted} doesn't match");
                continue;
            }
        }

        let phase = hook_phase(hooks, *action);
        if let Some((name, before, _)) = phase {
            execute_hook(
                pipeline.runner,
                before,
                config.umask,
                &loaded.path,
                &format!("before {name}"),
                global.dry_run,
                context,
            )
            .await?;
        }

        json.extend(run_action(action_context, arguments).await?);

        if let Some((name, _, after)) = phase {
            execute_hook(
                pipeline.runner,
                after,
                config.umask,
                &loaded.path,
                &format!("after {name}"),
                global.dry_run,
                context,
            )
            .await?;
        }
    }

    execute_hook(
        pipeline.runner,
        &hooks.after_actions,
        config.umask,
        &loaded.path,
        "after actions",
        global.dry_run,
        context,
    )
    .await?;

    Ok(json)
}
