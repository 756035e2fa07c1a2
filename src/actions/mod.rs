// src/actions/mod.rs

//! Per-repository action handlers.
//!
//! Each handler builds engine commands with [`crate::borg::commands`] and
//! runs them through the [`CommandRunner`] in its [`ActionContext`]. The
//! ones that produce JSON return the parsed documents; everything else
//! returns an empty list.

pub mod archive;
pub mod check;
pub mod compact;
pub mod config;
pub mod create;
pub mod extract;
pub mod info;
pub mod json;
pub mod prune;
pub mod repository;
pub mod restore;

use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::borg::make_environment;
use crate::cli::{ActionArguments, GlobalArguments};
use crate::config::model::{Configuration, Repository};
use crate::errors::Result;
use crate::exec::{CommandRunner, CommandSpec, ExitCodePolicy};
use crate::hooks::data_source::DataSourceContext;

/// Everything an action needs to act on one repository of one
/// configuration.
#[derive(Clone, Copy)]
pub struct ActionContext<'a> {
    pub runner: &'a dyn CommandRunner,
    pub config: &'a Configuration,
    pub config_path: &'a Path,
    /// Every loaded configuration file, stored in archives for bootstrap.
    pub config_paths: &'a [PathBuf],
    pub repository: &'a Repository,
    pub global: &'a GlobalArguments,
    pub log_prefix: &'a str,
}

impl<'a> ActionContext<'a> {
    pub fn repository_path(&self) -> &'a str {
        &self.repository.path
    }

    /// Wrap an engine argv with the configured environment and exit code
    /// policy.
    pub fn engine_command(&self, argv: Vec<String>) -> CommandSpec {
        CommandSpec::new(argv)
            .with_env(make_environment(self.config))
            .exit_codes(ExitCodePolicy::from_config(self.config))
    }

    pub fn data_sources(&self) -> DataSourceContext<'a> {
        DataSourceContext {
            runner: self.runner,
            config: self.config,
            log_prefix: self.log_prefix,
            dry_run: self.global.dry_run,
        }
    }
}

/// Run one action against the context's repository.
pub async fn run_action(ctx: ActionContext<'_>, arguments: &ActionArguments) -> Result<Vec<Value>> {
    match arguments {
        ActionArguments::RepoCreate(args) => repository::run_repo_create(ctx, args).await.map(|_| Vec::new()),
        ActionArguments::Transfer(args) => repository::run_transfer(ctx, args).await.map(|_| Vec::new()),
        ActionArguments::Prune(args) => prune::run_prune(ctx, args).await.map(|_| Vec::new()),
        ActionArguments::Compact(args) => compact::run_compact(ctx, args).await.map(|_| Vec::new()),
        ActionArguments::Create(args) => create::run_create(ctx, args).await,
        ActionArguments::Check(args) => check::run_check(ctx, args).await.map(|_| Vec::new()),
        ActionArguments::Extract(args) => extract::run_extract(ctx, args).await.map(|_| Vec::new()),
        ActionArguments::ExportTar(args) => extract::run_export_tar(ctx, args).await.map(|_| Vec::new()),
        ActionArguments::Mount(args) => extract::run_mount(ctx, args).await.map(|_| Vec::new()),
        ActionArguments::Restore(args) => restore::run_restore(ctx, args).await.map(|_| Vec::new()),
        ActionArguments::RepoList(args) => info::run_repo_list(ctx, args).await,
        ActionArguments::List(args) => info::run_list(ctx, args).await,
        ActionArguments::RepoInfo(args) => info::run_repo_info(ctx, args).await,
        ActionArguments::Info(args) => info::run_info(ctx, args).await,
        ActionArguments::BreakLock(args) => repository::run_break_lock(ctx, args).await.map(|_| Vec::new()),
        ActionArguments::Borg(args) => repository::run_borg(ctx, args).await.map(|_| Vec::new()),
        ActionArguments::Umount(_) | ActionArguments::Config(_) => Ok(Vec::new()),
    }
}
