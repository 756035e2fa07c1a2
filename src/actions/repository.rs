// src/actions/repository.rs

//! Repository-level maintenance: `repo-create`, `transfer`, `break-lock`
//! and the raw `borg` passthrough.

use std::collections::BTreeMap;

use tracing::info;

use crate::actions::archive::resolve_archive_name;
use crate::actions::ActionContext;
use crate::borg::commands::{
    make_break_lock_command, make_passthrough_command, make_repo_create_command,
    make_repo_info_command, make_transfer_command,
};
use crate::cli::{
    BorgArguments, BreakLockArguments, RepoCreateArguments, RepoInfoArguments, TransferArguments,
};
use crate::errors::{BorgkeeperError, Result};

/// Engine exit code for "repository does not exist".
const REPOSITORY_DOES_NOT_EXIST: i32 = 2;

pub async fn run_repo_create(ctx: ActionContext<'_>, args: &RepoCreateArguments) -> Result<()> {
    let encryption_mode = args
        .encryption_mode
        .as_deref()
        .or(ctx.config.encryption.as_deref())
        .ok_or_else(|| {
            BorgkeeperError::InvalidArguments(
                "An encryption mode is required to create a repository; pass --encryption or set encryption in the configuration".to_string(),
            )
        })?;

    let info_args = RepoInfoArguments {
        repository: None,
        json: true,
    };
    let repo_info = make_repo_info_command(ctx.config, ctx.repository_path(), &info_args, ctx.global);
    match ctx.runner.capture(&ctx.engine_command(repo_info)).await {
        Ok(_) => {
            info!(
                "{}: Repository already exists. Skipping repository creation.",
                ctx.log_prefix
            );
            return Ok(());
        }
        Err(BorgkeeperError::CommandFailed { exit_code, .. })
            if exit_code == REPOSITORY_DOES_NOT_EXIST => {}
        Err(err) => return Err(err),
    }

    if ctx.global.dry_run {
        info!("{}: Skipping repository creation (dry run)", ctx.log_prefix);
        return Ok(());
    }

    info!("{}: Creating repository", ctx.log_prefix);
    let argv = make_repo_create_command(
        ctx.config,
        ctx.repository_path(),
        encryption_mode,
        args,
        ctx.global,
    );
    ctx.runner.execute(&ctx.engine_command(argv)).await
}

pub async fn run_transfer(ctx: ActionContext<'_>, args: &TransferArguments) -> Result<()> {
    info!(
        "{}: Transferring archives from {}",
        ctx.log_prefix, args.source_repository
    );
    let argv = make_transfer_command(ctx.config, ctx.repository_path(), args, ctx.global);
    ctx.runner.execute(&ctx.engine_command(argv)).await
}

pub async fn run_break_lock(ctx: ActionContext<'_>, args: &BreakLockArguments) -> Result<()> {
    info!("{}: Breaking repository and cache locks", ctx.log_prefix);
    let argv = make_break_lock_command(ctx.config, ctx.repository_path(), args, ctx.global);
    ctx.runner.execute(&ctx.engine_command(argv)).await
}

/// Hand arbitrary arguments to the engine, with the repository in
/// `BORG_REPO`.
pub async fn run_borg(ctx: ActionContext<'_>, args: &BorgArguments) -> Result<()> {
    let archive = match args.archive.as_deref() {
        Some(archive) => Some(
            resolve_archive_name(
                ctx.runner,
                ctx.config,
                ctx.repository_path(),
                archive,
                ctx.global,
            )
            .await?,
        ),
        None => None,
    };

    info!("{}: Running arbitrary borg command", ctx.log_prefix);
    let argv = make_passthrough_command(ctx.config, archive.as_deref(), &args.options);
    let spec = ctx.engine_command(argv).with_env(BTreeMap::from([(
        "BORG_REPO".to_string(),
        ctx.repository_path().to_string(),
    )]));
    ctx.runner.execute(&spec).await
}
