// src/actions/info.rs

//! Read-only listing actions. With `--json`, output is captured and
//! returned as documents; otherwise it's logged.

use serde_json::{json, Value};
use tracing::info;

use crate::actions::archive::resolve_archive_name;
use crate::actions::json::{parse_json, parse_json_lines};
use crate::actions::ActionContext;
use crate::borg::commands::{
    make_info_command, make_list_command, make_repo_info_command, make_repo_list_command,
};
use crate::cli::{InfoArguments, ListArguments, RepoInfoArguments, RepoListArguments};
use crate::errors::Result;
use crate::exec::CommandSpec;

/// Run `spec`, returning parsed JSON when `json` is set.
async fn run_maybe_json(ctx: ActionContext<'_>, spec: CommandSpec, json: bool) -> Result<Vec<Value>> {
    if !json {
        ctx.runner.execute(&spec).await?;
        return Ok(Vec::new());
    }
    let output = ctx.runner.capture(&spec).await?;
    Ok(parse_json(&output, ctx.repository)?.into_iter().collect())
}

pub async fn run_repo_list(ctx: ActionContext<'_>, args: &RepoListArguments) -> Result<Vec<Value>> {
    if !args.json {
        info!("{}: Listing repository", ctx.log_prefix);
    }
    let argv = make_repo_list_command(ctx.config, ctx.repository_path(), args, ctx.global);
    run_maybe_json(ctx, ctx.engine_command(argv), args.json).await
}

/// `list` without `--archive` lists the repository's archives instead.
pub async fn run_list(ctx: ActionContext<'_>, args: &ListArguments) -> Result<Vec<Value>> {
    let Some(archive) = args.archive.as_deref() else {
        let repo_args = RepoListArguments {
            repository: args.repository.clone(),
            short: args.short,
            json: args.json,
        };
        return run_repo_list(ctx, &repo_args).await;
    };

    let archive = resolve_archive_name(
        ctx.runner,
        ctx.config,
        ctx.repository_path(),
        archive,
        ctx.global,
    )
    .await?;
    if !args.json {
        info!("{}: Listing archive {archive}", ctx.log_prefix);
    }

    let argv = make_list_command(ctx.config, ctx.repository_path(), &archive, args, ctx.global);
    let spec = ctx.engine_command(argv);
    if !args.json {
        ctx.runner.execute(&spec).await?;
        return Ok(Vec::new());
    }

    let output = ctx.runner.capture(&spec).await?;
    let files = parse_json_lines(&output)?;
    Ok(vec![json!({
        "repository": {
            "location": ctx.repository_path(),
            "label": ctx.repository.label.clone().unwrap_or_default(),
        },
        "archive": {"name": archive},
        "files": files,
    })])
}

pub async fn run_repo_info(ctx: ActionContext<'_>, args: &RepoInfoArguments) -> Result<Vec<Value>> {
    if !args.json {
        info!("{}: Displaying repository summary information", ctx.log_prefix);
    }
    let argv = make_repo_info_command(ctx.config, ctx.repository_path(), args, ctx.global);
    run_maybe_json(ctx, ctx.engine_command(argv), args.json).await
}

pub async fn run_info(ctx: ActionContext<'_>, args: &InfoArguments) -> Result<Vec<Value>> {
    let mut args = args.clone();
    if let Some(archive) = args.archive.take() {
        args.archive = Some(
            resolve_archive_name(
                ctx.runner,
                ctx.config,
                ctx.repository_path(),
                &archive,
                ctx.global,
            )
            .await?,
        );
    }
    if !args.json {
        info!("{}: Displaying archive summary information", ctx.log_prefix);
    }
    let argv = make_info_command(ctx.config, ctx.repository_path(), &args, ctx.global);
    run_maybe_json(ctx, ctx.engine_command(argv), args.json).await
}
