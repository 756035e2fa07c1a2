// src/actions/extract.rs

//! Actions that read files back out of an archive: `extract`,
//! `export-tar` and `mount`.

use tracing::info;

use crate::actions::archive::resolve_archive_name;
use crate::actions::ActionContext;
use crate::borg::commands::{make_export_tar_command, make_extract_command, make_mount_command};
use crate::cli::{ExportTarArguments, ExtractArguments, MountArguments};
use crate::errors::Result;
use crate::types::LogLevel;

pub async fn run_extract(ctx: ActionContext<'_>, args: &ExtractArguments) -> Result<()> {
    let archive = resolve_archive_name(
        ctx.runner,
        ctx.config,
        ctx.repository_path(),
        &args.archive,
        ctx.global,
    )
    .await?;
    info!("{}: Extracting archive {archive}", ctx.log_prefix);

    let argv = make_extract_command(ctx.config, ctx.repository_path(), &archive, args, ctx.global);
    let mut spec = ctx.engine_command(argv);
    if let Some(destination) = &args.destination {
        spec = spec.working_directory(destination);
    }
    ctx.runner.execute(&spec).await
}

pub async fn run_export_tar(ctx: ActionContext<'_>, args: &ExportTarArguments) -> Result<()> {
    let archive = resolve_archive_name(
        ctx.runner,
        ctx.config,
        ctx.repository_path(),
        &args.archive,
        ctx.global,
    )
    .await?;
    info!(
        "{}: Exporting archive {archive} as tar file {}",
        ctx.log_prefix, args.destination
    );

    let argv =
        make_export_tar_command(ctx.config, ctx.repository_path(), &archive, args, ctx.global);
    let mut spec = ctx.engine_command(argv);
    if args.destination == "-" {
        // The tarball itself goes to our stdout; only stderr gets logged.
        spec = spec.inherit_stdout();
    } else {
        spec = spec.output_log_level(LogLevel::Info);
    }
    ctx.runner.execute(&spec).await
}

pub async fn run_mount(ctx: ActionContext<'_>, args: &MountArguments) -> Result<()> {
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
    match &archive {
        Some(archive) => info!("{}: Mounting archive {archive}", ctx.log_prefix),
        None => info!("{}: Mounting repository", ctx.log_prefix),
    }

    let argv = make_mount_command(
        ctx.config,
        ctx.repository_path(),
        archive.as_deref(),
        args,
        ctx.global,
    );
    ctx.runner.execute(&ctx.engine_command(argv)).await
}
