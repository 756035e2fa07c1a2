// src/actions/compact.rs

use tracing::info;

use crate::actions::ActionContext;
use crate::borg::commands::make_compact_command;
use crate::cli::CompactArguments;
use crate::errors::Result;

/// The engine has no dry run for compaction, so a dry run skips it.
pub async fn run_compact(ctx: ActionContext<'_>, args: &CompactArguments) -> Result<()> {
    if ctx.global.dry_run {
        info!("{}: Skipping compact (dry run)", ctx.log_prefix);
        return Ok(());
    }
    info!("{}: Compacting segments", ctx.log_prefix);
    let argv = make_compact_command(ctx.config, ctx.repository_path(), args, ctx.global);
    ctx.runner.execute(&ctx.engine_command(argv)).await
}
