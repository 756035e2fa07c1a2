// src/actions/prune.rs

use tracing::info;

use crate::actions::ActionContext;
use crate::borg::commands::make_prune_command;
use crate::cli::PruneArguments;
use crate::errors::Result;

pub async fn run_prune(ctx: ActionContext<'_>, args: &PruneArguments) -> Result<()> {
    info!(
        "{}: Pruning archives{}",
        ctx.log_prefix,
        if ctx.global.dry_run { " (dry run; not making any changes)" } else { "" }
    );
    let argv = make_prune_command(ctx.config, ctx.repository_path(), args, ctx.global);
    ctx.runner.execute(&ctx.engine_command(argv)).await
}
