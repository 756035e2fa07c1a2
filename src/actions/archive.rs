// src/actions/archive.rs

use tracing::debug;

use crate::borg::commands::make_archive_names_command;
use crate::cli::GlobalArguments;
use crate::config::model::Configuration;
use crate::errors::{BorgkeeperError, Result};
use crate::exec::{CommandRunner, CommandSpec, ExitCodePolicy};

pub const LATEST: &str = "latest";

/// Resolve `latest` to the newest archive name; any other name is returned
/// unchanged.
pub async fn resolve_archive_name(
    runner: &dyn CommandRunner,
    config: &Configuration,
    repository: &str,
    archive: &str,
    global: &GlobalArguments,
) -> Result<String> {
    if archive != LATEST {
        return Ok(archive.to_string());
    }

    let spec = CommandSpec::new(make_archive_names_command(config, repository, global))
        .with_env(crate::borg::make_environment(config))
        .exit_codes(ExitCodePolicy::from_config(config));
    let output = runner.capture(&spec).await?;

    let latest = output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .last()
        .ok_or_else(|| {
            BorgkeeperError::InvalidArguments(format!("No archives found in repository {repository}"))
        })?;

    debug!(repository, archive = latest, "resolved latest archive");
    Ok(latest.to_string())
}
