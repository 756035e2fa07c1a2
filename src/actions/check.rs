// src/actions/check.rs

use std::collections::BTreeMap;

use tracing::info;

use crate::actions::ActionContext;
use crate::borg::commands::make_check_command;
use crate::cli::CheckArguments;
use crate::config::model::CheckKind;
use crate::config::validate::repositories_match;
use crate::errors::{BorgkeeperError, Result};

/// Checks to run: `--only` wins over the configured list.
pub fn resolve_checks(only: &[String], configured: &[CheckKind]) -> Result<Vec<CheckKind>> {
    if only.is_empty() {
        return Ok(configured.to_vec());
    }
    only.iter()
        .map(|name| match name.as_str() {
            "repository" => Ok(CheckKind::Repository),
            "archives" => Ok(CheckKind::Archives),
            "data" => Ok(CheckKind::Data),
            other => Err(BorgkeeperError::InvalidArguments(format!(
                "Unknown check \"{other}\"; expected repository, archives or data"
            ))),
        })
        .collect()
}

pub async fn run_check(ctx: ActionContext<'_>, args: &CheckArguments) -> Result<()> {
    let config = ctx.config;
    if !config.check_repositories.is_empty()
        && !config
            .check_repositories
            .iter()
            .any(|repository| repositories_match(ctx.repository, repository))
    {
        info!(
            "{}: Skipping check; repository not in check_repositories",
            ctx.log_prefix
        );
        return Ok(());
    }

    let checks = resolve_checks(&args.only, &config.checks)?;
    if checks.is_empty() || checks.contains(&CheckKind::Disabled) {
        info!("{}: Skipping check; checks are disabled", ctx.log_prefix);
        return Ok(());
    }

    info!("{}: Running consistency checks", ctx.log_prefix);
    let argv = make_check_command(
        config,
        ctx.repository_path(),
        &checks,
        args.repair,
        args.progress,
        ctx.global,
    );
    let mut spec = ctx.engine_command(argv);
    if args.repair {
        spec = spec.with_env(BTreeMap::from([(
            "BORG_CHECK_I_KNOW_WHAT_I_AM_DOING".to_string(),
            "YES".to_string(),
        )]));
    }
    ctx.runner.execute(&spec).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_overrides_configured_checks() {
        let configured = [CheckKind::Repository, CheckKind::Archives];
        assert_eq!(resolve_checks(&[], &configured).unwrap(), configured.to_vec());
        assert_eq!(
            resolve_checks(&["data".into()], &configured).unwrap(),
            vec![CheckKind::Data]
        );
        assert!(resolve_checks(&["bogus".into()], &configured).is_err());
    }
}
