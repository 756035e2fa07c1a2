// src/actions/restore.rs

//! Restore database dumps from an archive.
//!
//! Planning is pure: given the dumps found in the archive, the requested
//! names and the configuration, [`plan_restore`] decides which hook
//! restores what. Execution then streams each dump out of the archive into
//! the hook's restore client.

use std::collections::BTreeMap;
use std::path::Path;

use tracing::{debug, info};

use crate::actions::archive::resolve_archive_name;
use crate::actions::ActionContext;
use crate::borg::commands::{
    make_extract_paths_command, make_extract_to_stdout_command, make_list_paths_command,
};
use crate::borg::make_environment;
use crate::cli::RestoreArguments;
use crate::config::model::{Configuration, DatabaseConfig};
use crate::config::paths::expand_home;
use crate::errors::{BorgkeeperError, Result};
use crate::exec::CommandSpec;
use crate::hooks::data_source::dump::{convert_glob_patterns_to_borg_pattern, parse_dump_paths};
use crate::hooks::data_source::{hook_by_name, remove_all, ConnectionOverrides, DataSourceHook};

const ALL: &str = "all";

/// One database to restore and the hook that restores it.
pub struct PlannedRestore {
    pub hook: &'static dyn DataSourceHook,
    pub database: DatabaseConfig,
}

impl std::fmt::Debug for PlannedRestore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlannedRestore")
            .field("hook", &self.hook.name())
            .field("database", &self.database.name)
            .finish()
    }
}

#[derive(Debug, Default)]
pub struct RestorePlan {
    pub restores: Vec<PlannedRestore>,
    /// Found in the archive but with no matching configuration entry.
    pub missing_from_configuration: Vec<String>,
}

fn describe_missing(names: &[String], place: &str) -> String {
    let noun = if names.len() == 1 { "database" } else { "databases" };
    format!("Cannot restore {noun} {} missing from {place}", names.join(", "))
}

/// Decide what to restore.
///
/// An empty request or one containing `all` means every dump in the
/// archive. Explicit names must all be in the archive, checked before
/// anything runs. Each dump is matched to a configuration entry with the
/// same name, falling back to the hook's `all` entry.
pub fn plan_restore(
    archive_dumps: &BTreeMap<String, Vec<String>>,
    requested: &[String],
    config: &Configuration,
) -> Result<RestorePlan> {
    let restore_everything = requested.is_empty() || requested.iter().any(|name| name == ALL);

    let mut wanted: Vec<(String, String)> = Vec::new();
    if restore_everything {
        for (hook_name, names) in archive_dumps {
            wanted.extend(names.iter().map(|name| (hook_name.clone(), name.clone())));
        }
    } else {
        let mut missing = Vec::new();
        for name in requested {
            let mut found = false;
            for (hook_name, names) in archive_dumps {
                if names.contains(name) {
                    wanted.push((hook_name.clone(), name.clone()));
                    found = true;
                }
            }
            if !found && !missing.contains(name) {
                missing.push(name.clone());
            }
        }
        if !missing.is_empty() {
            return Err(BorgkeeperError::Restore(describe_missing(&missing, "archive")));
        }
    }

    let mut plan = RestorePlan::default();
    for (hook_name, name) in wanted {
        let Some(hook) = hook_by_name(&hook_name) else {
            plan.missing_from_configuration.push(name);
            continue;
        };
        let databases = hook.databases(config);
        let database = databases
            .iter()
            .find(|database| database.name == name)
            .cloned()
            .or_else(|| {
                databases.iter().find(|database| database.is_all()).map(|all| DatabaseConfig {
                    name: name.clone(),
                    ..all.clone()
                })
            });
        match database {
            Some(database) => plan.restores.push(PlannedRestore { hook, database }),
            None => {
                if !plan.missing_from_configuration.contains(&name) {
                    plan.missing_from_configuration.push(name);
                }
            }
        }
    }
    Ok(plan)
}

/// Dump paths present in `archive`, grouped by hook.
async fn find_archive_dumps(
    ctx: ActionContext<'_>,
    archive: &str,
    source_directory: &Path,
) -> Result<BTreeMap<String, Vec<String>>> {
    let pattern = format!("{}/*_databases/*/*", source_directory.display());
    let borg_pattern = convert_glob_patterns_to_borg_pattern(&[pattern]);
    let argv = make_list_paths_command(
        ctx.config,
        ctx.repository_path(),
        archive,
        &[borg_pattern],
        ctx.global,
    );
    let output = ctx.runner.capture(&ctx.engine_command(argv)).await?;
    Ok(parse_dump_paths(output.lines(), source_directory))
}

async fn restore_one(
    ctx: ActionContext<'_>,
    archive: &str,
    planned: &PlannedRestore,
    overrides: &ConnectionOverrides,
) -> Result<()> {
    let hook = planned.hook;
    let database = &planned.database;
    info!(
        "{}: Restoring {} database {}",
        ctx.log_prefix,
        hook.label(),
        database.name
    );

    let pattern = convert_glob_patterns_to_borg_pattern(
        &hook.make_pattern(ctx.config, Some(&database.name)),
    );
    let data_sources = ctx.data_sources();

    if ctx.global.dry_run {
        return hook.restore(data_sources, database, None, overrides).await;
    }

    if database.format.as_deref() == Some("directory") {
        // Directory dumps can't stream; put them back where they were dumped
        // and let the client read them from disk.
        let argv = make_extract_paths_command(
            ctx.config,
            ctx.repository_path(),
            archive,
            &[pattern],
            None,
            false,
            ctx.global,
        );
        ctx.runner
            .execute(&ctx.engine_command(argv).working_directory("/"))
            .await?;
        return hook.restore(data_sources, database, None, overrides).await;
    }

    // Engine warnings while streaming a dump mean a truncated dump.
    let argv = make_extract_to_stdout_command(
        ctx.config,
        ctx.repository_path(),
        archive,
        &[pattern],
        ctx.global,
    );
    let extract = ctx
        .runner
        .spawn(&CommandSpec::new(argv).with_env(make_environment(ctx.config)))?;
    hook.restore(data_sources, database, Some(extract), overrides).await
}

pub async fn run_restore(ctx: ActionContext<'_>, args: &RestoreArguments) -> Result<()> {
    let archive = resolve_archive_name(
        ctx.runner,
        ctx.config,
        ctx.repository_path(),
        &args.archive,
        ctx.global,
    )
    .await?;
    info!(
        "{}: Restoring data sources from archive {archive}",
        ctx.log_prefix
    );

    let source_directory = expand_home(&ctx.config.borgmatic_source_directory);
    let archive_dumps = find_archive_dumps(ctx, &archive, &source_directory).await?;
    debug!(?archive_dumps, "dumps found in archive");

    let plan = plan_restore(&archive_dumps, &args.databases, ctx.config)?;
    let overrides = ConnectionOverrides {
        hostname: args.hostname.clone(),
        port: args.port,
        username: args.username.clone(),
        password: args.password.clone(),
    };

    remove_all(ctx.data_sources())?;
    let mut result = Ok(());
    for planned in &plan.restores {
        result = restore_one(ctx, &archive, planned, &overrides).await;
        if result.is_err() {
            break;
        }
    }
    let cleanup = remove_all(ctx.data_sources());
    result?;
    cleanup?;

    if !plan.missing_from_configuration.is_empty() {
        return Err(BorgkeeperError::Restore(describe_missing(
            &plan.missing_from_configuration,
            "configuration",
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn archive() -> BTreeMap<String, Vec<String>> {
        BTreeMap::from([
            (
                "postgresql_databases".to_string(),
                vec!["foo".to_string(), "bar".to_string()],
            ),
            ("mysql_databases".to_string(), vec!["quux".to_string()]),
        ])
    }

    fn restored(plan: &RestorePlan) -> Vec<(&str, &str)> {
        plan.restores
            .iter()
            .map(|p| (p.hook.name(), p.database.name.as_str()))
            .collect()
    }

    #[test]
    fn all_expands_to_every_dump_in_the_archive() {
        let mut foo = DatabaseConfig::named("foo");
        foo.username = Some("postgres".into());
        let config = Configuration {
            postgresql_databases: vec![foo, DatabaseConfig::named("bar")],
            mysql_databases: vec![DatabaseConfig::named("quux")],
            ..Configuration::default()
        };

        let plan = plan_restore(&archive(), &["all".into()], &config).unwrap();
        assert_eq!(
            restored(&plan),
            vec![
                ("mysql_databases", "quux"),
                ("postgresql_databases", "foo"),
                ("postgresql_databases", "bar"),
            ]
        );
        assert_eq!(plan.restores[1].database.username.as_deref(), Some("postgres"));
        assert!(plan.missing_from_configuration.is_empty());
    }

    #[test]
    fn names_missing_from_archive_fail_before_anything_runs() {
        let config = Configuration {
            postgresql_databases: vec![DatabaseConfig::named("foo")],
            ..Configuration::default()
        };
        let dumps = BTreeMap::from([(
            "postgresql_databases".to_string(),
            vec!["foo".to_string()],
        )]);

        let err = plan_restore(&dumps, &["foo".into(), "bar".into()], &config).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Cannot restore database bar missing from archive"
        );
    }

    #[test]
    fn all_entry_serves_as_fallback_configuration() {
        let mut all = DatabaseConfig::named("all");
        all.hostname = Some("db".into());
        let config = Configuration {
            postgresql_databases: vec![all],
            ..Configuration::default()
        };

        let plan = plan_restore(&archive(), &["bar".into()], &config).unwrap();
        assert_eq!(restored(&plan), vec![("postgresql_databases", "bar")]);
        assert_eq!(plan.restores[0].database.hostname.as_deref(), Some("db"));
    }

    #[test]
    fn unconfigured_dumps_are_reported() {
        let config = Configuration {
            postgresql_databases: vec![DatabaseConfig::named("foo")],
            ..Configuration::default()
        };
        let plan = plan_restore(&archive(), &[], &config).unwrap();
        assert_eq!(restored(&plan), vec![("postgresql_databases", "foo")]);
        assert_eq!(plan.missing_from_configuration, vec!["quux", "bar"]);
        assert_eq!(
            describe_missing(&plan.missing_from_configuration, "configuration"),
            "Cannot restore databases quux, bar missing from configuration"
        );
    }
}
