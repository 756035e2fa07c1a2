// src/hooks/data_source/sqlite.rs

use std::fs;
use std::path::Path;

use tracing::{debug, info, warn};

use crate::config::model::{Configuration, DatabaseConfig};
use crate::errors::{BorgkeeperError, Result};
use crate::exec::{BoxFuture, CommandSpec, ProcessHandle};
use crate::hooks::data_source::dump::{create_named_pipe_for_dump, make_dump_filename};
use crate::hooks::data_source::{ConnectionOverrides, DataSourceContext, DataSourceHook};
use crate::types::LogLevel;

#[derive(Debug, Default, Clone, Copy)]
pub struct SqliteHook;

pub fn make_dump_command(database_path: &str, dump_filename: &str) -> String {
    format!(
        "sqlite3 {} .dump > {}",
        shell_words::quote(database_path),
        shell_words::quote(dump_filename)
    )
}

fn database_path(database: &DatabaseConfig) -> Result<&str> {
    database.path.as_deref().ok_or_else(|| {
        BorgkeeperError::ConfigError(format!(
            "SQLite database {} has no path configured",
            database.name
        ))
    })
}

impl DataSourceHook for SqliteHook {
    fn name(&self) -> &'static str {
        "sqlite_databases"
    }

    fn label(&self) -> &'static str {
        "SQLite"
    }

    fn databases<'c>(&self, config: &'c Configuration) -> &'c [DatabaseConfig] {
        &config.sqlite_databases
    }

    fn dump<'a>(
        &'a self,
        ctx: DataSourceContext<'a>,
        databases: &'a [DatabaseConfig],
    ) -> BoxFuture<'a, Result<Vec<ProcessHandle>>> {
        Box::pin(async move {
            let dry_run_label = ctx.dry_run_label("dumping");
            info!("{}: Dumping SQLite databases{dry_run_label}", ctx.log_prefix);

            let dump_path = self.dump_path(ctx.config);
            let mut processes = Vec::new();

            for database in databases {
                let path = database_path(database)?;
                if database.is_all() {
                    warn!(
                        "{}: The \"all\" database name has no meaning for SQLite databases",
                        ctx.log_prefix
                    );
                }
                if !Path::new(path).exists() {
                    warn!(
                        "{}: No SQLite database at {path}; an empty database will be created and dumped",
                        ctx.log_prefix
                    );
                }

                let dump_filename = make_dump_filename(&dump_path, &database.name, None)?;
                if dump_filename.exists() {
                    warn!(
                        "{}: Skipping duplicate dump of SQLite database at {path} to {}",
                        ctx.log_prefix,
                        dump_filename.display()
                    );
                    continue;
                }

                let filename = dump_filename.to_string_lossy();
                debug!(
                    "{}: Dumping SQLite database at {path} to {filename}{dry_run_label}",
                    ctx.log_prefix
                );
                if ctx.dry_run {
                    continue;
                }

                create_named_pipe_for_dump(&dump_filename)?;
                let spec = CommandSpec::shell(make_dump_command(path, &filename));
                processes.push(ctx.runner.spawn(&spec)?);
            }

            Ok(processes)
        })
    }

    fn restore<'a>(
        &'a self,
        ctx: DataSourceContext<'a>,
        database: &'a DatabaseConfig,
        extract: Option<ProcessHandle>,
        _overrides: &'a ConnectionOverrides,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let path = match database.restore_path.as_deref() {
                Some(path) => path,
                None => database_path(database)?,
            };

            debug!(
                "{}: Restoring SQLite database at {path}{}",
                ctx.log_prefix,
                ctx.dry_run_label("restoring")
            );
            if ctx.dry_run {
                return Ok(());
            }

            if Path::new(path).exists() {
                fs::remove_file(path)?;
                warn!("{}: Removed existing SQLite database at {path}", ctx.log_prefix);
            }

            let spec = CommandSpec::new(["sqlite3", path]).output_log_level(LogLevel::Debug);
            let processes: Vec<ProcessHandle> = extract.into_iter().collect();
            let pipe = !processes.is_empty();
            ctx.runner
                .execute_with_processes(&spec, processes, pipe)
                .await
                .map(|_| ())
        })
    }
}
