// src/hooks/data_source/postgresql.rs

use std::collections::BTreeMap;

use tracing::{debug, info, warn};

use crate::config::model::{Configuration, DatabaseConfig};
use crate::errors::{BorgkeeperError, Result};
use crate::exec::{BoxFuture, CommandSpec, ProcessHandle};
use crate::hooks::data_source::dump::{
    create_named_pipe_for_dump, create_parent_directory_for_dump, make_dump_filename,
};
use crate::hooks::data_source::{
    client_command, environment_from, split_options, ConnectionOverrides, DataSourceContext, DataSourceHook,
};
use crate::types::LogLevel;

const EXCLUDED_DATABASE_NAMES: [&str; 2] = ["template0", "template1"];

#[derive(Debug, Default, Clone, Copy)]
pub struct PostgresqlHook;

fn make_environment(database: &DatabaseConfig, password: Option<&String>) -> BTreeMap<String, String> {
    environment_from([
        ("PGPASSWORD", password),
        ("PGSSLMODE", database.ssl_mode.as_ref()),
        ("PGSSLCERT", database.ssl_cert.as_ref()),
        ("PGSSLKEY", database.ssl_key.as_ref()),
        ("PGSSLROOTCERT", database.ssl_root_cert.as_ref()),
        ("PGSSLCRL", database.ssl_crl.as_ref()),
    ])
}

fn connection_flags(hostname: Option<&str>, port: Option<u16>, username: Option<&str>) -> Vec<String> {
    let mut flags = Vec::new();
    if let Some(hostname) = hostname {
        flags.extend(["--host".to_string(), hostname.to_string()]);
    }
    if let Some(port) = port {
        flags.extend(["--port".to_string(), port.to_string()]);
    }
    if let Some(username) = username {
        flags.extend(["--username".to_string(), username.to_string()]);
    }
    flags
}

/// `pg_dump`/`pg_dumpall` for one database name. Non-directory formats
/// are redirected into `dump_filename` by the shell.
pub fn make_dump_command(
    database: &DatabaseConfig,
    database_name: &str,
    dump_filename: &str,
) -> String {
    let all = database_name == "all";
    let format = database
        .format
        .clone()
        .or_else(|| (!all).then(|| "custom".to_string()));
    let directory = format.as_deref() == Some("directory");

    let mut command = client_command(
        database.pg_dump_command.as_ref(),
        if all { "pg_dumpall" } else { "pg_dump" },
    );
    command.extend(["--no-password", "--clean", "--if-exists"].map(String::from));
    command.extend(connection_flags(
        database.hostname.as_deref(),
        database.port,
        database.username.as_deref(),
    ));
    if database.no_owner {
        command.push("--no-owner".to_string());
    }
    if let Some(format) = &format {
        command.extend(["--format".to_string(), format.clone()]);
    }
    if directory {
        command.extend(["--file".to_string(), dump_filename.to_string()]);
    }
    command.extend(split_options(database.options.as_ref()));
    if !all {
        command.push(database_name.to_string());
    }

    let mut joined = shell_words::join(&command);
    if !directory {
        joined.push_str(" > ");
        joined.push_str(&shell_words::quote(dump_filename));
    }
    joined
}

/// Parse `psql --list --csv --tuples-only` output into database names.
pub fn parse_database_list(output: &str) -> Vec<String> {
    output
        .lines()
        .filter_map(|line| {
            let first = line.split(',').next()?.trim().trim_matches('"');
            (!first.is_empty() && !EXCLUDED_DATABASE_NAMES.contains(&first))
                .then(|| first.to_string())
        })
        .collect()
}

impl PostgresqlHook {
    async fn database_names_to_dump(
        &self,
        ctx: DataSourceContext<'_>,
        database: &DatabaseConfig,
        environment: &BTreeMap<String, String>,
    ) -> Result<Vec<String>> {
        if !database.is_all() {
            return Ok(vec![database.name.clone()]);
        }
        if database.format.is_none() {
            return Ok(vec!["all".to_string()]);
        }
        if ctx.dry_run {
            return Ok(Vec::new());
        }

        let mut command = client_command(database.psql_command.as_ref(), "psql");
        command.extend(
            ["--list", "--no-password", "--no-psqlrc", "--csv", "--tuples-only"].map(String::from),
        );
        command.extend(connection_flags(
            database.hostname.as_deref(),
            database.port,
            database.username.as_deref(),
        ));
        command.extend(split_options(database.list_options.as_ref()));

        debug!("{}: Querying for \"all\" PostgreSQL databases to dump", ctx.log_prefix);
        let spec = CommandSpec::new(command).with_env(environment.clone());
        let output = ctx.runner.capture(&spec).await?;
        Ok(parse_database_list(&output))
    }

    /// `pg_restore`, or `psql` for plain-format and all-database dumps.
    pub fn make_restore_command(
        database: &DatabaseConfig,
        connection: &crate::hooks::data_source::RestoreConnection,
        dump_filename: Option<&str>,
    ) -> Vec<String> {
        let all = database.is_all();
        let use_psql = all || database.format.as_deref() == Some("plain");

        let mut command = if use_psql {
            client_command(database.psql_command.as_ref(), "psql")
        } else {
            client_command(database.pg_restore_command.as_ref(), "pg_restore")
        };
        command.push("--no-password".to_string());
        if use_psql {
            command.push("--no-psqlrc".to_string());
        } else {
            command.extend(["--if-exists", "--exit-on-error", "--clean"].map(String::from));
        }
        if !all {
            command.extend(["--dbname".to_string(), database.name.clone()]);
        }
        command.extend(connection_flags(
            connection.hostname.as_deref(),
            connection.port,
            connection.username.as_deref(),
        ));
        if database.no_owner {
            command.push("--no-owner".to_string());
        }
        command.extend(split_options(database.restore_options.as_ref()));
        if let Some(dump_filename) = dump_filename {
            command.push(dump_filename.to_string());
        }
        for schema in &database.schemas {
            command.extend(["--schema".to_string(), schema.clone()]);
        }
        command
    }

    fn make_analyze_command(
        database: &DatabaseConfig,
        connection: &crate::hooks::data_source::RestoreConnection,
    ) -> Vec<String> {
        let mut command = client_command(database.psql_command.as_ref(), "psql");
        command.extend(["--no-password", "--no-psqlrc", "--quiet"].map(String::from));
        command.extend(connection_flags(
            connection.hostname.as_deref(),
            connection.port,
            connection.username.as_deref(),
        ));
        if !database.is_all() {
            command.extend(["--dbname".to_string(), database.name.clone()]);
        }
        command.extend(split_options(database.analyze_options.as_ref()));
        command.extend(["--command".to_string(), "ANALYZE".to_string()]);
        command
    }
}

impl DataSourceHook for PostgresqlHook {
    fn name(&self) -> &'static str {
        "postgresql_databases"
    }

    fn label(&self) -> &'static str {
        "PostgreSQL"
    }

    fn databases<'c>(&self, config: &'c Configuration) -> &'c [DatabaseConfig] {
        &config.postgresql_databases
    }

    fn dump<'a>(
        &'a self,
        ctx: DataSourceContext<'a>,
        databases: &'a [DatabaseConfig],
    ) -> BoxFuture<'a, Result<Vec<ProcessHandle>>> {
        Box::pin(async move {
            let dry_run_label = ctx.dry_run_label("dumping");
            info!("{}: Dumping PostgreSQL databases{dry_run_label}", ctx.log_prefix);

            let dump_path = self.dump_path(ctx.config);
            let mut processes = Vec::new();

            for database in databases {
                let environment = make_environment(database, database.password.as_ref());
                let names = self.database_names_to_dump(ctx, database, &environment).await?;
                if names.is_empty() {
                    if ctx.dry_run {
                        continue;
                    }
                    return Err(BorgkeeperError::ConfigError(
                        "Cannot find any PostgreSQL databases to dump.".to_string(),
                    ));
                }

                for name in names {
                    let dump_filename =
                        make_dump_filename(&dump_path, &name, database.hostname.as_deref())?;
                    if dump_filename.exists() {
                        warn!(
                            "{}: Skipping duplicate dump of PostgreSQL database \"{name}\" to {}",
                            ctx.log_prefix,
                            dump_filename.display()
                        );
                        continue;
                    }

                    let filename = dump_filename.to_string_lossy();
                    let command = make_dump_command(database, &name, &filename);
                    debug!(
                        "{}: Dumping PostgreSQL database \"{name}\" to {filename}{dry_run_label}",
                        ctx.log_prefix
                    );
                    if ctx.dry_run {
                        continue;
                    }

                    let spec = CommandSpec::shell(command).with_env(environment.clone());
                    if database.format.as_deref() == Some("directory") {
                        create_parent_directory_for_dump(&dump_filename)?;
                        ctx.runner.execute(&spec).await?;
                    } else {
                        create_named_pipe_for_dump(&dump_filename)?;
                        processes.push(ctx.runner.spawn(&spec)?);
                    }
                }
            }

            Ok(processes)
        })
    }

    fn restore<'a>(
        &'a self,
        ctx: DataSourceContext<'a>,
        database: &'a DatabaseConfig,
        extract: Option<ProcessHandle>,
        overrides: &'a ConnectionOverrides,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let connection = overrides.resolve(database);
            let dump_filename = make_dump_filename(
                &self.dump_path(ctx.config),
                &database.name,
                database.hostname.as_deref(),
            )?;
            let dump_filename = dump_filename.to_string_lossy().into_owned();

            let restore = Self::make_restore_command(
                database,
                &connection,
                extract.is_none().then_some(dump_filename.as_str()),
            );
            let analyze = Self::make_analyze_command(database, &connection);
            let environment = make_environment(database, connection.password.as_ref());

            debug!(
                "{}: Restoring PostgreSQL database {}{}",
                ctx.log_prefix,
                database.name,
                ctx.dry_run_label("restoring")
            );
            if ctx.dry_run {
                return Ok(());
            }

            let spec = CommandSpec::new(restore)
                .with_env(environment.clone())
                .output_log_level(LogLevel::Debug);
            let processes: Vec<ProcessHandle> = extract.into_iter().collect();
            let pipe = !processes.is_empty();
            ctx.runner.execute_with_processes(&spec, processes, pipe).await?;
            ctx.runner
                .execute(&CommandSpec::new(analyze).with_env(environment))
                .await
        })
    }
}
