// src/hooks/data_source/mongodb.rs

use tracing::{debug, info, warn};

use crate::config::model::{Configuration, DatabaseConfig};
use crate::errors::Result;
use crate::exec::{BoxFuture, CommandSpec, ProcessHandle};
use crate::hooks::data_source::dump::{
    create_named_pipe_for_dump, create_parent_directory_for_dump, make_dump_filename,
};
use crate::hooks::data_source::{
    split_options, ConnectionOverrides, DataSourceContext, DataSourceHook, RestoreConnection,
};
use crate::types::LogLevel;

#[derive(Debug, Default, Clone, Copy)]
pub struct MongoDbHook;

fn connection_flags(
    connection: &RestoreConnection,
    authentication_database: Option<&str>,
) -> Vec<String> {
    let mut flags = Vec::new();
    if let Some(hostname) = &connection.hostname {
        flags.extend(["--host".to_string(), hostname.clone()]);
    }
    if let Some(port) = connection.port {
        flags.extend(["--port".to_string(), port.to_string()]);
    }
    if let Some(username) = &connection.username {
        flags.extend(["--username".to_string(), username.clone()]);
    }
    if let Some(password) = &connection.password {
        flags.extend(["--password".to_string(), password.clone()]);
    }
    if let Some(database) = authentication_database {
        flags.extend(["--authenticationDatabase".to_string(), database.to_string()]);
    }
    flags
}

fn dump_connection(database: &DatabaseConfig) -> RestoreConnection {
    RestoreConnection {
        hostname: database.hostname.clone(),
        port: database.port,
        username: database.username.clone(),
        password: database.password.clone(),
    }
}

/// `mongodump` as a shell command: archive format is redirected into the
/// pipe, directory format writes with `--out`.
pub fn make_dump_command(database: &DatabaseConfig, dump_filename: &str) -> String {
    let directory = database.format.as_deref() == Some("directory");

    let mut command = vec!["mongodump".to_string()];
    if directory {
        command.extend(["--out".to_string(), dump_filename.to_string()]);
    }
    command.extend(connection_flags(
        &dump_connection(database),
        database.authentication_database.as_deref(),
    ));
    if !database.is_all() {
        command.extend(["--db".to_string(), database.name.clone()]);
    }
    command.extend(split_options(database.options.as_ref()));

    let mut joined = shell_words::join(&command);
    if !directory {
        joined.push_str(" --archive > ");
        joined.push_str(&shell_words::quote(dump_filename));
    }
    joined
}

pub fn make_restore_command(
    database: &DatabaseConfig,
    connection: &RestoreConnection,
    dump_filename: Option<&str>,
) -> Vec<String> {
    let mut command = vec!["mongorestore".to_string()];
    match dump_filename {
        Some(dump_filename) => command.extend(["--dir".to_string(), dump_filename.to_string()]),
        None => command.push("--archive".to_string()),
    }
    if !database.is_all() {
        command.extend(["--db".to_string(), database.name.clone()]);
    }
    command.push("--drop".to_string());
    command.extend(connection_flags(
        connection,
        database.authentication_database.as_deref(),
    ));
    command.extend(split_options(database.restore_options.as_ref()));
    command
}

impl DataSourceHook for MongoDbHook {
    fn name(&self) -> &'static str {
        "mongodb_databases"
    }

    fn label(&self) -> &'static str {
        "MongoDB"
    }

    fn databases<'c>(&self, config: &'c Configuration) -> &'c [DatabaseConfig] {
        &config.mongodb_databases
    }

    fn dump<'a>(
        &'a self,
        ctx: DataSourceContext<'a>,
        databases: &'a [DatabaseConfig],
    ) -> BoxFuture<'a, Result<Vec<ProcessHandle>>> {
        Box::pin(async move {
            let dry_run_label = ctx.dry_run_label("dumping");
            info!("{}: Dumping MongoDB databases{dry_run_label}", ctx.log_prefix);

            let dump_path = self.dump_path(ctx.config);
            let mut processes = Vec::new();

            for database in databases {
                let dump_filename =
                    make_dump_filename(&dump_path, &database.name, database.hostname.as_deref())?;
                if dump_filename.exists() {
                    warn!(
                        "{}: Skipping duplicate dump of MongoDB database \"{}\" to {}",
                        ctx.log_prefix,
                        database.name,
                        dump_filename.display()
                    );
                    continue;
                }

                let filename = dump_filename.to_string_lossy();
                debug!(
                    "{}: Dumping MongoDB database {} to {filename}{dry_run_label}",
                    ctx.log_prefix, database.name
                );
                if ctx.dry_run {
                    continue;
                }

                let spec = CommandSpec::shell(make_dump_command(database, &filename));
                if database.format.as_deref() == Some("directory") {
                    create_parent_directory_for_dump(&dump_filename)?;
                    ctx.runner.execute(&spec).await?;
                } else {
                    create_named_pipe_for_dump(&dump_filename)?;
                    processes.push(ctx.runner.spawn(&spec)?);
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
            let command = make_restore_command(
                database,
                &connection,
                extract.is_none().then_some(dump_filename.as_str()),
            );

            debug!(
                "{}: Restoring MongoDB database {}{}",
                ctx.log_prefix,
                database.name,
                ctx.dry_run_label("restoring")
            );
            if ctx.dry_run {
                return Ok(());
            }

            let spec = CommandSpec::new(command).output_log_level(LogLevel::Debug);
            let processes: Vec<ProcessHandle> = extract.into_iter().collect();
            let pipe = !processes.is_empty();
            ctx.runner
                .execute_with_processes(&spec, processes, pipe)
                .await
                .map(|_| ())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn archive_dump_is_redirected_into_pipe() {
        let mut database = DatabaseConfig::named("events");
        database.username = Some("admin".into());
        database.password = Some("pw".into());
        database.authentication_database = Some("admin".into());

        assert_eq!(
            make_dump_command(&database, "/b/mongodb_databases/localhost/events"),
            "mongodump --username admin --password pw --authenticationDatabase admin \
             --db events --archive > /b/mongodb_databases/localhost/events"
        );
    }

    #[test]
    fn directory_dump_uses_out() {
        let mut database = DatabaseConfig::named("all");
        database.format = Some("directory".into());
        assert_eq!(make_dump_command(&database, "/d"), "mongodump --out /d");
    }

    #[test]
    fn restore_drops_and_reads_archive() {
        let database = DatabaseConfig::named("events");
        assert_eq!(
            make_restore_command(&database, &RestoreConnection::default(), None),
            vec!["mongorestore", "--archive", "--db", "events", "--drop"]
        );
    }
}
