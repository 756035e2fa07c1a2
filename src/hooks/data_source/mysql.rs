// src/hooks/data_source/mysql.rs

//! MySQL and MariaDB. The two differ only in program names and labels.

use std::collections::BTreeMap;

use tracing::{debug, info, warn};

use crate::config::model::{Configuration, DatabaseConfig};
use crate::errors::{BorgkeeperError, Result};
use crate::exec::{BoxFuture, CommandSpec, ProcessHandle};
use crate::hooks::data_source::dump::{create_named_pipe_for_dump, make_dump_filename};
use crate::hooks::data_source::{
    client_command, environment_from, split_options, ConnectionOverrides, DataSourceContext, DataSourceHook,
};
use crate::types::LogLevel;

const SYSTEM_DATABASE_NAMES: [&str; 4] = ["information_schema", "mysql", "performance_schema", "sys"];

#[derive(Debug, Clone, Copy)]
pub struct MySqlHook {
    name: &'static str,
    label: &'static str,
    client: &'static str,
    dump_program: &'static str,
}

impl MySqlHook {
    pub const fn mysql() -> Self {
        Self {
            name: "mysql_databases",
            label: "MySQL",
            client: "mysql",
            dump_program: "mysqldump",
        }
    }

    pub const fn mariadb() -> Self {
        Self {
            name: "mariadb_databases",
            label: "MariaDB",
            client: "mariadb",
            dump_program: "mariadb-dump",
        }
    }

    fn is_mariadb(&self) -> bool {
        self.name == "mariadb_databases"
    }

    /// The dump program, honoring a configured override.
    fn dump_program(&self, database: &DatabaseConfig) -> Vec<String> {
        let custom = if self.is_mariadb() {
            database.mariadb_dump_command.as_ref()
        } else {
            database.mysql_dump_command.as_ref()
        };
        client_command(custom, self.dump_program)
    }

    /// The client used for listing and restoring, honoring a configured override.
    fn client(&self, database: &DatabaseConfig) -> Vec<String> {
        let custom = if self.is_mariadb() {
            database.mariadb_command.as_ref()
        } else {
            database.mysql_command.as_ref()
        };
        client_command(custom, self.client)
    }

    /// `mysqldump` writing straight into `dump_filename`.
    pub fn make_dump_command(
        &self,
        database: &DatabaseConfig,
        database_names: &[String],
        dump_filename: &str,
    ) -> Vec<String> {
        let mut command = self.dump_program(database);
        command.extend(split_options(database.options.as_ref()));
        if database.add_drop_database {
            command.push("--add-drop-database".to_string());
        }
        command.extend(connection_flags(
            database.hostname.as_deref(),
            database.port,
            database.username.as_deref(),
        ));
        command.push("--databases".to_string());
        command.extend(database_names.iter().cloned());
        command.extend(["--result-file".to_string(), dump_filename.to_string()]);
        command
    }

    pub fn make_restore_command(
        &self,
        database: &DatabaseConfig,
        connection: &crate::hooks::data_source::RestoreConnection,
    ) -> Vec<String> {
        let mut command = self.client(database);
        command.extend(split_options(database.restore_options.as_ref()));
        command.push("--batch".to_string());
        command.extend(connection_flags(
            connection.hostname.as_deref(),
            connection.port,
            connection.username.as_deref(),
        ));
        command
    }

    async fn database_names_to_dump(
        &self,
        ctx: DataSourceContext<'_>,
        database: &DatabaseConfig,
        environment: &BTreeMap<String, String>,
    ) -> Result<Vec<String>> {
        if !database.is_all() {
            return Ok(vec![database.name.clone()]);
        }
        if ctx.dry_run {
            return Ok(Vec::new());
        }

        let mut command = self.client(database);
        command.extend(split_options(database.list_options.as_ref()));
        command.extend(connection_flags(
            database.hostname.as_deref(),
            database.port,
            database.username.as_deref(),
        ));
        command.extend(
            ["--skip-column-names", "--batch", "--execute", "show schemas"].map(String::from),
        );

        debug!(
            "{}: Querying for \"all\" {} databases to dump",
            ctx.log_prefix, self.label
        );
        let output = ctx
            .runner
            .capture(&CommandSpec::new(command).with_env(environment.clone()))
            .await?;
        Ok(parse_schema_list(&output))
    }

    async fn dump_one(
        &self,
        ctx: DataSourceContext<'_>,
        database: &DatabaseConfig,
        dump_name: &str,
        database_names: &[String],
        environment: &BTreeMap<String, String>,
    ) -> Result<Option<ProcessHandle>> {
        let dump_filename =
            make_dump_filename(&self.dump_path(ctx.config), dump_name, database.hostname.as_deref())?;
        if dump_filename.exists() {
            warn!(
                "{}: Skipping duplicate dump of {} database \"{dump_name}\" to {}",
                ctx.log_prefix,
                self.label,
                dump_filename.display()
            );
            return Ok(None);
        }

        let filename = dump_filename.to_string_lossy();
        let command = self.make_dump_command(database, database_names, &filename);
        debug!(
            "{}: Dumping {} database \"{dump_name}\" to {filename}{}",
            ctx.log_prefix,
            self.label,
            ctx.dry_run_label("dumping")
        );
        if ctx.dry_run {
            return Ok(None);
        }

        create_named_pipe_for_dump(&dump_filename)?;
        let spec = CommandSpec::new(command).with_env(environment.clone());
        ctx.runner.spawn(&spec).map(Some)
    }
}

fn connection_flags(hostname: Option<&str>, port: Option<u16>, username: Option<&str>) -> Vec<String> {
    let mut flags = Vec::new();
    if let Some(hostname) = hostname {
        flags.extend(["--host".to_string(), hostname.to_string()]);
    }
    if let Some(port) = port {
        flags.extend(["--port".to_string(), port.to_string()]);
    }
    if hostname.is_some() || port.is_some() {
        flags.extend(["--protocol".to_string(), "tcp".to_string()]);
    }
    if let Some(username) = username {
        flags.extend(["--user".to_string(), username.to_string()]);
    }
    flags
}

/// `show schemas` output minus the system schemas.
pub fn parse_schema_list(output: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|name| !name.is_empty() && !SYSTEM_DATABASE_NAMES.contains(name))
        .map(str::to_string)
        .collect()
}

impl DataSourceHook for MySqlHook {
    fn name(&self) -> &'static str {
        self.name
    }

    fn label(&self) -> &'static str {
        self.label
    }

    fn databases<'c>(&self, config: &'c Configuration) -> &'c [DatabaseConfig] {
        if self.is_mariadb() {
            &config.mariadb_databases
        } else {
            &config.mysql_databases
        }
    }

    fn dump<'a>(
        &'a self,
        ctx: DataSourceContext<'a>,
        databases: &'a [DatabaseConfig],
    ) -> BoxFuture<'a, Result<Vec<ProcessHandle>>> {
        Box::pin(async move {
            info!(
                "{}: Dumping {} databases{}",
                ctx.log_prefix,
                self.label,
                ctx.dry_run_label("dumping")
            );
            let mut processes = Vec::new();

            for database in databases {
                let environment = environment_from([("MYSQL_PWD", database.password.as_ref())]);
                let names = self.database_names_to_dump(ctx, database, &environment).await?;
                if names.is_empty() {
                    if ctx.dry_run {
                        continue;
                    }
                    return Err(BorgkeeperError::ConfigError(format!(
                        "Cannot find any {} databases to dump.",
                        self.label
                    )));
                }

                if database.is_all() && database.format.is_some() {
                    for name in &names {
                        let single = std::slice::from_ref(name);
                        processes.extend(
                            self.dump_one(ctx, database, name, single, &environment).await?,
                        );
                    }
                } else {
                    processes.extend(
                        self.dump_one(ctx, database, &database.name, &names, &environment)
                            .await?,
                    );
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
            let command = self.make_restore_command(database, &connection);
            let environment = environment_from([("MYSQL_PWD", connection.password.as_ref())]);

            debug!(
                "{}: Restoring {} database {}{}",
                ctx.log_prefix,
                self.label,
                database.name,
                ctx.dry_run_label("restoring")
            );
            if ctx.dry_run {
                return Ok(());
            }

            let spec = CommandSpec::new(command)
                .with_env(environment)
                .output_log_level(LogLevel::Debug);
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
    use crate::hooks::data_source::RestoreConnection;

    #[test]
    fn dump_command_uses_tcp_when_host_given() {
        let mut database = DatabaseConfig::named("shop");
        database.hostname = Some("db".into());
        database.username = Some("root".into());

        let command =
            MySqlHook::mysql().make_dump_command(&database, &["shop".into()], "/b/m/db/shop");
        assert_eq!(
            command,
            vec![
                "mysqldump", "--add-drop-database", "--host", "db", "--protocol", "tcp", "--user",
                "root", "--databases", "shop", "--result-file", "/b/m/db/shop"
            ]
        );
    }

    #[test]
    fn mariadb_uses_its_own_programs() {
        let database = DatabaseConfig::named("shop");
        let dump = MySqlHook::mariadb().make_dump_command(&database, &["shop".into()], "/f");
        assert_eq!(dump[0], "mariadb-dump");

        let restore =
            MySqlHook::mariadb().make_restore_command(&database, &RestoreConnection::default());
        assert_eq!(restore, vec!["mariadb", "--batch"]);
    }

    #[test]
    fn configured_commands_only_apply_to_their_own_kind() {
        let mut database = DatabaseConfig::named("shop");
        database.mysql_dump_command = Some("docker exec db mysqldump".into());
        database.mariadb_command = Some("/usr/local/bin/mariadb".into());

        let dump = MySqlHook::mysql().make_dump_command(&database, &["shop".into()], "/f");
        assert_eq!(&dump[..4], ["docker", "exec", "db", "mysqldump"]);
        let dump = MySqlHook::mariadb().make_dump_command(&database, &["shop".into()], "/f");
        assert_eq!(dump[0], "mariadb-dump");

        let connection = RestoreConnection::default();
        assert_eq!(
            MySqlHook::mariadb().make_restore_command(&database, &connection),
            vec!["/usr/local/bin/mariadb", "--batch"]
        );
        assert_eq!(
            MySqlHook::mysql().make_restore_command(&database, &connection),
            vec!["mysql", "--batch"]
        );
    }

    #[test]
    fn schema_list_skips_system_schemas() {
        let output = "information_schema\nmysql\nperformance_schema\nshop\nsys\nblog\n";
        assert_eq!(parse_schema_list(output), vec!["shop", "blog"]);
    }
}
