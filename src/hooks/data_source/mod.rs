// src/hooks/data_source/mod.rs

//! Database dump and restore hooks.
//!
//! Each database kind implements [`DataSourceHook`]. During `create`, every
//! hook with configured databases starts its dump processes writing into
//! named pipes under the source directory; the engine reads those pipes
//! while it builds the archive. Restore runs the other way: an engine
//! extract streams the dump into the database client's stdin.

pub mod dump;
pub mod mongodb;
pub mod mysql;
pub mod postgresql;
pub mod sqlite;

use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::config::model::{Configuration, DatabaseConfig};
use crate::errors::Result;
use crate::exec::{BoxFuture, CommandRunner, ProcessHandle};

pub use mongodb::MongoDbHook;
pub use mysql::MySqlHook;
pub use postgresql::PostgresqlHook;
pub use sqlite::SqliteHook;

/// What every data-source hook call needs besides its databases.
#[derive(Clone, Copy)]
pub struct DataSourceContext<'a> {
    pub runner: &'a dyn CommandRunner,
    pub config: &'a Configuration,
    pub log_prefix: &'a str,
    pub dry_run: bool,
}

impl DataSourceContext<'_> {
    pub fn dry_run_label(&self, what: &str) -> String {
        if self.dry_run {
            format!(" (dry run; not actually {what} anything)")
        } else {
            String::new()
        }
    }
}

/// Connection settings given on the command line for a restore. They win
/// over `restore_*` configuration, which wins over the regular settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionOverrides {
    pub hostname: Option<String>,
    pub port: Option<u16>,
    pub username: Option<String>,
    pub password: Option<String>,
}

/// Effective restore connection for one database.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestoreConnection {
    pub hostname: Option<String>,
    pub port: Option<u16>,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl ConnectionOverrides {
    pub fn resolve(&self, database: &DatabaseConfig) -> RestoreConnection {
        RestoreConnection {
            hostname: self
                .hostname
                .clone()
                .or_else(|| database.restore_hostname.clone())
                .or_else(|| database.hostname.clone()),
            port: self.port.or(database.restore_port).or(database.port),
            username: self
                .username
                .clone()
                .or_else(|| database.restore_username.clone())
                .or_else(|| database.username.clone()),
            password: self
                .password
                .clone()
                .or_else(|| database.restore_password.clone())
                .or_else(|| database.password.clone()),
        }
    }
}

/// A kind of database the orchestrator knows how to dump and restore.
pub trait DataSourceHook: Send + Sync {
    /// Configuration section and dump directory name, e.g.
    /// `postgresql_databases`.
    fn name(&self) -> &'static str;

    /// Human-readable label for logs.
    fn label(&self) -> &'static str;

    /// This hook's databases in `config`.
    fn databases<'c>(&self, config: &'c Configuration) -> &'c [DatabaseConfig];

    /// Start dumping `databases`. Returned processes write into named pipes
    /// and must be consumed by the engine. Directory-format dumps run to
    /// completion here and return no process.
    fn dump<'a>(
        &'a self,
        ctx: DataSourceContext<'a>,
        databases: &'a [DatabaseConfig],
    ) -> BoxFuture<'a, Result<Vec<ProcessHandle>>>;

    /// Delete all on-disk dumps for this hook.
    fn remove(&self, ctx: DataSourceContext<'_>) -> Result<()> {
        dump::remove_data_source_dumps(
            &self.dump_path(ctx.config),
            self.label(),
            ctx.log_prefix,
            ctx.dry_run,
        )
    }

    /// Glob patterns matching this hook's dump of `name` (or all dumps)
    /// inside an archive.
    fn make_pattern(&self, config: &Configuration, name: Option<&str>) -> Vec<String> {
        let path = self.dump_path(config);
        vec![format!("{}/*/{}", path.display(), name.unwrap_or("*"))]
    }

    /// Restore one database. `extract` streams the dump; `None` means the
    /// dump was extracted to its on-disk location (directory format).
    fn restore<'a>(
        &'a self,
        ctx: DataSourceContext<'a>,
        database: &'a DatabaseConfig,
        extract: Option<ProcessHandle>,
        overrides: &'a ConnectionOverrides,
    ) -> BoxFuture<'a, Result<()>>;

    fn dump_path(&self, config: &Configuration) -> PathBuf {
        dump::make_dump_path(&config.borgmatic_source_directory, self.name())
    }
}

static POSTGRESQL: PostgresqlHook = PostgresqlHook;
static MYSQL: MySqlHook = MySqlHook::mysql();
static MARIADB: MySqlHook = MySqlHook::mariadb();
static MONGODB: MongoDbHook = MongoDbHook;
static SQLITE: SqliteHook = SqliteHook;

/// Every known data-source hook, in dump order.
pub fn data_source_hooks() -> [&'static dyn DataSourceHook; 5] {
    [&POSTGRESQL, &MYSQL, &MARIADB, &MONGODB, &SQLITE]
}

pub fn hook_by_name(name: &str) -> Option<&'static dyn DataSourceHook> {
    data_source_hooks().into_iter().find(|hook| hook.name() == name)
}

/// Whether any database of any kind is configured.
pub fn has_databases(config: &Configuration) -> bool {
    data_source_hooks()
        .iter()
        .any(|hook| !hook.databases(config).is_empty())
}

/// Start dumps for every configured hook, collecting their processes.
pub async fn dump_all(ctx: DataSourceContext<'_>) -> Result<Vec<ProcessHandle>> {
    let mut processes = Vec::new();
    for hook in data_source_hooks() {
        let databases = hook.databases(ctx.config);
        if databases.is_empty() {
            continue;
        }
        processes.extend(hook.dump(ctx, databases).await?);
    }
    Ok(processes)
}

/// Remove dumps of every hook, configured or not, so stale pipes from an
/// aborted run can't end up in an archive.
pub fn remove_all(ctx: DataSourceContext<'_>) -> Result<()> {
    for hook in data_source_hooks() {
        hook.remove(ctx)?;
    }
    Ok(())
}

/// Environment entries for present values only.
pub(crate) fn environment_from<'a, I>(pairs: I) -> BTreeMap<String, String>
where
    I: IntoIterator<Item = (&'a str, Option<&'a String>)>,
{
    pairs
        .into_iter()
        .filter_map(|(name, value)| value.map(|v| (name.to_string(), v.clone())))
        .collect()
}

/// Split a configured options string the way a shell would.
pub(crate) fn split_options(options: Option<&String>) -> Vec<String> {
    crate::borg::flags::extra_options(options.map(String::as_str))
}

/// A configured client command, split into words, or `default` alone.
pub(crate) fn client_command(custom: Option<&String>, default: &str) -> Vec<String> {
    let command = split_options(custom);
    if command.is_empty() {
        vec![default.to_string()]
    } else {
        command
    }
}
