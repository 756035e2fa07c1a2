// src/config/model.rs

use serde::{Deserialize, Serialize};

use crate::hooks::monitor::State;

/// One loaded configuration file.
///
/// Mirrors a YAML file such as:
///
/// ```yaml
/// source_directories:
///     - /home
/// repositories:
///     - path: ssh://backup@nas/./main.borg
///       label: nas
///     - /mnt/usb/backup.borg
/// retries: 2
/// retry_wait: 10
/// keep_daily: 7
/// hooks:
///     before_backup:
///         - echo "starting"
/// postgresql_databases:
///     - name: all
/// healthchecks:
///     ping_url: https://hc-ping.com/addffa72-da17-40ae-be9c-ff591afb942a
/// ```
///
/// Every field has a default, so an almost-empty file deserializes; the
/// semantic checks live in [`crate::config::validate`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Configuration {
    pub source_directories: Vec<String>,
    pub repositories: Vec<Repository>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub exclude_patterns: Vec<String>,
    pub one_file_system: bool,
    pub read_special: bool,

    pub local_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub umask: Option<Umask>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lock_wait: Option<u64>,
    pub archive_name_format: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compression: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encryption: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encryption_passphrase: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encryption_passcommand: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ssh_command: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub borg_base_directory: Option<String>,
    pub borgmatic_source_directory: String,
    pub store_config_files: bool,
    #[serde(skip_serializing_if = "ExtraBorgOptions::is_empty")]
    pub extra_borg_options: ExtraBorgOptions,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub borg_exit_codes: Vec<ExitCodeRule>,

    pub retries: u32,
    pub retry_wait: u64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub keep_within: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keep_secondly: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keep_minutely: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keep_hourly: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keep_daily: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keep_weekly: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keep_monthly: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keep_yearly: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compact_threshold: Option<u32>,

    pub checks: Vec<CheckKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub check_last: Option<u32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub check_repositories: Vec<String>,

    pub hooks: Hooks,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub postgresql_databases: Vec<DatabaseConfig>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub mysql_databases: Vec<DatabaseConfig>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub mariadb_databases: Vec<DatabaseConfig>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub mongodb_databases: Vec<DatabaseConfig>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sqlite_databases: Vec<DatabaseConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub healthchecks: Option<MonitorConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cronitor: Option<MonitorConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cronhub: Option<MonitorConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagerduty: Option<MonitorConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ntfy: Option<NtfyConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uptime_kuma: Option<UptimeKumaConfig>,
}

pub const DEFAULT_ARCHIVE_NAME_FORMAT: &str = "{hostname}-{now:%Y-%m-%dT%H:%M:%S.%f}";
pub const DEFAULT_SOURCE_DIRECTORY: &str = "~/.borgmatic";

impl Default for Configuration {
    fn default() -> Self {
        Self {
            source_directories: Vec::new(),
            repositories: Vec::new(),
            exclude_patterns: Vec::new(),
            one_file_system: false,
            read_special: false,
            local_path: "borg".to_string(),
            remote_path: None,
            umask: None,
            lock_wait: None,
            archive_name_format: DEFAULT_ARCHIVE_NAME_FORMAT.to_string(),
            compression: None,
            encryption: None,
            encryption_passphrase: None,
            encryption_passcommand: None,
            ssh_command: None,
            borg_base_directory: None,
            borgmatic_source_directory: DEFAULT_SOURCE_DIRECTORY.to_string(),
            store_config_files: true,
            extra_borg_options: ExtraBorgOptions::default(),
            borg_exit_codes: Vec::new(),
            retries: 0,
            retry_wait: 0,
            keep_within: None,
            keep_secondly: None,
            keep_minutely: None,
            keep_hourly: None,
            keep_daily: None,
            keep_weekly: None,
            keep_monthly: None,
            keep_yearly: None,
            compact_threshold: None,
            checks: vec![CheckKind::Repository, CheckKind::Archives],
            check_last: None,
            check_repositories: Vec::new(),
            hooks: Hooks::default(),
            postgresql_databases: Vec::new(),
            mysql_databases: Vec::new(),
            mariadb_databases: Vec::new(),
            mongodb_databases: Vec::new(),
            sqlite_databases: Vec::new(),
            healthchecks: None,
            cronitor: None,
            cronhub: None,
            pagerduty: None,
            ntfy: None,
            uptime_kuma: None,
        }
    }
}

/// A repository entry: either a bare path string or `{path, label}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RepositoryRepr")]
pub struct Repository {
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RepositoryRepr {
    Path(String),
    Full {
        path: String,
        #[serde(default)]
        label: Option<String>,
    },
}

impl From<RepositoryRepr> for Repository {
    fn from(repr: RepositoryRepr) -> Self {
        match repr {
            RepositoryRepr::Path(path) => Repository { path, label: None },
            RepositoryRepr::Full { path, label } => Repository { path, label },
        }
    }
}

impl Repository {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            label: None,
        }
    }

    /// The label if one was configured, otherwise the path.
    pub fn display_label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.path)
    }
}

/// Octal umask, written in config either as a number (`0077`) or a string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "UmaskRepr", into = "String")]
pub struct Umask(pub u32);

#[derive(Deserialize)]
#[serde(untagged)]
enum UmaskRepr {
    Number(u64),
    Text(String),
}

impl TryFrom<UmaskRepr> for Umask {
    type Error = String;

    fn try_from(repr: UmaskRepr) -> Result<Self, Self::Error> {
        let digits = match repr {
            UmaskRepr::Number(n) => n.to_string(),
            UmaskRepr::Text(s) => s.trim().trim_start_matches("0o").to_string(),
        };
        u32::from_str_radix(&digits, 8)
            .ok()
            .filter(|mask| *mask <= 0o777)
            .map(Umask)
            .ok_or_else(|| format!("invalid umask: {digits} (expected octal, e.g. 0077)"))
    }
}

impl From<Umask> for String {
    fn from(umask: Umask) -> Self {
        format!("{:04o}", umask.0)
    }
}

/// Shell commands to run at lifecycle points.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Hooks {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub before_everything: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub after_everything: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub before_actions: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub after_actions: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub before_backup: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub after_backup: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub before_prune: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub after_prune: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub before_compact: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub after_compact: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub before_check: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub after_check: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub before_extract: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub after_extract: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub on_error: Vec<String>,
}

/// A database to dump before `create` and restore on request.
///
/// One struct serves every data-source kind; fields a kind doesn't use are
/// ignored by it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatabaseConfig {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub list_options: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restore_options: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restore_hostname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restore_port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restore_username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restore_password: Option<String>,

    /// SQLite database file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restore_path: Option<String>,

    /// PostgreSQL only.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub no_owner: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssl_mode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssl_cert: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssl_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssl_root_cert: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssl_crl: Option<String>,
    /// Restrict the restore to these schemas.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub schemas: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analyze_options: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pg_dump_command: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pg_restore_command: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub psql_command: Option<String>,

    /// MySQL / MariaDB only.
    #[serde(default = "default_true")]
    pub add_drop_database: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mysql_dump_command: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mysql_command: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mariadb_dump_command: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mariadb_command: Option<String>,

    /// MongoDB only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authentication_database: Option<String>,
}

fn default_true() -> bool {
    true
}

impl DatabaseConfig {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            hostname: None,
            port: None,
            username: None,
            password: None,
            format: None,
            options: None,
            list_options: None,
            restore_options: None,
            restore_hostname: None,
            restore_port: None,
            restore_username: None,
            restore_password: None,
            path: None,
            restore_path: None,
            no_owner: false,
            ssl_mode: None,
            ssl_cert: None,
            ssl_key: None,
            ssl_root_cert: None,
            ssl_crl: None,
            schemas: Vec::new(),
            analyze_options: None,
            pg_dump_command: None,
            pg_restore_command: None,
            psql_command: None,
            add_drop_database: true,
            mysql_dump_command: None,
            mysql_command: None,
            mariadb_dump_command: None,
            mariadb_command: None,
            authentication_database: None,
        }
    }

    pub fn is_all(&self) -> bool {
        self.name == "all"
    }
}

/// Which consistency checks `check` runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckKind {
    Repository,
    Archives,
    Data,
    Disabled,
}

/// Extra flags appended verbatim to individual engine commands.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExtraBorgOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repo_create: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub create: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prune: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compact: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub check: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extract: Option<String>,
}

impl ExtraBorgOptions {
    pub fn is_empty(&self) -> bool {
        *self == ExtraBorgOptions::default()
    }
}

/// Per-code override of the engine's exit code semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExitCodeRule {
    pub code: i32,
    pub treat_as: TreatAs,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TreatAs {
    Error,
    Warning,
}

/// A monitoring section: a bare ping URL (or key) or a map of options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MonitorConfig {
    Url(String),
    Options {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        ping_url: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        integration_key: Option<String>,
    },
}

impl MonitorConfig {
    /// The ping URL, or the integration key for PagerDuty.
    pub fn endpoint(&self) -> Option<&str> {
        match self {
            MonitorConfig::Url(url) => Some(url.as_str()),
            MonitorConfig::Options {
                ping_url,
                integration_key,
            } => ping_url.as_deref().or(integration_key.as_deref()),
        }
    }
}

/// ntfy topic notified on the configured states.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NtfyConfig {
    pub topic: String,
    #[serde(default = "default_ntfy_server")]
    pub server: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default = "default_ntfy_states")]
    pub states: Vec<State>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<NtfyMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish: Option<NtfyMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fail: Option<NtfyMessage>,
}

/// Per-state notification contents.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NtfyMessage {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<String>,
}

fn default_ntfy_server() -> String {
    "https://ntfy.sh".to_string()
}

fn default_ntfy_states() -> Vec<State> {
    vec![State::Fail]
}

impl NtfyConfig {
    pub fn message_for(&self, state: State) -> Option<&NtfyMessage> {
        match state {
            State::Start => self.start.as_ref(),
            State::Finish => self.finish.as_ref(),
            State::Fail => self.fail.as_ref(),
        }
    }
}

/// Uptime Kuma push monitor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UptimeKumaConfig {
    pub push_url: String,
    #[serde(default = "every_state")]
    pub states: Vec<State>,
    #[serde(default = "default_true")]
    pub verify_tls: bool,
}

fn every_state() -> Vec<State> {
    vec![State::Start, State::Finish, State::Fail]
}
