// src/cli.rs

//! CLI argument parsing using `clap`.
//!
//! Several actions may be given in one invocation (`borgkeeper prune create
//! --stats`), so argv is first split at action names and each segment is
//! parsed as a single subcommand. Global flags are accepted anywhere before
//! the `borg` passthrough action.

use std::collections::BTreeMap;
use std::iter;
use std::path::PathBuf;

use clap::error::ErrorKind;
use clap::{Args, CommandFactory, Parser, Subcommand};

use crate::types::Action;

/// Command-line arguments for one parsed segment.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "borgkeeper",
    version,
    about = "Drive borg backups across repositories, with hooks, database dumps and monitoring.",
    long_about = None
)]
pub struct CliArgs {
    #[command(flatten)]
    pub global: GlobalArguments,

    #[command(subcommand)]
    pub action: Option<ActionArguments>,
}

/// Flags that apply to the whole run.
#[derive(Debug, Clone, Default, Args)]
pub struct GlobalArguments {
    /// Configuration file or directory (repeatable). Defaults to
    /// /etc/borgkeeper/config.yaml, /etc/borgkeeper.d and the per-user config.
    #[arg(short = 'c', long = "config", value_name = "PATH", global = true)]
    pub config_paths: Vec<PathBuf>,

    /// Go through the motions without changing any repository.
    #[arg(short = 'n', long, global = true)]
    pub dry_run: bool,

    /// Console verbosity from -2 (silent) to 2 (trace).
    #[arg(
        short = 'v',
        long,
        value_name = "LEVEL",
        allow_negative_numbers = true,
        value_parser = clap::value_parser!(i8).range(-2..=2),
        global = true
    )]
    pub verbosity: Option<i8>,

    /// Also write logs to this file.
    #[arg(long, value_name = "PATH", global = true)]
    pub log_file: Option<PathBuf>,

    /// Verbosity for --log-file, from -2 to 2.
    #[arg(
        long,
        value_name = "LEVEL",
        allow_negative_numbers = true,
        value_parser = clap::value_parser!(i8).range(-2..=2),
        global = true
    )]
    pub log_file_verbosity: Option<i8>,

    /// Override a configuration value, e.g. `retries=3` (repeatable).
    #[arg(long = "override", value_name = "OPTION.SUB=VALUE", global = true)]
    pub overrides: Vec<String>,

    /// Disable coloured output.
    #[arg(long, global = true)]
    pub no_color: bool,
}

impl GlobalArguments {
    pub fn verbosity_level(&self) -> i8 {
        self.verbosity.unwrap_or(0)
    }
}

#[derive(Debug, Clone, Subcommand)]
pub enum ActionArguments {
    /// Create a new, empty repository.
    #[command(name = "repo-create", aliases = ["init", "rcreate"])]
    RepoCreate(RepoCreateArguments),
    /// Copy archives from another repository.
    Transfer(TransferArguments),
    /// Delete archives according to the retention policy.
    Prune(PruneArguments),
    /// Free space freed by prune.
    Compact(CompactArguments),
    /// Create an archive (the actual backup).
    Create(CreateArguments),
    /// Check repositories and archives for consistency.
    Check(CheckArguments),
    /// Extract files from an archive.
    Extract(ExtractArguments),
    /// Export an archive as a tarball.
    #[command(name = "export-tar")]
    ExportTar(ExportTarArguments),
    /// Mount an archive or repository as a FUSE filesystem.
    Mount(MountArguments),
    /// Unmount a FUSE mount point.
    Umount(UmountArguments),
    /// Restore database dumps from an archive.
    Restore(RestoreArguments),
    /// List archives in a repository.
    #[command(name = "repo-list", alias = "rlist")]
    RepoList(RepoListArguments),
    /// List archives or files in an archive.
    List(ListArguments),
    /// Show repository summary information.
    #[command(name = "repo-info", alias = "rinfo")]
    RepoInfo(RepoInfoArguments),
    /// Show archive summary information.
    Info(InfoArguments),
    /// Break a stale repository lock.
    #[command(name = "break-lock")]
    BreakLock(BreakLockArguments),
    /// Run an arbitrary borg command against the configured repository.
    Borg(BorgArguments),
    /// Configuration utilities.
    #[command(subcommand)]
    Config(ConfigArguments),
}

impl ActionArguments {
    pub fn action(&self) -> Action {
        match self {
            ActionArguments::RepoCreate(_) => Action::RepoCreate,
            ActionArguments::Transfer(_) => Action::Transfer,
            ActionArguments::Prune(_) => Action::Prune,
            ActionArguments::Compact(_) => Action::Compact,
            ActionArguments::Create(_) => Action::Create,
            ActionArguments::Check(_) => Action::Check,
            ActionArguments::Extract(_) => Action::Extract,
            ActionArguments::ExportTar(_) => Action::ExportTar,
            ActionArguments::Mount(_) => Action::Mount,
            ActionArguments::Umount(_) => Action::Umount,
            ActionArguments::Restore(_) => Action::Restore,
            ActionArguments::RepoList(_) => Action::RepoList,
            ActionArguments::List(_) => Action::List,
            ActionArguments::RepoInfo(_) => Action::RepoInfo,
            ActionArguments::Info(_) => Action::Info,
            ActionArguments::BreakLock(_) => Action::BreakLock,
            ActionArguments::Borg(_) => Action::Borg,
            ActionArguments::Config(_) => Action::Config,
        }
    }

    /// The `--repository` restriction, if this action has one.
    pub fn repository(&self) -> Option<&str> {
        let repository = match self {
            ActionArguments::RepoCreate(a) => &a.repository,
            ActionArguments::Transfer(a) => &a.repository,
            ActionArguments::Prune(a) => &a.repository,
            ActionArguments::Compact(a) => &a.repository,
            ActionArguments::Create(a) => &a.repository,
            ActionArguments::Check(a) => &a.repository,
            ActionArguments::Extract(a) => &a.repository,
            ActionArguments::ExportTar(a) => &a.repository,
            ActionArguments::Mount(a) => &a.repository,
            ActionArguments::Restore(a) => &a.repository,
            ActionArguments::RepoList(a) => &a.repository,
            ActionArguments::List(a) => &a.repository,
            ActionArguments::RepoInfo(a) => &a.repository,
            ActionArguments::Info(a) => &a.repository,
            ActionArguments::BreakLock(a) => &a.repository,
            ActionArguments::Borg(a) => &a.repository,
            ActionArguments::Umount(_) | ActionArguments::Config(_) => return None,
        };
        repository.as_deref()
    }
}

#[derive(Debug, Clone, Default, Args)]
pub struct RepoCreateArguments {
    #[arg(long)]
    pub repository: Option<String>,
    /// Encryption mode, e.g. repokey-blake2. Falls back to `encryption` in config.
    #[arg(short = 'e', long = "encryption", value_name = "MODE")]
    pub encryption_mode: Option<String>,
    #[arg(long)]
    pub append_only: bool,
    #[arg(long, value_name = "QUOTA")]
    pub storage_quota: Option<String>,
}

#[derive(Debug, Clone, Default, Args)]
pub struct TransferArguments {
    #[arg(long)]
    pub repository: Option<String>,
    /// Repository to copy archives from.
    #[arg(long, value_name = "PATH")]
    pub source_repository: String,
    #[arg(long)]
    pub archive: Option<String>,
    #[arg(long, value_name = "PATTERN")]
    pub match_archives: Option<String>,
}

#[derive(Debug, Clone, Default, Args)]
pub struct PruneArguments {
    #[arg(long)]
    pub repository: Option<String>,
    #[arg(long)]
    pub stats: bool,
    #[arg(long = "list")]
    pub list_details: bool,
}

#[derive(Debug, Clone, Default, Args)]
pub struct CompactArguments {
    #[arg(long)]
    pub repository: Option<String>,
    #[arg(long)]
    pub progress: bool,
    /// Minimum saved space percentage before segments are compacted.
    #[arg(long, value_name = "PERCENT")]
    pub threshold: Option<u32>,
}

#[derive(Debug, Clone, Default, Args)]
pub struct CreateArguments {
    #[arg(long)]
    pub repository: Option<String>,
    #[arg(long)]
    pub progress: bool,
    #[arg(long)]
    pub stats: bool,
    /// Show per-file details.
    #[arg(long = "list")]
    pub list_details: bool,
    /// Output results as JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Clone, Default, Args)]
pub struct CheckArguments {
    #[arg(long)]
    pub repository: Option<String>,
    #[arg(long)]
    pub progress: bool,
    #[arg(long)]
    pub repair: bool,
    /// Run only this check (repository, archives, data). Repeatable.
    #[arg(long = "only", value_name = "CHECK")]
    pub only: Vec<String>,
}

#[derive(Debug, Clone, Default, Args)]
pub struct ExtractArguments {
    #[arg(long)]
    pub repository: Option<String>,
    /// Archive name, or "latest".
    #[arg(long)]
    pub archive: String,
    #[arg(long = "path", value_name = "PATH", num_args = 1..)]
    pub paths: Vec<String>,
    #[arg(long, value_name = "PATH")]
    pub destination: Option<PathBuf>,
    #[arg(long, value_name = "NUMBER")]
    pub strip_components: Option<u32>,
    #[arg(long)]
    pub progress: bool,
}

#[derive(Debug, Clone, Default, Args)]
pub struct ExportTarArguments {
    #[arg(long)]
    pub repository: Option<String>,
    #[arg(long)]
    pub archive: String,
    #[arg(long = "path", value_name = "PATH", num_args = 1..)]
    pub paths: Vec<String>,
    /// Tarball path, or "-" for stdout.
    #[arg(long, value_name = "PATH")]
    pub destination: String,
    #[arg(long, value_name = "PROGRAM")]
    pub tar_filter: Option<String>,
    #[arg(long, value_name = "NUMBER")]
    pub strip_components: Option<u32>,
}

#[derive(Debug, Clone, Default, Args)]
pub struct MountArguments {
    #[arg(long)]
    pub repository: Option<String>,
    #[arg(long)]
    pub archive: Option<String>,
    #[arg(long, value_name = "PATH")]
    pub mount_point: PathBuf,
    #[arg(long = "path", value_name = "PATH", num_args = 1..)]
    pub paths: Vec<String>,
    #[arg(long)]
    pub foreground: bool,
}

#[derive(Debug, Clone, Default, Args)]
pub struct UmountArguments {
    #[arg(long, value_name = "PATH")]
    pub mount_point: PathBuf,
}

#[derive(Debug, Clone, Default, Args)]
pub struct RestoreArguments {
    #[arg(long)]
    pub repository: Option<String>,
    /// Archive name, or "latest".
    #[arg(long)]
    pub archive: String,
    /// Databases to restore; omit or pass "all" for everything in the archive.
    #[arg(long = "database", value_name = "NAME", num_args = 1..)]
    pub databases: Vec<String>,
    #[arg(long)]
    pub hostname: Option<String>,
    #[arg(long)]
    pub port: Option<u16>,
    #[arg(long)]
    pub username: Option<String>,
    #[arg(long)]
    pub password: Option<String>,
}

#[derive(Debug, Clone, Default, Args)]
pub struct RepoListArguments {
    #[arg(long)]
    pub repository: Option<String>,
    #[arg(long)]
    pub short: bool,
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Clone, Default, Args)]
pub struct ListArguments {
    #[arg(long)]
    pub repository: Option<String>,
    #[arg(long)]
    pub archive: Option<String>,
    #[arg(long = "path", value_name = "PATH", num_args = 1..)]
    pub paths: Vec<String>,
    #[arg(long)]
    pub short: bool,
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Clone, Default, Args)]
pub struct RepoInfoArguments {
    #[arg(long)]
    pub repository: Option<String>,
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Clone, Default, Args)]
pub struct InfoArguments {
    #[arg(long)]
    pub repository: Option<String>,
    #[arg(long)]
    pub archive: Option<String>,
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Clone, Default, Args)]
pub struct BreakLockArguments {
    #[arg(long)]
    pub repository: Option<String>,
}

#[derive(Debug, Clone, Default, Args)]
pub struct BorgArguments {
    #[arg(long)]
    pub repository: Option<String>,
    #[arg(long)]
    pub archive: Option<String>,
    /// Arguments handed to borg verbatim.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, value_name = "OPTIONS")]
    pub options: Vec<String>,
}

#[derive(Debug, Clone, Subcommand)]
pub enum ConfigArguments {
    /// Extract the configuration files stored in an archive.
    Bootstrap(BootstrapArguments),
    /// Write a sample configuration file.
    Generate(GenerateArguments),
    /// Check configuration files and report problems.
    Validate(ValidateArguments),
    /// Print the loaded configuration as YAML.
    Show,
}

#[derive(Debug, Clone, Default, Args)]
pub struct BootstrapArguments {
    #[arg(long)]
    pub repository: String,
    #[arg(long, default_value = "latest")]
    pub archive: String,
    /// Where to extract the configuration files (defaults to /).
    #[arg(long, value_name = "PATH")]
    pub destination: Option<PathBuf>,
    /// Source directory the archive was created with.
    #[arg(long, value_name = "PATH")]
    pub source_directory: Option<String>,
    #[arg(long, value_name = "NUMBER")]
    pub strip_components: Option<u32>,
    #[arg(long)]
    pub progress: bool,
}

#[derive(Debug, Clone, Default, Args)]
pub struct GenerateArguments {
    #[arg(short = 'd', long, value_name = "PATH")]
    pub destination: Option<PathBuf>,
    #[arg(long)]
    pub overwrite: bool,
}

#[derive(Debug, Clone, Default, Args)]
pub struct ValidateArguments {
    /// Also print the validated configuration.
    #[arg(short = 's', long)]
    pub show: bool,
}

/// Parsed invocation: global flags plus every requested action.
///
/// `actions` is keyed by [`Action`], whose ordering is the canonical
/// execution order.
#[derive(Debug, Clone)]
pub struct Arguments {
    pub global: GlobalArguments,
    pub actions: BTreeMap<Action, ActionArguments>,
}

impl Arguments {
    pub fn has(&self, action: Action) -> bool {
        self.actions.contains_key(&action)
    }

    pub fn get(&self, action: Action) -> Option<&ActionArguments> {
        self.actions.get(&action)
    }

    pub fn uses_primary_action(&self) -> bool {
        self.actions.keys().any(|action| action.is_primary())
    }
}

const ACTION_NAMES: [&str; 22] = [
    "repo-create", "init", "rcreate", "transfer", "prune", "compact", "create", "check",
    "extract", "export-tar", "mount", "umount", "restore", "repo-list", "rlist", "list",
    "repo-info", "rinfo", "info", "break-lock", "borg", "config",
];

/// Action options whose next token is a value, even if it looks like an
/// action name (`check --only extract`).
const ACTION_VALUE_OPTIONS: [&str; 19] = [
    "--repository", "--archive", "--path", "--destination", "--mount-point", "--database",
    "--hostname", "--port", "--username", "--password", "--only", "--threshold",
    "--strip-components", "--encryption", "-e", "--source-repository", "--source-directory",
    "--tar-filter", "--match-archives",
];

/// Global flags and whether they take a value.
fn global_flag(arg: &str) -> Option<bool> {
    let name = arg.split_once('=').map(|(n, _)| n).unwrap_or(arg);
    match name {
        "-c" | "--config" | "-v" | "--verbosity" | "--log-file" | "--log-file-verbosity"
        | "--override" => Some(!arg.contains('=')),
        "-n" | "--dry-run" | "--no-color" => Some(false),
        _ => None,
    }
}

/// Convenience wrapper around [`parse_from`] for the process arguments.
pub fn parse() -> Result<Arguments, clap::Error> {
    parse_from(std::env::args().skip(1))
}

/// Parse arguments (without the program name).
pub fn parse_from<I, S>(args: I) -> Result<Arguments, clap::Error>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let args: Vec<String> = args.into_iter().map(Into::into).collect();

    let mut globals: Vec<String> = Vec::new();
    let mut segments: Vec<Vec<String>> = Vec::new();
    let mut index = 0;

    while index < args.len() {
        let arg = &args[index];
        index += 1;

        let in_borg = segments
            .last()
            .and_then(|segment| segment.first())
            .is_some_and(|first| first == "borg");
        if in_borg {
            if let Some(segment) = segments.last_mut() {
                segment.push(arg.clone());
            }
            continue;
        }

        if let Some(takes_value) = global_flag(arg) {
            globals.push(arg.clone());
            if takes_value && index < args.len() {
                globals.push(args[index].clone());
                index += 1;
            }
            continue;
        }

        let after_value_option = segments
            .last()
            .and_then(|segment| segment.last())
            .is_some_and(|last| ACTION_VALUE_OPTIONS.contains(&last.as_str()));

        if ACTION_NAMES.contains(&arg.as_str()) && !after_value_option {
            segments.push(vec![arg.clone()]);
        } else if let Some(segment) = segments.last_mut() {
            segment.push(arg.clone());
        } else {
            globals.push(arg.clone());
        }
    }

    let program = || iter::once("borgkeeper".to_string());
    let global = CliArgs::try_parse_from(program().chain(globals))?.global;

    let mut actions = BTreeMap::new();
    for segment in segments {
        let parsed = CliArgs::try_parse_from(program().chain(segment))?;
        if let Some(action_args) = parsed.action {
            let action = action_args.action();
            if actions.insert(action, action_args).is_some() {
                return Err(CliArgs::command().error(
                    ErrorKind::ArgumentConflict,
                    format!("the {action} action was given more than once"),
                ));
            }
        }
    }

    if actions.is_empty() {
        for (action, arguments) in default_actions() {
            actions.insert(action, arguments);
        }
    }

    Ok(Arguments { global, actions })
}

/// `create prune compact check` with default options.
fn default_actions() -> Vec<(Action, ActionArguments)> {
    vec![
        (Action::Prune, ActionArguments::Prune(PruneArguments::default())),
        (Action::Compact, ActionArguments::Compact(CompactArguments::default())),
        (Action::Create, ActionArguments::Create(CreateArguments::default())),
        (Action::Check, ActionArguments::Check(CheckArguments::default())),
    ]
}
