// src/hooks/data_source/dump.rs

//! Filesystem layout of database dumps: where they go, how they're named,
//! and how to find them again inside an archive.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use nix::sys::stat::Mode;
use nix::unistd::mkfifo;
use tracing::debug;

use crate::config::paths::expand_home;
use crate::errors::{BorgkeeperError, Result};

/// `{source_directory}/{hook_name}`, with `~` expanded.
pub fn make_dump_path(source_directory: &str, hook_name: &str) -> PathBuf {
    expand_home(source_directory).join(hook_name)
}

/// `{dump_path}/{hostname or localhost}/{name}`.
pub fn make_dump_filename(dump_path: &Path, name: &str, hostname: Option<&str>) -> Result<PathBuf> {
    if name.is_empty() || name.contains('/') {
        return Err(BorgkeeperError::ConfigError(format!(
            "Invalid database name {name}"
        )));
    }
    Ok(dump_path
        .join(hostname.filter(|h| !h.is_empty()).unwrap_or("localhost"))
        .join(name))
}

/// Create a named pipe at `path`, creating parent directories as needed.
pub fn create_named_pipe_for_dump(path: &Path) -> Result<()> {
    create_parent_directory_for_dump(path)?;
    mkfifo(path, Mode::S_IRUSR | Mode::S_IWUSR)
        .map_err(|errno| BorgkeeperError::IoError(std::io::Error::from(errno)))
}

pub fn create_parent_directory_for_dump(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

/// Delete every dump a hook may have left behind.
pub fn remove_data_source_dumps(dump_path: &Path, hook_label: &str, log_prefix: &str, dry_run: bool) -> Result<()> {
    let dry_run_label = if dry_run {
        " (dry run; not actually removing anything)"
    } else {
        ""
    };
    debug!("{log_prefix}: Removing {hook_label} data source dumps{dry_run_label}");

    if dry_run || !dump_path.exists() {
        return Ok(());
    }
    fs::remove_dir_all(dump_path)?;
    Ok(())
}

/// Turn absolute glob patterns into one engine `sh:` pattern.
///
/// Archive paths are stored without the leading slash.
pub fn convert_glob_patterns_to_borg_pattern(patterns: &[String]) -> String {
    let stripped: Vec<&str> = patterns.iter().map(|p| p.trim_start_matches('/')).collect();
    if stripped.len() == 1 {
        format!("sh:{}", stripped[0])
    } else {
        format!("sh:{{{}}}", stripped.join(","))
    }
}

/// Parse archive paths of dumps into `{hook_name: [database names]}`.
///
/// Paths look like `root/.borgmatic/postgresql_databases/localhost/users`,
/// possibly with more components below the database name for
/// directory-format dumps. Paths outside `source_directory` are ignored.
pub fn parse_dump_paths<'a, I>(paths: I, source_directory: &Path) -> BTreeMap<String, Vec<String>>
where
    I: IntoIterator<Item = &'a str>,
{
    let prefix = source_directory.to_string_lossy();
    let prefix = format!("{}/", prefix.trim_start_matches('/').trim_end_matches('/'));

    let mut found: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for path in paths {
        let path = path.trim().trim_start_matches('/');
        let Some((_, rest)) = path.split_once(prefix.as_str()) else {
            continue;
        };
        let mut parts = rest.split('/');
        let (Some(hook_name), Some(_hostname), Some(name)) = (parts.next(), parts.next(), parts.next())
        else {
            continue;
        };
        if name.is_empty() {
            continue;
        }
        let names = found.entry(hook_name.to_string()).or_default();
        if !names.iter().any(|existing| existing == name) {
            names.push(name.to_string());
        }
    }
    found
}
