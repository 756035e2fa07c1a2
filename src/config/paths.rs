// src/config/paths.rs

//! Path helpers: `~` expansion, repository normalization and config file
//! discovery.

use std::fs;
use std::path::{Path, PathBuf};

/// Expand a leading `~` or `~/` to the current user's home directory.
pub fn expand_home(path: &str) -> PathBuf {
    if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    } else if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

/// Normalize a repository path for comparison.
///
/// Local paths (no `:`) and `file://` URLs become absolute; anything else
/// containing a colon is a remote repository and is returned verbatim.
pub fn normalize_repository_path(repository: &str) -> String {
    let local = if !repository.contains(':') {
        repository
    } else if let Some(rest) = repository.strip_prefix("file://") {
        rest
    } else {
        return repository.to_string();
    };

    let expanded = expand_home(local);
    std::path::absolute(&expanded)
        .unwrap_or(expanded)
        .to_string_lossy()
        .into_owned()
}

/// Default config locations, in load order.
pub fn default_config_paths() -> Vec<PathBuf> {
    let mut paths = vec![
        PathBuf::from("/etc/borgkeeper/config.yaml"),
        PathBuf::from("/etc/borgkeeper.d"),
    ];
    if let Some(user_config) = dirs::config_dir() {
        paths.push(user_config.join("borgkeeper").join("config.yaml"));
    }
    paths
}

fn is_config_file(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml" | "yml" | "toml")
    )
}

/// Expand the given config paths into concrete files.
///
/// Directories contribute their config files in sorted order. Paths that
/// don't exist are kept only when they were explicitly requested, so the
/// loader can report them; missing default paths are dropped silently.
pub fn collect_config_filenames(paths: &[PathBuf], explicit: bool) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for path in paths {
        if path.is_dir() {
            let mut entries: Vec<PathBuf> = match fs::read_dir(path) {
                Ok(read_dir) => read_dir
                    .filter_map(|entry| entry.ok().map(|e| e.path()))
                    .filter(|p| p.is_file() && is_config_file(p))
                    .collect(),
                Err(_) => continue,
            };
            entries.sort();
            files.extend(entries);
        } else if path.exists() || explicit {
            files.push(path.clone());
        }
    }

    files
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_repositories_are_left_alone() {
        assert_eq!(
            normalize_repository_path("ssh://user@host/./repo"),
            "ssh://user@host/./repo"
        );
        assert_eq!(normalize_repository_path("user@host:repo"), "user@host:repo");
    }

    #[test]
    fn local_repositories_become_absolute() {
        let normalized = normalize_repository_path("relative/repo");
        assert!(Path::new(&normalized).is_absolute());
        assert!(normalized.ends_with("relative/repo"));

        assert_eq!(normalize_repository_path("/tmp/repo"), "/tmp/repo");
        assert_eq!(normalize_repository_path("file:///tmp/repo"), "/tmp/repo");
    }

    #[test]
    fn directories_expand_to_sorted_config_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.yaml"), "").unwrap();
        fs::write(dir.path().join("a.toml"), "").unwrap();
        fs::write(dir.path().join("notes.txt"), "").unwrap();

        let files = collect_config_filenames(&[dir.path().to_path_buf()], true);
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.toml", "b.yaml"]);
    }

    #[test]
    fn missing_defaults_are_skipped_but_explicit_paths_kept() {
        let missing = PathBuf::from("/nonexistent/borgkeeper.yaml");
        assert!(collect_config_filenames(&[missing.clone()], false).is_empty());
        assert_eq!(collect_config_filenames(&[missing.clone()], true), vec![missing]);
    }
}
