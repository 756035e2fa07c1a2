// src/config/validate.rs

use globset::Glob;

use crate::config::loader::LoadedConfig;
use crate::config::model::{Configuration, Repository};
use crate::config::paths::normalize_repository_path;
use crate::errors::{BorgkeeperError, Result};
use crate::types::Action;

/// Semantic checks that serde can't express.
pub fn validate_configuration(config: &Configuration) -> Result<()> {
    ensure_has_repositories(config)?;
    validate_check_repositories(config)?;
    validate_databases(config)?;
    Ok(())
}

fn ensure_has_repositories(config: &Configuration) -> Result<()> {
    if config.repositories.is_empty() {
        return Err(BorgkeeperError::ConfigError(
            "configuration must contain at least one repository".to_string(),
        ));
    }
    if let Some(empty) = config.repositories.iter().position(|r| r.path.trim().is_empty()) {
        return Err(BorgkeeperError::ConfigError(format!(
            "repositories[{empty}] has an empty path"
        )));
    }
    Ok(())
}

fn validate_check_repositories(config: &Configuration) -> Result<()> {
    for wanted in &config.check_repositories {
        let known = config
            .repositories
            .iter()
            .any(|repository| repositories_match(repository, wanted));
        if !known {
            return Err(BorgkeeperError::ConfigError(format!(
                "repository {wanted} in check_repositories is not listed in repositories"
            )));
        }
    }
    Ok(())
}

fn validate_databases(config: &Configuration) -> Result<()> {
    let sections = [
        ("postgresql_databases", &config.postgresql_databases),
        ("mysql_databases", &config.mysql_databases),
        ("mariadb_databases", &config.mariadb_databases),
        ("mongodb_databases", &config.mongodb_databases),
        ("sqlite_databases", &config.sqlite_databases),
    ];

    for (section, databases) in sections {
        for database in databases {
            if database.name.is_empty() || database.name.contains('/') {
                return Err(BorgkeeperError::ConfigError(format!(
                    "{section}: invalid database name '{}'",
                    database.name
                )));
            }
        }
    }

    for database in &config.sqlite_databases {
        if database.path.is_none() {
            return Err(BorgkeeperError::ConfigError(format!(
                "sqlite_databases: database '{}' needs a path",
                database.name
            )));
        }
    }
    Ok(())
}

fn glob_match(first: &str, second: &str) -> bool {
    let matches = |pattern: &str, candidate: &str| {
        Glob::new(pattern)
            .map(|glob| glob.compile_matcher().is_match(candidate))
            .unwrap_or(false)
    };
    first == second || matches(first, second) || matches(second, first)
}

/// Whether a configured repository matches a user-supplied path or label.
///
/// Labels are compared as-is, paths after normalization; either side may be
/// a glob.
pub fn repositories_match(repository: &Repository, other: &str) -> bool {
    if let Some(label) = &repository.label {
        if glob_match(label, other) {
            return true;
        }
    }
    glob_match(
        &normalize_repository_path(&repository.path),
        &normalize_repository_path(other),
    )
}

/// Validate a `--repository` restriction against every loaded config.
///
/// `extract`, `mount` and `export-tar` operate on exactly one repository, so
/// the filter (or, without a filter, the configuration set) must resolve to
/// exactly one. Every other action only needs the filter to match somewhere.
pub fn guard_configuration_contains_repository(
    repository: Option<&str>,
    configs: &[LoadedConfig],
    action: Action,
) -> Result<()> {
    let single = matches!(action, Action::Extract | Action::Mount | Action::ExportTar);

    let count = match repository {
        Some(wanted) => configs
            .iter()
            .flat_map(|loaded| loaded.config.repositories.iter())
            .filter(|candidate| repositories_match(candidate, wanted))
            .count(),
        None if single => configs
            .iter()
            .map(|loaded| loaded.config.repositories.len())
            .sum(),
        None => return Ok(()),
    };

    let subject = repository
        .map(|r| format!("Repository \"{r}\""))
        .unwrap_or_else(|| "A repository".to_string());

    if count == 0 {
        return Err(BorgkeeperError::InvalidArguments(format!(
            "{subject} not found in configuration files"
        )));
    }
    if single && count > 1 {
        return Err(BorgkeeperError::InvalidArguments(format!(
            "{action} needs exactly one repository, but {count} match; use --repository to pick one"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn loaded(repositories: &[&str]) -> LoadedConfig {
        LoadedConfig {
            path: PathBuf::from("test.yaml"),
            config: Configuration {
                repositories: repositories.iter().map(|p| Repository::new(*p)).collect(),
                ..Configuration::default()
            },
        }
    }

    #[test]
    fn empty_repository_list_is_rejected() {
        let result = validate_configuration(&Configuration::default());
        match result {
            Err(BorgkeeperError::ConfigError(msg)) => assert!(msg.contains("at least one")),
            other => panic!("expected ConfigError, got {other:?}"),
        }
    }

    #[test]
    fn check_repositories_must_be_known() {
        let mut config = loaded(&["/tmp/a", "/tmp/b"]).config;
        config.check_repositories = vec!["/tmp/b".into()];
        assert!(validate_configuration(&config).is_ok());

        config.check_repositories = vec!["/tmp/c".into()];
        match validate_configuration(&config) {
            Err(BorgkeeperError::ConfigError(msg)) => assert!(msg.contains("/tmp/c")),
            other => panic!("expected ConfigError, got {other:?}"),
        }
    }

    #[test]
    fn matching_uses_labels_paths_and_globs() {
        let repo = Repository {
            path: "/tmp/repo".into(),
            label: Some("local".into()),
        };
        assert!(repositories_match(&repo, "local"));
        assert!(repositories_match(&repo, "/tmp/repo"));
        assert!(repositories_match(&repo, "/tmp/r*"));
        assert!(!repositories_match(&repo, "/tmp/other"));
    }

    #[test]
    fn guard_requires_at_least_one_match() {
        let configs = vec![loaded(&["/tmp/a"]), loaded(&["/tmp/b"])];
        assert!(guard_configuration_contains_repository(Some("/tmp/b"), &configs, Action::List).is_ok());
        assert!(guard_configuration_contains_repository(None, &configs, Action::Create).is_ok());
        assert!(matches!(
            guard_configuration_contains_repository(Some("/tmp/z"), &configs, Action::List),
            Err(BorgkeeperError::InvalidArguments(_))
        ));
    }

    #[test]
    fn guard_requires_exactly_one_for_extract() {
        let configs = vec![loaded(&["/tmp/a"]), loaded(&["/tmp/b"])];
        assert!(guard_configuration_contains_repository(None, &configs, Action::Extract).is_err());
        assert!(guard_configuration_contains_repository(Some("/tmp/a"), &configs, Action::Extract).is_ok());
        assert!(guard_configuration_contains_repository(Some("/tmp/*"), &configs, Action::Mount).is_err());
    }
}
