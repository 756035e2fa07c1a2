// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::config::model::Configuration;
use crate::config::overrides::{apply_overrides, parse_override, Override};
use crate::config::validate::validate_configuration;
use crate::errors::{BorgkeeperError, Result};
use crate::types::{LogLevel, LogRecord};

/// A configuration file together with the path it was loaded from.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub path: PathBuf,
    pub config: Configuration,
}

/// Read a config file into an untyped value tree.
///
/// `.toml` files go through `toml`, everything else is read as YAML.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<serde_yaml::Value> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let is_toml = path.extension().and_then(|e| e.to_str()) == Some("toml");
    let value = if is_toml {
        let table: toml::Table = toml::from_str(&contents)?;
        serde_yaml::to_value(table)?
    } else {
        serde_yaml::from_str(&contents)?
    };

    // An empty YAML document is a null; treat it as an empty mapping.
    if value.is_null() {
        return Ok(serde_yaml::Value::Mapping(Default::default()));
    }
    Ok(value)
}

/// Load, override and validate one configuration file.
///
/// This is the recommended entry point for the rest of the application:
///
/// - Reads YAML or TOML.
/// - Applies `--override` values to the raw tree.
/// - Applies defaults (handled by `serde` + `Default` impls).
/// - Checks repositories and cross references.
pub fn load_and_validate(path: impl AsRef<Path>, overrides: &[Override]) -> Result<Configuration> {
    let path = path.as_ref();
    let mut value = load_from_path(path)?;
    apply_overrides(&mut value, overrides)?;

    let config: Configuration = serde_yaml::from_value(value)?;
    validate_configuration(&config)?;
    Ok(config)
}

/// Load every config file, collecting failures as log records instead of
/// aborting: a broken file is skipped and the others still run.
pub fn load_configurations(
    paths: &[PathBuf],
    raw_overrides: &[String],
) -> Result<(Vec<LoadedConfig>, Vec<LogRecord>)> {
    let overrides = raw_overrides
        .iter()
        .map(|raw| parse_override(raw))
        .collect::<Result<Vec<_>>>()?;

    let mut configs = Vec::new();
    let mut records = Vec::new();

    for path in paths {
        debug!(config = %path.display(), "loading configuration file");
        match load_and_validate(path, &overrides) {
            Ok(config) => configs.push(LoadedConfig {
                path: path.clone(),
                config,
            }),
            Err(err) => {
                records.push(LogRecord::new(
                    LogLevel::Critical,
                    format!("{}: Error parsing configuration file", path.display()),
                ));
                records.push(LogRecord::new(LogLevel::Critical, err.to_string()));
            }
        }
    }

    info!(count = configs.len(), "loaded configuration files");
    Ok((configs, records))
}

/// Render a configuration back to YAML, e.g. for `config show`.
pub fn render_configuration(config: &Configuration) -> Result<String> {
    serde_yaml::to_string(config).map_err(BorgkeeperError::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn yaml_file(contents: &str) -> NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        write!(file, "{contents}").unwrap();
        file
    }

    #[test]
    fn toml_files_load_like_yaml() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        write!(
            file,
            r#"
repositories = ["/tmp/repo"]
retries = 2

[hooks]
before_backup = ["echo hi"]
"#
        )
        .unwrap();

        let cfg = load_and_validate(file.path(), &[]).unwrap();
        assert_eq!(cfg.retries, 2);
        assert_eq!(cfg.hooks.before_backup, vec!["echo hi"]);
    }

    #[test]
    fn overrides_win_over_file_contents() {
        let file = yaml_file("repositories: [/tmp/repo]\nretries: 1\n");
        let ov = parse_override("retries=5").unwrap();
        let cfg = load_and_validate(file.path(), &[ov]).unwrap();
        assert_eq!(cfg.retries, 5);
    }

    #[test]
    fn broken_files_become_critical_records() {
        let good = yaml_file("repositories: [/tmp/repo]\n");
        let bad = yaml_file("repositories: [/tmp/repo]\nbogus_option: 1\n");

        let (configs, records) = load_configurations(
            &[good.path().to_path_buf(), bad.path().to_path_buf()],
            &[],
        )
        .unwrap();

        assert_eq!(configs.len(), 1);
        assert!(!records.is_empty());
        assert!(records.iter().all(|r| r.level == LogLevel::Critical));
    }

    #[test]
    fn rendered_configuration_parses_back_to_the_same_value() {
        let file = yaml_file(
            r#"
source_directories: [/home]
repositories:
    - path: /tmp/repo
      label: local
    - ssh://host/./repo
umask: 0077
keep_daily: 7
borg_exit_codes:
    - code: 1
      treat_as: error
hooks:
    on_error: ["echo failed {error}"]
postgresql_databases:
    - name: users
      format: directory
healthchecks: https://hc-ping.com/abc
"#,
        );
        let cfg = load_and_validate(file.path(), &[]).unwrap();
        let rendered = render_configuration(&cfg).unwrap();
        let reparsed: Configuration = serde_yaml::from_str(&rendered).unwrap();
        assert_eq!(cfg, reparsed);
    }
}
