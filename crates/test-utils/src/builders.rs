#![allow(dead_code)]

use std::path::{Path, PathBuf};

use borgkeeper::cli::{parse_from, Arguments};
use borgkeeper::config::loader::render_configuration;
use borgkeeper::config::{Configuration, DatabaseConfig, MonitorConfig, Repository};

/// Builder for `Configuration` to simplify test setup.
///
/// The source directory (where dumps and the bootstrap manifest go) points
/// into the given scratch directory, never at the real home directory.
pub struct ConfigBuilder {
    config: Configuration,
}

impl ConfigBuilder {
    pub fn new(scratch: &Path) -> Self {
        Self {
            config: Configuration {
                source_directories: vec!["/home".to_string()],
                borgmatic_source_directory: scratch.join("source").display().to_string(),
                ..Configuration::default()
            },
        }
    }

    pub fn with_repository(mut self, path: &str) -> Self {
        self.config.repositories.push(Repository::new(path));
        self
    }

    pub fn with_labelled_repository(mut self, path: &str, label: &str) -> Self {
        self.config.repositories.push(Repository {
            path: path.to_string(),
            label: Some(label.to_string()),
        });
        self
    }

    pub fn with_retries(mut self, retries: u32, retry_wait: u64) -> Self {
        self.config.retries = retries;
        self.config.retry_wait = retry_wait;
        self
    }

    pub fn with_postgresql(mut self, database: DatabaseConfig) -> Self {
        self.config.postgresql_databases.push(database);
        self
    }

    pub fn with_mysql(mut self, database: DatabaseConfig) -> Self {
        self.config.mysql_databases.push(database);
        self
    }

    pub fn with_healthchecks(mut self, ping_url: &str) -> Self {
        self.config.healthchecks = Some(MonitorConfig::Url(ping_url.to_string()));
        self
    }

    pub fn without_config_files(mut self) -> Self {
        self.config.store_config_files = false;
        self
    }

    /// Edit the configuration directly for anything without a helper.
    pub fn with(mut self, edit: impl FnOnce(&mut Configuration)) -> Self {
        edit(&mut self.config);
        self
    }

    pub fn build(self) -> Configuration {
        self.config
    }

    /// Render to YAML at `dir/name` and return the path.
    pub fn write(self, dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        let yaml = render_configuration(&self.config).expect("Failed to render config");
        std::fs::write(&path, yaml).expect("Failed to write config file");
        path
    }
}

/// Parse a command line (without the program name), adding `--config` for
/// each path.
pub fn arguments(config_paths: &[PathBuf], args: &[&str]) -> Arguments {
    let mut argv: Vec<String> = Vec::new();
    for path in config_paths {
        argv.push("--config".to_string());
        argv.push(path.display().to_string());
    }
    argv.extend(args.iter().map(|arg| arg.to_string()));
    parse_from(argv).expect("Failed to parse arguments")
}
