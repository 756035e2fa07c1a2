// src/hooks/credential.rs

//! `{credential <source> <parameters>}` tags in configuration values.
//!
//! Supported sources:
//!
//! - `{credential file /path/to/secret}` reads a file, `~` expanded
//! - `{credential systemd name}` reads `$CREDENTIALS_DIRECTORY/name`
//! - `{credential passcommand encryption_passphrase}` runs
//!   `encryption_passcommand` once and uses its output
//!
//! Tags are replaced in a copy of the configuration before anything runs,
//! so hooks and engine commands only ever see the loaded values.

use std::collections::HashMap;
use std::ffi::{OsStr, OsString};
use std::fs;
use std::path::PathBuf;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, warn};

use crate::config::model::Configuration;
use crate::config::paths::expand_home;
use crate::errors::{BorgkeeperError, Result};
use crate::exec::{CommandRunner, CommandSpec};

static CREDENTIAL_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{credential( +[^}]*)?\}").expect("credential pattern is valid")
});
static CREDENTIAL_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\w+$").expect("credential name pattern is valid"));

pub fn contains_credential(value: &str) -> bool {
    CREDENTIAL_TAG.is_match(value)
}

fn invalid_syntax(value: &str) -> BorgkeeperError {
    BorgkeeperError::Credential(format!("Cannot load credential with invalid syntax \"{value}\""))
}

/// Loads credential tags for one configuration, each tag at most once.
pub struct CredentialResolver<'a> {
    runner: &'a dyn CommandRunner,
    config: &'a Configuration,
    credentials_directory: Option<OsString>,
    loaded: HashMap<String, String>,
}

impl<'a> CredentialResolver<'a> {
    pub fn new(runner: &'a dyn CommandRunner, config: &'a Configuration) -> Self {
        Self {
            runner,
            config,
            credentials_directory: std::env::var_os("CREDENTIALS_DIRECTORY"),
            loaded: HashMap::new(),
        }
    }

    pub fn with_credentials_directory(mut self, directory: Option<OsString>) -> Self {
        self.credentials_directory = directory;
        self
    }

    /// `value` with every tag replaced by the credential it names.
    pub async fn resolve(&mut self, value: &str) -> Result<String> {
        let mut resolved = String::with_capacity(value.len());
        let mut rest = 0;
        let tags: Vec<_> = CREDENTIAL_TAG.find_iter(value).collect();
        for tag in tags {
            resolved.push_str(&value[rest..tag.start()]);
            resolved.push_str(&self.load(value, tag.as_str()).await?);
            rest = tag.end();
        }
        resolved.push_str(&value[rest..]);
        Ok(resolved)
    }

    async fn resolve_in_place(&mut self, value: &mut Option<String>) -> Result<()> {
        if let Some(current) = value.as_deref().filter(|v| contains_credential(v)) {
            let resolved = self.resolve(current).await?;
            *value = Some(resolved);
        }
        Ok(())
    }

    async fn load(&mut self, value: &str, tag: &str) -> Result<String> {
        if let Some(credential) = self.loaded.get(tag) {
            return Ok(credential.clone());
        }

        let inner = tag.trim_start_matches("{credential").trim_end_matches('}');
        let words = shell_words::split(inner).map_err(|_| invalid_syntax(value))?;
        let Some((source, parameters)) = words.split_first().filter(|(_, p)| !p.is_empty())
        else {
            return Err(invalid_syntax(value));
        };

        let credential = match source.as_str() {
            "file" => load_file(parameters)?,
            "systemd" => load_systemd(self.credentials_directory.as_deref(), parameters)?,
            "passcommand" => self.run_passcommand(parameters).await?,
            other => {
                return Err(BorgkeeperError::Credential(format!(
                    "Cannot load credential from unknown source \"{other}\""
                )));
            }
        };
        self.loaded.insert(tag.to_string(), credential.clone());
        Ok(credential)
    }

    async fn run_passcommand(&self, parameters: &[String]) -> Result<String> {
        if !matches!(parameters, [name] if name == "encryption_passphrase") {
            return Err(BorgkeeperError::Credential(format!(
                "Credential name \"{}\" is not supported for the passcommand credential source",
                parameters.join(" ")
            )));
        }
        let passcommand = self
            .config
            .encryption_passcommand
            .as_deref()
            .filter(|command| !command.is_empty())
            .ok_or_else(|| {
                BorgkeeperError::Credential(
                    "Cannot load the encryption passphrase without an encryption_passcommand"
                        .to_string(),
                )
            })?;
        let argv = shell_words::split(passcommand).map_err(|err| {
            BorgkeeperError::Credential(format!("Cannot parse encryption_passcommand: {err}"))
        })?;

        debug!("Running encryption_passcommand to load the encryption passphrase");
        let output = self.runner.capture(&CommandSpec::new(argv)).await?;
        Ok(output.trim_end_matches(['\r', '\n']).to_string())
    }
}

fn read_credential_file(path: PathBuf, describe: impl FnOnce() -> String) -> Result<String> {
    match fs::read_to_string(&path) {
        Ok(contents) => Ok(contents.trim_end_matches(['\r', '\n']).to_string()),
        Err(err) => {
            warn!("{}: {err}", path.display());
            Err(BorgkeeperError::Credential(describe()))
        }
    }
}

fn load_file(parameters: &[String]) -> Result<String> {
    let [path] = parameters else {
        return Err(BorgkeeperError::Credential(format!(
            "Cannot load invalid credential: \"{}\"",
            parameters.join(" ")
        )));
    };
    read_credential_file(expand_home(path), || {
        format!("Cannot load credential file: {path}")
    })
}

fn load_systemd(directory: Option<&OsStr>, parameters: &[String]) -> Result<String> {
    let [name] = parameters else {
        return Err(BorgkeeperError::Credential(format!(
            "Cannot load invalid credential name \"{}\"",
            parameters.join(" ")
        )));
    };
    let Some(directory) = directory.filter(|d| !d.is_empty()) else {
        return Err(BorgkeeperError::Credential(format!(
            "Cannot load credential \"{name}\" because the systemd CREDENTIALS_DIRECTORY environment variable is not set"
        )));
    };
    if !CREDENTIAL_NAME.is_match(name) {
        return Err(BorgkeeperError::Credential(format!(
            "Cannot load invalid credential name \"{name}\""
        )));
    }
    read_credential_file(PathBuf::from(directory).join(name), || {
        format!("Cannot load credential \"{name}\" from file")
    })
}

/// A copy of `config` with credential tags in secret-bearing fields
/// replaced by their values.
///
/// Covered fields: `encryption_passphrase`, database usernames and
/// passwords (dump and restore), and the ntfy username, password and
/// access token.
pub async fn resolve_credentials(
    resolver: &mut CredentialResolver<'_>,
    config: &Configuration,
) -> Result<Configuration> {
    let mut resolved = config.clone();
    resolver
        .resolve_in_place(&mut resolved.encryption_passphrase)
        .await?;

    let databases = resolved
        .postgresql_databases
        .iter_mut()
        .chain(resolved.mysql_databases.iter_mut())
        .chain(resolved.mariadb_databases.iter_mut())
        .chain(resolved.mongodb_databases.iter_mut())
        .chain(resolved.sqlite_databases.iter_mut());
    for database in databases {
        for field in [
            &mut database.username,
            &mut database.password,
            &mut database.restore_username,
            &mut database.restore_password,
        ] {
            resolver.resolve_in_place(field).await?;
        }
    }

    if let Some(ntfy) = resolved.ntfy.as_mut() {
        for field in [&mut ntfy.username, &mut ntfy.password, &mut ntfy.access_token] {
            resolver.resolve_in_place(field).await?;
        }
    }
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::model::DatabaseConfig;
    use crate::exec::RealRunner;

    fn resolver<'a>(runner: &'a RealRunner, config: &'a Configuration) -> CredentialResolver<'a> {
        CredentialResolver::new(runner, config).with_credentials_directory(None)
    }

    #[tokio::test]
    async fn values_without_tags_are_untouched() {
        let config = Configuration::default();
        let runner = RealRunner::new();
        let mut resolver = resolver(&runner, &config);
        assert_eq!(resolver.resolve("plain {hostname}").await.unwrap(), "plain {hostname}");
    }

    #[tokio::test]
    async fn file_credentials_drop_the_trailing_newline() {
        let dir = tempfile::tempdir().unwrap();
        let secret = dir.path().join("secret");
        fs::write(&secret, "hunter2\n").unwrap();

        let config = Configuration::default();
        let runner = RealRunner::new();
        let mut resolver = resolver(&runner, &config);
        let value = format!("pre-{{credential file {}}}-post", secret.display());
        assert_eq!(resolver.resolve(&value).await.unwrap(), "pre-hunter2-post");

        let quoted = format!("{{credential file \"{}\"}}", secret.display());
        assert_eq!(resolver.resolve(&quoted).await.unwrap(), "hunter2");
    }

    #[tokio::test]
    async fn missing_file_names_the_path() {
        let config = Configuration::default();
        let runner = RealRunner::new();
        let mut resolver = resolver(&runner, &config);
        let err = resolver
            .resolve("{credential file /nonexistent/secret}")
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Cannot load credential file: /nonexistent/secret");
    }

    #[tokio::test]
    async fn malformed_tags_are_rejected() {
        let config = Configuration::default();
        let runner = RealRunner::new();
        let mut resolver = resolver(&runner, &config);
        for value in ["{credential}", "{credential file}", "{credential  }"] {
            let err = resolver.resolve(value).await.unwrap_err();
            assert_eq!(
                err.to_string(),
                format!("Cannot load credential with invalid syntax \"{value}\"")
            );
        }
        assert!(resolver.resolve("{credential vault x}").await.is_err());
    }

    #[tokio::test]
    async fn systemd_credentials_come_from_the_credentials_directory() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("borg_pass"), "s3cret\n").unwrap();

        let config = Configuration::default();
        let runner = RealRunner::new();
        let mut resolver = resolver(&runner, &config)
            .with_credentials_directory(Some(dir.path().as_os_str().to_owned()));
        assert_eq!(
            resolver.resolve("{credential systemd borg_pass}").await.unwrap(),
            "s3cret"
        );
        assert!(resolver.resolve("{credential systemd ../etc}").await.is_err());

        let mut unset = CredentialResolver::new(&runner, &config).with_credentials_directory(None);
        let err = unset.resolve("{credential systemd borg_pass}").await.unwrap_err();
        assert!(err.to_string().contains("CREDENTIALS_DIRECTORY"));
    }

    #[tokio::test]
    async fn passcommand_runs_once_per_configuration() {
        let dir = tempfile::tempdir().unwrap();
        let counter = dir.path().join("runs");
        let config = Configuration {
            encryption_passphrase: Some("{credential passcommand encryption_passphrase}".into()),
            encryption_passcommand: Some(format!(
                "sh -c 'echo run >> {}; echo from-passcommand'",
                counter.display()
            )),
            postgresql_databases: vec![DatabaseConfig {
                password: Some("{credential passcommand encryption_passphrase}".into()),
                ..DatabaseConfig::named("users")
            }],
            ..Configuration::default()
        };
        let runner = RealRunner::new();
        let mut resolver = resolver(&runner, &config);

        let resolved = resolve_credentials(&mut resolver, &config).await.unwrap();
        assert_eq!(resolved.encryption_passphrase.as_deref(), Some("from-passcommand"));
        assert_eq!(
            resolved.postgresql_databases[0].password.as_deref(),
            Some("from-passcommand")
        );
        assert_eq!(fs::read_to_string(&counter).unwrap(), "run\n");
    }

    #[tokio::test]
    async fn passcommand_only_loads_the_encryption_passphrase() {
        let config = Configuration {
            encryption_passcommand: Some("echo nope".into()),
            ..Configuration::default()
        };
        let runner = RealRunner::new();
        let mut resolver = resolver(&runner, &config);
        let err = resolver
            .resolve("{credential passcommand database_password}")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("\"database_password\" is not supported"));

        let config = Configuration::default();
        let mut resolver = CredentialResolver::new(&runner, &config);
        assert!(resolver
            .resolve("{credential passcommand encryption_passphrase}")
            .await
            .is_err());
    }
}
