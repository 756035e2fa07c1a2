// src/borg/flags.rs

//! Small helpers for assembling engine flags.

use crate::cli::GlobalArguments;
use crate::config::model::Configuration;

/// `--name value`, or nothing when the value is absent.
pub fn make_flags(name: &str, value: Option<impl ToString>) -> Vec<String> {
    match value {
        Some(value) => vec![format!("--{}", name.replace('_', "-")), value.to_string()],
        None => Vec::new(),
    }
}

/// `--name` when `enabled`.
pub fn make_switch(name: &str, enabled: bool) -> Vec<String> {
    if enabled {
        vec![format!("--{}", name.replace('_', "-"))]
    } else {
        Vec::new()
    }
}

/// Flags mirroring the console verbosity.
pub fn verbosity_flags(verbosity: i8) -> Vec<String> {
    match verbosity {
        1 => vec!["--info".to_string()],
        v if v >= 2 => vec!["--debug".to_string(), "--show-rc".to_string()],
        _ => Vec::new(),
    }
}

/// Flags every engine command shares: remote path, lock wait, umask and
/// verbosity.
pub fn common_flags(config: &Configuration, global: &GlobalArguments) -> Vec<String> {
    let mut flags = Vec::new();
    flags.extend(make_flags("remote_path", config.remote_path.as_deref()));
    flags.extend(make_flags("lock_wait", config.lock_wait));
    flags.extend(make_flags(
        "umask",
        config.umask.map(|mask| format!("{:04o}", mask.0)),
    ));
    flags.extend(verbosity_flags(global.verbosity_level()));
    flags
}

/// Split a configured `extra_borg_options` string the way a shell would.
pub fn extra_options(options: Option<&str>) -> Vec<String> {
    match options {
        Some(options) => shell_words::split(options)
            .unwrap_or_else(|_| options.split_whitespace().map(str::to_string).collect()),
        None => Vec::new(),
    }
}

/// `repository::archive` for archive-scoped commands.
pub fn repository_archive(repository: &str, archive: &str) -> String {
    format!("{repository}::{archive}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::model::Umask;

    #[test]
    fn flags_are_kebab_cased_and_skipped_when_empty() {
        assert_eq!(make_flags("lock_wait", Some(5)), vec!["--lock-wait", "5"]);
        assert!(make_flags("lock_wait", None::<u32>).is_empty());
        assert_eq!(make_switch("one_file_system", true), vec!["--one-file-system"]);
        assert!(make_switch("one_file_system", false).is_empty());
    }

    #[test]
    fn common_flags_follow_config_and_verbosity() {
        let config = Configuration {
            remote_path: Some("borg1".into()),
            umask: Some(Umask(0o077)),
            ..Configuration::default()
        };
        let global = GlobalArguments {
            verbosity: Some(2),
            ..GlobalArguments::default()
        };
        assert_eq!(
            common_flags(&config, &global),
            vec!["--remote-path", "borg1", "--umask", "0077", "--debug", "--show-rc"]
        );
    }

    #[test]
    fn extra_options_respect_quotes() {
        assert_eq!(
            extra_options(Some("--exclude-caches --comment 'nightly run'")),
            vec!["--exclude-caches", "--comment", "nightly run"]
        );
    }
}
