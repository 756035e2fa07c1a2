// src/borg/environment.rs

use std::collections::BTreeMap;

use crate::config::model::Configuration;

/// Environment for engine child processes.
///
/// Secrets travel only through this per-invocation map; the orchestrator's
/// own environment is never modified.
pub fn make_environment(config: &Configuration) -> BTreeMap<String, String> {
    let options = [
        ("BORG_PASSPHRASE", &config.encryption_passphrase),
        ("BORG_PASSCOMMAND", &config.encryption_passcommand),
        ("BORG_RSH", &config.ssh_command),
        ("BORG_BASE_DIR", &config.borg_base_directory),
    ];

    let mut environment: BTreeMap<String, String> = options
        .into_iter()
        .filter_map(|(name, value)| {
            value
                .as_ref()
                .filter(|v| !v.is_empty())
                .map(|v| (name.to_string(), v.clone()))
        })
        .collect();

    environment.insert("BORG_EXIT_CODES".to_string(), "modern".to_string());
    environment
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configured_secrets_become_child_environment() {
        let config = Configuration {
            encryption_passphrase: Some("hunter2".into()),
            ssh_command: Some("ssh -i key".into()),
            ..Configuration::default()
        };
        let env = make_environment(&config);
        assert_eq!(env.get("BORG_PASSPHRASE").map(String::as_str), Some("hunter2"));
        assert_eq!(env.get("BORG_RSH").map(String::as_str), Some("ssh -i key"));
        assert!(!env.contains_key("BORG_PASSCOMMAND"));
        assert!(std::env::var("BORG_PASSPHRASE").map(|v| v != "hunter2").unwrap_or(true));
    }
}
