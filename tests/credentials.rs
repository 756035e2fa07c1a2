// tests/credentials.rs

use std::fs;

use borgkeeper::config::DatabaseConfig;
use borgkeeper::engine::{self, RunContext, RunSummary};
use borgkeeper::types::LogLevel;
use borgkeeper_test_utils::{arguments, ConfigBuilder, FakeRunner, FakeTransport};
use tempfile::TempDir;

async fn run(runner: &FakeRunner, args: &borgkeeper::cli::Arguments) -> RunSummary {
    engine::run(&RunContext {
        runner,
        transport: &FakeTransport::new(),
        arguments: args,
    })
    .await
}

#[tokio::test]
async fn loaded_credentials_reach_child_environments() {
    let dir = TempDir::new().unwrap();
    let password_file = dir.path().join("pg-password");
    fs::write(&password_file, "s3cret\n").unwrap();

    let config = ConfigBuilder::new(dir.path())
        .with_repository("/tmp/one")
        .with_repository("/tmp/two")
        .with_postgresql(DatabaseConfig {
            password: Some(format!("{{credential file {}}}", password_file.display())),
            ..DatabaseConfig::named("users")
        })
        .with(|config| {
            config.encryption_passphrase =
                Some("{credential passcommand encryption_passphrase}".into());
            config.encryption_passcommand = Some("pass show borg".into());
        })
        .without_config_files()
        .write(dir.path(), "config.yaml");

    let runner = FakeRunner::new();
    runner.respond("pass show borg", 0, "hunter2\n");
    let summary = run(&runner, &arguments(&[config.clone()], &["create"])).await;

    assert_eq!(summary.exit_code(), 0, "{:#?}", summary.records);
    assert_eq!(runner.calls_containing("pass show borg").len(), 1);

    let borg = runner.environment_of("borg create").unwrap();
    assert_eq!(borg.get("BORG_PASSPHRASE").map(String::as_str), Some("hunter2"));
    let dump = runner.environment_of("pg_dump").unwrap();
    assert_eq!(dump.get("PGPASSWORD").map(String::as_str), Some("s3cret"));

    let on_disk = fs::read_to_string(&config).unwrap();
    assert!(!on_disk.contains("s3cret"));
}

#[tokio::test]
async fn unreadable_credential_skips_the_configuration() {
    let dir = TempDir::new().unwrap();
    let config = ConfigBuilder::new(dir.path())
        .with_repository("/tmp/repo")
        .with(|config| {
            config.encryption_passphrase = Some("{credential file /nonexistent/borg-pass}".into());
        })
        .without_config_files()
        .write(dir.path(), "config.yaml");

    let runner = FakeRunner::new();
    let summary = run(&runner, &arguments(&[config], &["create"])).await;

    let critical: Vec<&str> = summary
        .records
        .iter()
        .filter(|record| record.level == LogLevel::Critical)
        .map(|record| record.message.as_str())
        .collect();
    assert_eq!(critical.len(), 2, "{critical:#?}");
    assert!(critical[0].ends_with("config.yaml: Error loading credentials"));
    assert_eq!(critical[1], "Cannot load credential file: /nonexistent/borg-pass");
    assert!(runner.calls_containing("borg").is_empty());
    assert_eq!(summary.exit_code(), 1);
}
