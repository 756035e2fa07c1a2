// tests/data_sources.rs

use std::fs;

use borgkeeper::config::DatabaseConfig;
use borgkeeper::engine::{self, RunContext, RunSummary};
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

fn position(calls: &[String], prefix: &str) -> usize {
    calls
        .iter()
        .position(|call| call.starts_with(prefix))
        .unwrap_or_else(|| panic!("no call starting with {prefix:?} in {calls:#?}"))
}

#[tokio::test]
async fn dumps_are_removed_before_and_after_a_failed_create() {
    let dir = TempDir::new().unwrap();
    let config = ConfigBuilder::new(dir.path())
        .with_repository("/tmp/repo")
        .with_postgresql(DatabaseConfig::named("users"))
        .without_config_files()
        .write(dir.path(), "config.yaml");

    // Left behind by an interrupted run; a dump with the same name would
    // otherwise be skipped as a duplicate.
    let dump_root = dir.path().join("source/postgresql_databases");
    fs::create_dir_all(dump_root.join("localhost")).unwrap();
    fs::write(dump_root.join("localhost/users"), "stale").unwrap();

    let runner = FakeRunner::new();
    runner.respond("borg create", 2, "Failed to create/acquire the lock");
    let summary = run(&runner, &arguments(&[config], &["create"])).await;

    let calls = runner.calls();
    let dump = position(&calls, "pg_dump");
    let create = position(&calls, "borg create");
    assert!(dump < create);
    assert!(calls[dump].ends_with(&format!("> {}", dump_root.join("localhost/users").display())));
    assert!(!dump_root.exists(), "dumps must be cleaned up after create fails");
    assert_eq!(summary.exit_code(), 1);
}

#[tokio::test]
async fn successful_create_streams_every_configured_database() {
    let dir = TempDir::new().unwrap();
    let config = ConfigBuilder::new(dir.path())
        .with_repository("/tmp/repo")
        .with_postgresql(DatabaseConfig::named("users"))
        .with_mysql(DatabaseConfig::named("shop"))
        .without_config_files()
        .write(dir.path(), "config.yaml");

    let runner = FakeRunner::new();
    let summary = run(&runner, &arguments(&[config], &["create"])).await;

    let calls = runner.calls();
    let create = position(&calls, "borg create");
    assert!(position(&calls, "pg_dump") < create);
    assert!(position(&calls, "mysqldump") < create);
    assert!(calls[create].contains("--read-special"));
    assert!(!dir.path().join("source/postgresql_databases").exists());
    assert!(!dir.path().join("source/mysql_databases").exists());
    assert_eq!(summary.exit_code(), 0);
}
