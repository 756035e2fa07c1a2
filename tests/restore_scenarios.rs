// tests/restore_scenarios.rs

use std::path::Path;

use borgkeeper::config::DatabaseConfig;
use borgkeeper::engine::{self, RunContext, RunSummary};
use borgkeeper::types::LogLevel;
use borgkeeper_test_utils::{arguments, ConfigBuilder, FakeRunner, FakeTransport};
use tempfile::TempDir;

/// `borg list` output for dumps of foo and bar (PostgreSQL) and quux
/// (MySQL) under `scratch/source`.
fn archive_listing(scratch: &Path) -> String {
    let source = scratch.join("source");
    let source = source.to_string_lossy();
    let source = source.trim_start_matches('/');
    [
        format!("{source}/postgresql_databases/localhost/foo"),
        format!("{source}/postgresql_databases/localhost/bar"),
        format!("{source}/mysql_databases/localhost/quux"),
    ]
    .join("\n")
}

fn configured(dir: &TempDir) -> ConfigBuilder {
    ConfigBuilder::new(dir.path())
        .with_repository("/tmp/repo")
        .with_postgresql(DatabaseConfig::named("foo"))
        .with_postgresql(DatabaseConfig::named("bar"))
        .with_mysql(DatabaseConfig::named("quux"))
}

async fn run(runner: &FakeRunner, args: &borgkeeper::cli::Arguments) -> RunSummary {
    engine::run(&RunContext {
        runner,
        transport: &FakeTransport::new(),
        arguments: args,
    })
    .await
}

fn starting_with(runner: &FakeRunner, prefix: &str) -> Vec<String> {
    runner
        .calls()
        .into_iter()
        .filter(|call| call.starts_with(prefix))
        .collect()
}

#[tokio::test]
async fn restore_all_from_latest_archive() {
    let dir = TempDir::new().unwrap();
    let config = configured(&dir).write(dir.path(), "config.yaml");

    let runner = FakeRunner::new();
    runner.respond("/tmp/repo::archive-2 sh:", 0, &archive_listing(dir.path()));
    runner.respond("borg list --short /tmp/repo", 0, "archive-1\narchive-2\n");
    let args = arguments(&[config], &["restore", "--archive", "latest"]);

    let summary = run(&runner, &args).await;

    assert_eq!(summary.exit_code(), 0, "{:#?}", summary.records);
    let extracts = runner.calls_containing("borg extract --stdout /tmp/repo::archive-2");
    assert_eq!(extracts.len(), 3);
    assert_eq!(starting_with(&runner, "pg_restore").len(), 2);
    assert_eq!(starting_with(&runner, "mysql --batch").len(), 1);
    assert!(starting_with(&runner, "pg_restore")[0].contains("--dbname foo"));
}

#[tokio::test]
async fn restoring_database_missing_from_archive_runs_nothing() {
    let dir = TempDir::new().unwrap();
    let config = ConfigBuilder::new(dir.path())
        .with_repository("/tmp/repo")
        .with_postgresql(DatabaseConfig::named("foo"))
        .write(dir.path(), "config.yaml");

    let source = dir.path().join("source");
    let listing = format!(
        "{}/postgresql_databases/localhost/foo",
        source.to_string_lossy().trim_start_matches('/')
    );
    let runner = FakeRunner::new();
    runner.respond("/tmp/repo::archive-2 sh:", 0, &listing);
    let args = arguments(
        &[config],
        &["restore", "--archive", "archive-2", "--database", "foo", "bar"],
    );

    let summary = run(&runner, &args).await;

    assert!(summary.records.iter().any(|record| {
        record.level == LogLevel::Critical
            && record.message == "Cannot restore database bar missing from archive"
    }));
    assert!(runner.calls_containing("borg extract").is_empty());
    assert!(starting_with(&runner, "pg_restore").is_empty());
    assert_eq!(summary.exit_code(), 1);
}

#[tokio::test]
async fn dumps_without_configuration_are_reported_after_the_rest_restore() {
    let dir = TempDir::new().unwrap();
    let config = ConfigBuilder::new(dir.path())
        .with_repository("/tmp/repo")
        .with_postgresql(DatabaseConfig::named("foo"))
        .with_postgresql(DatabaseConfig::named("bar"))
        .write(dir.path(), "config.yaml");

    let runner = FakeRunner::new();
    runner.respond("/tmp/repo::archive-2 sh:", 0, &archive_listing(dir.path()));
    let args = arguments(&[config], &["restore", "--archive", "archive-2"]);

    let summary = run(&runner, &args).await;

    assert_eq!(starting_with(&runner, "pg_restore").len(), 2);
    assert!(summary.records.iter().any(|record| {
        record.level == LogLevel::Critical
            && record.message == "Cannot restore database quux missing from configuration"
    }));
    assert_eq!(summary.exit_code(), 1);
}
