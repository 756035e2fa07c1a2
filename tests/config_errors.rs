// tests/config_errors.rs

use std::fs;

use borgkeeper::engine::{self, RunContext};
use borgkeeper::types::LogLevel;
use borgkeeper_test_utils::{arguments, ConfigBuilder, FakeRunner, FakeTransport};
use tempfile::TempDir;

#[tokio::test]
async fn broken_file_is_reported_and_the_others_still_run() {
    let dir = TempDir::new().unwrap();
    let broken = dir.path().join("broken.yaml");
    fs::write(&broken, "repositories: [\n").unwrap();
    let valid = ConfigBuilder::new(dir.path())
        .with_repository("/tmp/repo")
        .write(dir.path(), "valid.yaml");

    let runner = FakeRunner::new();
    let summary = engine::run(&RunContext {
        runner: &runner,
        transport: &FakeTransport::new(),
        arguments: &arguments(&[broken.clone(), valid], &["prune"]),
    })
    .await;

    assert_eq!(runner.calls_containing("borg prune /tmp/repo").len(), 1);
    assert!(summary.records.iter().any(|record| {
        record.level == LogLevel::Critical
            && record.message == format!("{}: Error parsing configuration file", broken.display())
    }));
    assert_eq!(summary.exit_code(), 1);
}

#[tokio::test]
async fn no_configuration_files_is_critical() {
    let dir = TempDir::new().unwrap();
    let runner = FakeRunner::new();
    let summary = engine::run(&RunContext {
        runner: &runner,
        transport: &FakeTransport::new(),
        arguments: &arguments(&[dir.path().join("missing.yaml")], &["prune"]),
    })
    .await;

    assert!(runner.calls().is_empty());
    assert!(summary.has_critical());
    assert_eq!(summary.exit_code(), 1);
}
