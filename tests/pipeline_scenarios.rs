// tests/pipeline_scenarios.rs

use borgkeeper::engine::{self, RunContext, RunSummary};
use borgkeeper::system::hostname;
use borgkeeper::types::LogLevel;
use borgkeeper_test_utils::{arguments, init_tracing, ConfigBuilder, FakeRunner, FakeTransport};
use tempfile::TempDir;

async fn run(runner: &FakeRunner, transport: &FakeTransport, args: &borgkeeper::cli::Arguments) -> RunSummary {
    engine::run(&RunContext {
        runner,
        transport,
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

fn critical(summary: &RunSummary) -> Vec<&str> {
    summary
        .records
        .iter()
        .filter(|record| record.level == LogLevel::Critical)
        .map(|record| record.message.as_str())
        .collect()
}

#[tokio::test]
async fn default_actions_run_in_canonical_order() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let config = ConfigBuilder::new(dir.path())
        .with_repository("/tmp/repo")
        .without_config_files()
        .with(|c| {
            c.hooks.before_backup = vec!["echo before-backup".into()];
            c.hooks.after_backup = vec!["echo after-backup".into()];
        })
        .write(dir.path(), "config.yaml");

    let runner = FakeRunner::new();
    let summary = run(&runner, &FakeTransport::new(), &arguments(&[config], &[])).await;

    let calls = runner.calls();
    let prune = position(&calls, "borg prune");
    let compact = position(&calls, "borg compact");
    let before = position(&calls, "echo before-backup");
    let create = position(&calls, "borg create");
    let after = position(&calls, "echo after-backup");
    let check = position(&calls, "borg check");
    assert!(prune < compact && compact < before && before < create);
    assert!(create < after && after < check);

    let create_call = &calls[create];
    assert!(
        create_call.contains(&format!("/tmp/repo::{}-", hostname())),
        "unexpected archive name in {create_call}"
    );
    assert!(create_call.ends_with(" /home"));
    assert!(calls[check].ends_with(" /tmp/repo"));
    assert_eq!(summary.exit_code(), 0);
    assert!(summary.json.is_empty());
}

#[tokio::test]
async fn command_line_order_does_not_change_execution_order() {
    let dir = TempDir::new().unwrap();
    let config = ConfigBuilder::new(dir.path())
        .with_repository("/tmp/repo")
        .without_config_files()
        .write(dir.path(), "config.yaml");

    let runner = FakeRunner::new();
    let args = arguments(&[config], &["check", "create", "prune"]);
    run(&runner, &FakeTransport::new(), &args).await;

    let engine_calls: Vec<String> = runner
        .calls_containing("borg ")
        .into_iter()
        .map(|call| call.split(' ').nth(1).unwrap_or_default().to_string())
        .collect();
    assert_eq!(engine_calls, vec!["prune", "create", "check"]);
}

#[tokio::test]
async fn soft_failure_in_before_hook_ends_the_configuration_quietly() {
    let dir = TempDir::new().unwrap();
    let config = ConfigBuilder::new(dir.path())
        .with_repository("/tmp/first")
        .with_repository("/tmp/second")
        .without_config_files()
        .with(|c| {
            c.hooks.before_backup = vec!["exit 75".into()];
            c.hooks.on_error = vec!["notify {repository}".into()];
        })
        .write(dir.path(), "config.yaml");

    let runner = FakeRunner::new();
    runner.respond("exit 75", 75, "");
    let summary = run(&runner, &FakeTransport::new(), &arguments(&[config], &[])).await;

    assert!(runner.calls_containing("borg create").is_empty());
    assert!(runner.calls_containing("borg check").is_empty());
    assert!(runner.calls_containing("notify").is_empty());
    assert!(runner.calls_containing("/tmp/second").is_empty());
    assert!(critical(&summary).is_empty());
    assert_eq!(summary.exit_code(), 0);
}

#[tokio::test]
async fn failed_repository_is_critical_and_contributes_no_json() {
    let dir = TempDir::new().unwrap();
    let config = ConfigBuilder::new(dir.path())
        .with_repository("/tmp/a")
        .with_repository("/tmp/b")
        .without_config_files()
        .write(dir.path(), "config.yaml");

    let runner = FakeRunner::new();
    runner
        .respond(
            "/tmp/a::",
            0,
            r#"{"repository": {"location": "/tmp/a"}, "archive": {"name": "a-1"}}"#,
        )
        .respond("/tmp/b::", 2, "Repository /tmp/b does not exist.");

    let args = arguments(&[config], &["create", "--json"]);
    let summary = run(&runner, &FakeTransport::new(), &args).await;

    assert_eq!(summary.json.len(), 1);
    assert_eq!(summary.json[0]["repository"]["location"], "/tmp/a");
    assert_eq!(summary.json[0]["repository"]["label"], "");

    let critical = critical(&summary);
    assert!(critical.iter().any(|m| m.contains("/tmp/b")));
    assert!(critical.iter().all(|m| !m.contains("/tmp/a:")));
    assert!(summary.records.iter().any(|r| {
        r.level == LogLevel::Info && r.message.contains("/tmp/a: Successfully ran actions")
    }));
    assert_eq!(summary.exit_code(), 1);
}

#[tokio::test]
async fn on_error_replaces_after_hook_when_an_action_fails() {
    let dir = TempDir::new().unwrap();
    let config = ConfigBuilder::new(dir.path())
        .with_repository("/tmp/repo")
        .without_config_files()
        .with(|c| {
            c.hooks.before_backup = vec!["echo before-backup".into()];
            c.hooks.after_backup = vec!["echo after-backup".into()];
            c.hooks.on_error = vec!["notify {repository} {output}".into()];
        })
        .write(dir.path(), "config.yaml");

    let runner = FakeRunner::new();
    runner.respond("borg create", 2, "disk full");
    let summary = run(&runner, &FakeTransport::new(), &arguments(&[config], &["create"])).await;

    assert_eq!(runner.calls_containing("echo before-backup").len(), 1);
    assert!(runner.calls_containing("echo after-backup").is_empty());
    assert_eq!(
        runner.calls_containing("notify"),
        vec!["notify /tmp/repo 'disk full'"]
    );
    assert_eq!(summary.exit_code(), 1);
}

#[tokio::test]
async fn repository_filter_limits_actions() {
    let dir = TempDir::new().unwrap();
    let config = ConfigBuilder::new(dir.path())
        .with_repository("/tmp/a")
        .with_labelled_repository("/tmp/b", "offsite")
        .without_config_files()
        .write(dir.path(), "config.yaml");

    let runner = FakeRunner::new();
    let args = arguments(&[config], &["prune", "--repository", "offsite"]);
    let summary = run(&runner, &FakeTransport::new(), &args).await;

    assert_eq!(runner.calls_containing("borg prune"), vec!["borg prune /tmp/b"]);
    assert_eq!(summary.exit_code(), 0);
}

#[tokio::test]
async fn unknown_repository_filter_aborts_the_run() {
    let dir = TempDir::new().unwrap();
    let config = ConfigBuilder::new(dir.path())
        .with_repository("/tmp/a")
        .write(dir.path(), "config.yaml");

    let runner = FakeRunner::new();
    let args = arguments(&[config], &["list", "--repository", "/tmp/nope"]);
    let summary = run(&runner, &FakeTransport::new(), &args).await;

    assert!(runner.calls().is_empty());
    assert_eq!(
        critical(&summary),
        vec!["Repository \"/tmp/nope\" not found in configuration files"]
    );
    assert_eq!(summary.exit_code(), 1);
}

#[tokio::test]
async fn conflicting_create_flags_stop_before_anything_runs() {
    let dir = TempDir::new().unwrap();
    let config = ConfigBuilder::new(dir.path())
        .with_repository("/tmp/a")
        .write(dir.path(), "config.yaml");

    let runner = FakeRunner::new();
    let args = arguments(&[config], &["create", "--list", "--json"]);
    let summary = run(&runner, &FakeTransport::new(), &args).await;

    assert!(runner.calls().is_empty());
    assert_eq!(
        critical(&summary),
        vec!["With the create action, only one of --list and --json flags can be used."]
    );
}

#[tokio::test]
async fn before_everything_failure_aborts_the_run() {
    let dir = TempDir::new().unwrap();
    let config = ConfigBuilder::new(dir.path())
        .with_repository("/tmp/a")
        .with(|c| c.hooks.before_everything = vec!["mount-backup-disk".into()])
        .write(dir.path(), "config.yaml");

    let runner = FakeRunner::new();
    runner.respond("mount-backup-disk", 1, "no such device");
    let summary = run(&runner, &FakeTransport::new(), &arguments(&[config], &["create"])).await;

    assert!(runner.calls_containing("borg").is_empty());
    assert_eq!(summary.exit_code(), 1);
}
