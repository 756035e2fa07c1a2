// tests/monitors.rs

use borgkeeper::engine::{self, RunContext, RunSummary};
use borgkeeper::types::LogLevel;
use borgkeeper_test_utils::{arguments, ConfigBuilder, FakeRunner, FakeTransport};
use tempfile::TempDir;

const PING_URL: &str = "https://hc.example.org/ping/abc";

async fn run_with(runner: &FakeRunner, transport: &FakeTransport, args: &[&str]) -> RunSummary {
    let dir = TempDir::new().unwrap();
    let config = ConfigBuilder::new(dir.path())
        .with_repository("/tmp/repo")
        .with_healthchecks(PING_URL)
        .without_config_files()
        .write(dir.path(), "config.yaml");
    engine::run(&RunContext {
        runner,
        transport,
        arguments: &arguments(&[config], args),
    })
    .await
}

fn with_level(summary: &RunSummary, level: LogLevel) -> Vec<&str> {
    summary
        .records
        .iter()
        .filter(|record| record.level == level)
        .map(|record| record.message.as_str())
        .collect()
}

#[tokio::test]
async fn successful_run_pings_start_then_finish() {
    let transport = FakeTransport::new();
    let summary = run_with(&FakeRunner::new(), &transport, &["create"]).await;

    assert_eq!(
        transport.requests(),
        vec![format!("GET {PING_URL}/start"), format!("GET {PING_URL}")]
    );
    assert_eq!(summary.exit_code(), 0);
}

#[tokio::test]
async fn failed_run_pings_fail() {
    let runner = FakeRunner::new();
    runner.respond("borg create", 2, "Repository does not exist");
    let transport = FakeTransport::new();

    let summary = run_with(&runner, &transport, &["create"]).await;

    assert_eq!(
        transport.requests(),
        vec![format!("GET {PING_URL}/start"), format!("GET {PING_URL}/fail")]
    );
    assert_eq!(summary.exit_code(), 1);
}

#[tokio::test]
async fn finish_ping_failure_is_critical() {
    let transport = FakeTransport::new();
    transport.fail_on("/abc");

    let summary = run_with(&FakeRunner::new(), &transport, &["create"]).await;

    assert!(with_level(&summary, LogLevel::Critical)
        .iter()
        .any(|message| message.ends_with("config.yaml: Error pinging monitor")));
    assert_eq!(summary.exit_code(), 1);
}

#[tokio::test]
async fn start_ping_failure_does_not_stop_the_backup() {
    let runner = FakeRunner::new();
    let transport = FakeTransport::new();
    transport.fail_on("/start");

    let summary = run_with(&runner, &transport, &["create"]).await;

    assert_eq!(runner.calls_containing("borg create").len(), 1);
    assert!(with_level(&summary, LogLevel::Error)
        .iter()
        .any(|message| message.ends_with("config.yaml: Error pinging monitor")));
    assert_eq!(summary.exit_code(), 0);
}

#[tokio::test]
async fn read_only_actions_do_not_ping() {
    let transport = FakeTransport::new();
    let summary = run_with(&FakeRunner::new(), &transport, &["repo-list"]).await;

    assert!(transport.requests().is_empty());
    assert_eq!(summary.exit_code(), 0);
}

#[tokio::test]
async fn ntfy_and_uptime_kuma_are_told_about_a_failure() {
    let dir = TempDir::new().unwrap();
    let config = ConfigBuilder::new(dir.path())
        .with_repository("/tmp/repo")
        .with(|config| {
            config.ntfy = serde_yaml::from_str(
                "topic: backups\nserver: https://ntfy.example.org\naccess_token: tk_abc",
            )
            .unwrap();
            config.uptime_kuma =
                serde_yaml::from_str("push_url: https://kuma.example.org/api/push/abc").unwrap();
        })
        .without_config_files()
        .write(dir.path(), "config.yaml");

    let runner = FakeRunner::new();
    runner.respond("borg create", 2, "Repository does not exist");
    let transport = FakeTransport::new();
    let summary = engine::run(&RunContext {
        runner: &runner,
        transport: &transport,
        arguments: &arguments(&[config], &["create"]),
    })
    .await;

    assert_eq!(
        transport.requests(),
        vec![
            "GET https://kuma.example.org/api/push/abc?status=up&msg=start",
            "POST https://ntfy.example.org/backups",
            "GET https://kuma.example.org/api/push/abc?status=down&msg=fail",
        ]
    );
    let notification = &transport.notifications()[0];
    assert_eq!(
        notification.basic_auth,
        Some((String::new(), "tk_abc".to_string()))
    );
    assert!(notification
        .headers
        .contains(&("X-Title".to_string(), "A borgkeeper FAIL event happened".to_string())));
    assert_eq!(summary.exit_code(), 1);
}
