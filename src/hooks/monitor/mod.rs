// src/hooks/monitor/mod.rs

//! Monitoring services pinged at the start, finish and failure of a run.
//!
//! Monitors talk HTTP through a [`PingTransport`] so the pipeline can be
//! tested without a network.

pub mod cronhub;
pub mod cronitor;
pub mod healthchecks;
pub mod ntfy;
pub mod pagerduty;
pub mod uptime_kuma;

use std::fmt;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::model::Configuration;
use crate::errors::{BorgkeeperError, Result};
use crate::exec::BoxFuture;

pub use cronhub::Cronhub;
pub use cronitor::Cronitor;
pub use healthchecks::Healthchecks;
pub use ntfy::Ntfy;
pub use pagerduty::PagerDuty;
pub use uptime_kuma::UptimeKuma;

const TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum State {
    Start,
    Finish,
    Fail,
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            State::Start => "start",
            State::Finish => "finish",
            State::Fail => "fail",
        })
    }
}

/// A bodiless POST whose content travels in headers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Notification {
    pub url: String,
    pub headers: Vec<(String, String)>,
    /// Username and password for HTTP basic auth.
    pub basic_auth: Option<(String, String)>,
}

/// Outgoing HTTP used by monitors.
pub trait PingTransport: Send + Sync {
    fn get<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<()>>;
    fn post_json<'a>(&'a self, url: &'a str, body: &'a Value) -> BoxFuture<'a, Result<()>>;
    fn post_notification<'a>(&'a self, notification: &'a Notification)
    -> BoxFuture<'a, Result<()>>;

    /// GET without verifying the server's TLS certificate.
    fn get_unverified<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<()>> {
        self.get(url)
    }
}

/// [`PingTransport`] over `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    unverified_client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder().timeout(TIMEOUT).build()?;
        let unverified_client = reqwest::Client::builder()
            .timeout(TIMEOUT)
            .danger_accept_invalid_certs(true)
            .build()?;
        Ok(Self {
            client,
            unverified_client,
        })
    }
}

impl PingTransport for HttpTransport {
    fn get<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            self.client.get(url).send().await?.error_for_status()?;
            Ok(())
        })
    }

    fn post_json<'a>(&'a self, url: &'a str, body: &'a Value) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            self.client
                .post(url)
                .json(body)
                .send()
                .await?
                .error_for_status()?;
            Ok(())
        })
    }

    fn post_notification<'a>(
        &'a self,
        notification: &'a Notification,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let mut request = self.client.post(&notification.url);
            for (name, value) in &notification.headers {
                request = request.header(name.as_str(), value.as_str());
            }
            if let Some((username, password)) = &notification.basic_auth {
                request = request.basic_auth(username, Some(password));
            }
            request.send().await?.error_for_status()?;
            Ok(())
        })
    }

    fn get_unverified<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            self.unverified_client
                .get(url)
                .send()
                .await?
                .error_for_status()?;
            Ok(())
        })
    }
}

/// One configured monitoring service.
pub trait MonitorHook: Send + Sync {
    fn name(&self) -> &'static str;

    fn initialize(&self, _config_filename: &Path, _dry_run: bool) -> Result<()> {
        Ok(())
    }

    fn ping<'a>(
        &'a self,
        transport: &'a dyn PingTransport,
        config_filename: &'a Path,
        state: State,
        dry_run: bool,
    ) -> BoxFuture<'a, Result<()>>;

    fn destroy(&self, _config_filename: &Path, _dry_run: bool) -> Result<()> {
        Ok(())
    }
}

pub(crate) fn dry_run_label(dry_run: bool) -> &'static str {
    if dry_run {
        " (dry run; not actually pinging)"
    } else {
        ""
    }
}

/// Wrap a transport error with the monitor's name.
pub(crate) fn monitor_error(monitor: &str, err: BorgkeeperError) -> BorgkeeperError {
    match err {
        BorgkeeperError::SoftFailure { .. } => err,
        other => BorgkeeperError::Monitor {
            monitor: monitor.to_string(),
            message: other.to_string(),
        },
    }
}

/// Monitors configured in `config`, in a fixed order.
pub fn configured_monitors(config: &Configuration) -> Vec<Box<dyn MonitorHook>> {
    let mut monitors: Vec<Box<dyn MonitorHook>> = Vec::new();
    if let Some(url) = config.healthchecks.as_ref().and_then(|c| c.endpoint()) {
        monitors.push(Box::new(Healthchecks::new(url)));
    }
    if let Some(url) = config.cronitor.as_ref().and_then(|c| c.endpoint()) {
        monitors.push(Box::new(Cronitor::new(url)));
    }
    if let Some(url) = config.cronhub.as_ref().and_then(|c| c.endpoint()) {
        monitors.push(Box::new(Cronhub::new(url)));
    }
    if let Some(key) = config.pagerduty.as_ref().and_then(|c| c.endpoint()) {
        monitors.push(Box::new(PagerDuty::new(key)));
    }
    if let Some(ntfy) = &config.ntfy {
        monitors.push(Box::new(Ntfy::new(ntfy)));
    }
    if let Some(uptime_kuma) = &config.uptime_kuma {
        monitors.push(Box::new(UptimeKuma::new(uptime_kuma)));
    }
    monitors
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::model::MonitorConfig;

    #[test]
    fn only_configured_monitors_are_built() {
        let config = Configuration {
            cronitor: Some(MonitorConfig::Url("https://cronitor.link/abc".into())),
            pagerduty: Some(MonitorConfig::Options {
                ping_url: None,
                integration_key: Some("key".into()),
            }),
            ..Configuration::default()
        };
        let names: Vec<&str> = configured_monitors(&config).iter().map(|m| m.name()).collect();
        assert_eq!(names, vec!["cronitor", "pagerduty"]);
    }

    #[test]
    fn push_monitors_come_last() {
        let config: Configuration = serde_yaml::from_str(
            r#"
uptime_kuma:
    push_url: https://kuma.example.org/api/push/abc
ntfy:
    topic: backups
healthchecks: https://hc-ping.com/abc
"#,
        )
        .unwrap();
        let names: Vec<&str> = configured_monitors(&config).iter().map(|m| m.name()).collect();
        assert_eq!(names, vec!["healthchecks", "ntfy", "uptime_kuma"]);
    }
}
