// src/hooks/monitor/pagerduty.rs

use std::path::Path;

use chrono::Local;
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::errors::Result;
use crate::exec::BoxFuture;
use crate::hooks::monitor::{monitor_error, MonitorHook, PingTransport, State};
use crate::system::hostname;

pub const EVENTS_API_URL: &str = "https://events.pagerduty.com/v2/enqueue";

/// Raises a PagerDuty incident when a run fails. Other states are ignored.
#[derive(Debug, Clone)]
pub struct PagerDuty {
    integration_key: String,
}

impl PagerDuty {
    pub fn new(integration_key: &str) -> Self {
        Self {
            integration_key: integration_key.to_string(),
        }
    }

    pub fn event(&self, hostname: &str, timestamp: &str, config_filename: &Path) -> Value {
        json!({
            "routing_key": self.integration_key,
            "event_action": "trigger",
            "payload": {
                "summary": format!("backup failed on {hostname}"),
                "severity": "error",
                "source": hostname,
                "timestamp": timestamp,
                "component": "borgkeeper",
                "group": "backups",
                "class": "backup failure",
                "custom_details": {
                    "hostname": hostname,
                    "configuration filename": config_filename.display().to_string(),
                    "server time": timestamp,
                },
            },
        })
    }
}

impl MonitorHook for PagerDuty {
    fn name(&self) -> &'static str {
        "pagerduty"
    }

    fn ping<'a>(
        &'a self,
        transport: &'a dyn PingTransport,
        config_filename: &'a Path,
        state: State,
        dry_run: bool,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            if state != State::Fail {
                debug!(
                    "{}: Ignoring unsupported monitoring {state} in PagerDuty hook",
                    config_filename.display()
                );
                return Ok(());
            }

            let label = if dry_run {
                " (dry run; not actually sending)"
            } else {
                ""
            };
            info!(
                "{}: Sending failure event to PagerDuty{label}",
                config_filename.display()
            );
            if dry_run {
                return Ok(());
            }

            let event = self.event(&hostname(), &Local::now().to_rfc3339(), config_filename);
            debug!("{}: Using PagerDuty payload: {event}", config_filename.display());
            transport
                .post_json(EVENTS_API_URL, &event)
                .await
                .map_err(|err| monitor_error("PagerDuty", err))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_carries_key_and_host() {
        let event = PagerDuty::new("abc123").event(
            "nas",
            "2024-03-09T14:05:07+01:00",
            Path::new("/etc/borgkeeper/config.yaml"),
        );
        assert_eq!(event["routing_key"], "abc123");
        assert_eq!(event["payload"]["summary"], "backup failed on nas");
        assert_eq!(
            event["payload"]["custom_details"]["configuration filename"],
            "/etc/borgkeeper/config.yaml"
        );
    }
}
