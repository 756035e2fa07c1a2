// src/hooks/monitor/uptime_kuma.rs

use std::path::Path;

use tracing::{debug, info};

use crate::config::model::UptimeKumaConfig;
use crate::errors::Result;
use crate::exec::BoxFuture;
use crate::hooks::monitor::{monitor_error, MonitorHook, PingTransport, State};

#[derive(Debug, Clone)]
pub struct UptimeKuma {
    config: UptimeKumaConfig,
}

impl UptimeKuma {
    pub fn new(config: &UptimeKumaConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    /// Push URL with the status (`down` only on failure) and the state name.
    pub fn url_for(&self, state: State) -> String {
        let status = if state == State::Fail { "down" } else { "up" };
        format!("{}?status={status}&msg={state}", self.config.push_url)
    }
}

impl MonitorHook for UptimeKuma {
    fn name(&self) -> &'static str {
        "uptime_kuma"
    }

    fn ping<'a>(
        &'a self,
        transport: &'a dyn PingTransport,
        config_filename: &'a Path,
        state: State,
        dry_run: bool,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            if !self.config.states.contains(&state) {
                return Ok(());
            }

            let url = self.url_for(state);
            let dry_run_label = if dry_run { " (dry run; not actually pushing)" } else { "" };
            info!(
                "{}: Pushing Uptime Kuma {state}{dry_run_label}",
                config_filename.display()
            );
            debug!("{}: Full Uptime Kuma state URL {url}", config_filename.display());
            if dry_run {
                return Ok(());
            }

            let pushed = if self.config.verify_tls {
                transport.get(&url).await
            } else {
                transport.get_unverified(&url).await
            };
            pushed.map_err(|err| monitor_error("Uptime Kuma", err))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_pushes_down_and_everything_else_up() {
        let monitor = UptimeKuma::new(&UptimeKumaConfig {
            push_url: "https://kuma.example.org/api/push/abc".into(),
            states: vec![State::Start, State::Finish, State::Fail],
            verify_tls: true,
        });
        assert_eq!(
            monitor.url_for(State::Start),
            "https://kuma.example.org/api/push/abc?status=up&msg=start"
        );
        assert_eq!(
            monitor.url_for(State::Fail),
            "https://kuma.example.org/api/push/abc?status=down&msg=fail"
        );
    }
}
