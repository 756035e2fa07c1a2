// src/hooks/monitor/healthchecks.rs

use std::path::Path;

use tracing::{debug, info};

use crate::errors::Result;
use crate::exec::BoxFuture;
use crate::hooks::monitor::{dry_run_label, monitor_error, MonitorHook, PingTransport, State};

const DEFAULT_PING_HOST: &str = "https://hc-ping.com";

#[derive(Debug, Clone)]
pub struct Healthchecks {
    ping_url: String,
}

impl Healthchecks {
    /// Accepts a full ping URL or a bare check UUID.
    pub fn new(ping_url_or_uuid: &str) -> Self {
        let ping_url = if ping_url_or_uuid.starts_with("http") {
            ping_url_or_uuid.trim_end_matches('/').to_string()
        } else {
            format!("{DEFAULT_PING_HOST}/{ping_url_or_uuid}")
        };
        Self { ping_url }
    }

    pub fn url_for(&self, state: State) -> String {
        match state {
            State::Start => format!("{}/start", self.ping_url),
            State::Finish => self.ping_url.clone(),
            State::Fail => format!("{}/fail", self.ping_url),
        }
    }
}

impl MonitorHook for Healthchecks {
    fn name(&self) -> &'static str {
        "healthchecks"
    }

    fn ping<'a>(
        &'a self,
        transport: &'a dyn PingTransport,
        config_filename: &'a Path,
        state: State,
        dry_run: bool,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let url = self.url_for(state);
            info!(
                "{}: Pinging Healthchecks {state}{}",
                config_filename.display(),
                dry_run_label(dry_run)
            );
            debug!("{}: Using Healthchecks ping URL {url}", config_filename.display());
            if dry_run {
                return Ok(());
            }
            transport
                .get(&url)
                .await
                .map_err(|err| monitor_error("Healthchecks", err))
        })
    }
}
