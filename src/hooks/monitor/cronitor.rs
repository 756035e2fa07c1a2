// src/hooks/monitor/cronitor.rs

use std::path::Path;

use tracing::{debug, info};

use crate::errors::Result;
use crate::exec::BoxFuture;
use crate::hooks::monitor::{dry_run_label, monitor_error, MonitorHook, PingTransport, State};

#[derive(Debug, Clone)]
pub struct Cronitor {
    ping_url: String,
}

impl Cronitor {
    pub fn new(ping_url: &str) -> Self {
        Self {
            ping_url: ping_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn url_for(&self, state: State) -> String {
        let suffix = match state {
            State::Start => "run",
            State::Finish => "complete",
            State::Fail => "fail",
        };
        format!("{}/{suffix}", self.ping_url)
    }
}

impl MonitorHook for Cronitor {
    fn name(&self) -> &'static str {
        "cronitor"
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
                "{}: Pinging Cronitor {state}{}",
                config_filename.display(),
                dry_run_label(dry_run)
            );
            debug!("{}: Using Cronitor ping URL {url}", config_filename.display());
            if dry_run {
                return Ok(());
            }
            transport
                .get(&url)
                .await
                .map_err(|err| monitor_error("Cronitor", err))
        })
    }
}
