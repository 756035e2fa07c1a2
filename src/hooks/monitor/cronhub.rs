// src/hooks/monitor/cronhub.rs

use std::path::Path;

use tracing::{debug, info};

use crate::errors::Result;
use crate::exec::BoxFuture;
use crate::hooks::monitor::{dry_run_label, monitor_error, MonitorHook, PingTransport, State};

#[derive(Debug, Clone)]
pub struct Cronhub {
    ping_url: String,
}

impl Cronhub {
    pub fn new(ping_url: &str) -> Self {
        Self {
            ping_url: ping_url.to_string(),
        }
    }

    /// Cronhub URLs carry the state as a path segment: `/start/<uuid>`.
    pub fn url_for(&self, state: State) -> String {
        let segment = format!("/{state}/");
        self.ping_url
            .replace("/start/", &segment)
            .replace("/ping/", &segment)
    }
}

impl MonitorHook for Cronhub {
    fn name(&self) -> &'static str {
        "cronhub"
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
                "{}: Pinging Cronhub {state}{}",
                config_filename.display(),
                dry_run_label(dry_run)
            );
            debug!("{}: Using Cronhub ping URL {url}", config_filename.display());
            if dry_run {
                return Ok(());
            }
            transport
                .get(&url)
                .await
                .map_err(|err| monitor_error("Cronhub", err))
        })
    }
}
