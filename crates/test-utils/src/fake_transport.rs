use std::sync::{Arc, Mutex};

use anyhow::anyhow;
use serde_json::Value;

use borgkeeper::errors::{BorgkeeperError, Result};
use borgkeeper::exec::BoxFuture;
use borgkeeper::hooks::monitor::{Notification, PingTransport};

/// A fake HTTP transport that records `GET url` / `POST url` lines and
/// fails requests whose URL ends with a configured suffix.
#[derive(Clone, Default)]
pub struct FakeTransport {
    requests: Arc<Mutex<Vec<String>>>,
    bodies: Arc<Mutex<Vec<Value>>>,
    notifications: Arc<Mutex<Vec<Notification>>>,
    failing: Arc<Mutex<Vec<String>>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_on(&self, suffix: &str) -> &Self {
        self.failing.lock().unwrap().push(suffix.to_string());
        self
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    pub fn bodies(&self) -> Vec<Value> {
        self.bodies.lock().unwrap().clone()
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.notifications.lock().unwrap().clone()
    }

    fn request(&self, line: String, url: &str) -> Result<()> {
        self.requests.lock().unwrap().push(line);
        if self.failing.lock().unwrap().iter().any(|needle| url.ends_with(needle.as_str())) {
            return Err(BorgkeeperError::Other(anyhow!("connection refused: {url}")));
        }
        Ok(())
    }
}

impl PingTransport for FakeTransport {
    fn get<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move { self.request(format!("GET {url}"), url) })
    }

    fn post_json<'a>(&'a self, url: &'a str, body: &'a Value) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            self.bodies.lock().unwrap().push(body.clone());
            self.request(format!("POST {url}"), url)
        })
    }

    fn post_notification<'a>(
        &'a self,
        notification: &'a Notification,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            self.notifications.lock().unwrap().push(notification.clone());
            let url = notification.url.as_str();
            self.request(format!("POST {url}"), url)
        })
    }
}
