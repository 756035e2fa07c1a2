// src/hooks/monitor/ntfy.rs

use std::path::Path;

use tracing::{debug, info, warn};

use crate::config::model::NtfyConfig;
use crate::errors::Result;
use crate::exec::BoxFuture;
use crate::hooks::monitor::{
    dry_run_label, monitor_error, MonitorHook, Notification, PingTransport, State,
};

/// Publishes a message to an ntfy topic for each configured state.
#[derive(Debug, Clone)]
pub struct Ntfy {
    config: NtfyConfig,
}

impl Ntfy {
    pub fn new(config: &NtfyConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    pub fn url(&self) -> String {
        format!("{}/{}", self.config.server.trim_end_matches('/'), self.config.topic)
    }

    /// Title, message, priority and tags for `state`. States without their
    /// own section get a generic message.
    pub fn headers_for(&self, state: State) -> Vec<(String, String)> {
        let event = format!("A borgkeeper {} event happened", state.to_string().to_uppercase());
        let fields = match self.config.message_for(state) {
            Some(message) => [
                ("X-Title", message.title.clone()),
                ("X-Message", message.message.clone()),
                ("X-Priority", message.priority.clone()),
                ("X-Tags", message.tags.clone()),
            ],
            None => [
                ("X-Title", Some(event.clone())),
                ("X-Message", Some(event)),
                ("X-Priority", Some("default".to_string())),
                ("X-Tags", Some("borgkeeper".to_string())),
            ],
        };
        fields
            .into_iter()
            .filter_map(|(name, value)| value.map(|value| (name.to_string(), value)))
            .collect()
    }

    /// An access token wins over a username and password; a lone username
    /// or password means no auth at all.
    pub fn basic_auth(&self, config_filename: &Path) -> Option<(String, String)> {
        let log_prefix = config_filename.display();
        let NtfyConfig {
            username,
            password,
            access_token,
            ..
        } = &self.config;

        match (access_token, username, password) {
            (Some(token), username, password) => {
                if username.is_some() || password.is_some() {
                    warn!(
                        "{log_prefix}: ntfy access_token is set but so is username/password, only using access_token"
                    );
                }
                Some((String::new(), token.clone()))
            }
            (None, Some(username), Some(password)) => {
                info!("{log_prefix}: Using basic auth with user {username} for ntfy");
                Some((username.clone(), password.clone()))
            }
            (None, Some(_), None) => {
                warn!("{log_prefix}: Password missing for ntfy authentication, defaulting to no auth");
                None
            }
            (None, None, Some(_)) => {
                warn!("{log_prefix}: Username missing for ntfy authentication, defaulting to no auth");
                None
            }
            (None, None, None) => None,
        }
    }
}

impl MonitorHook for Ntfy {
    fn name(&self) -> &'static str {
        "ntfy"
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

            let notification = Notification {
                url: self.url(),
                headers: self.headers_for(state),
                basic_auth: self.basic_auth(config_filename),
            };
            info!(
                "{}: Pinging ntfy topic {}{}",
                config_filename.display(),
                self.config.topic,
                dry_run_label(dry_run)
            );
            debug!(
                "{}: Using ntfy ping URL {}",
                config_filename.display(),
                notification.url
            );
            if dry_run {
                return Ok(());
            }
            transport
                .post_notification(&notification)
                .await
                .map_err(|err| monitor_error("ntfy", err))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::model::NtfyMessage;

    fn config() -> NtfyConfig {
        serde_yaml::from_str("topic: backups").unwrap()
    }

    #[test]
    fn url_joins_server_and_topic() {
        let mut config = config();
        assert_eq!(Ntfy::new(&config).url(), "https://ntfy.sh/backups");

        config.server = "https://ntfy.example.org/".into();
        assert_eq!(Ntfy::new(&config).url(), "https://ntfy.example.org/backups");
    }

    #[test]
    fn states_without_a_section_get_the_generic_message() {
        let headers = Ntfy::new(&config()).headers_for(State::Fail);
        assert_eq!(
            headers,
            vec![
                ("X-Title".to_string(), "A borgkeeper FAIL event happened".to_string()),
                ("X-Message".to_string(), "A borgkeeper FAIL event happened".to_string()),
                ("X-Priority".to_string(), "default".to_string()),
                ("X-Tags".to_string(), "borgkeeper".to_string()),
            ]
        );
    }

    #[test]
    fn configured_sections_send_only_their_fields() {
        let mut config = config();
        config.finish = Some(NtfyMessage {
            title: Some("Backed up".into()),
            priority: Some("low".into()),
            ..NtfyMessage::default()
        });
        let headers = Ntfy::new(&config).headers_for(State::Finish);
        assert_eq!(
            headers,
            vec![
                ("X-Title".to_string(), "Backed up".to_string()),
                ("X-Priority".to_string(), "low".to_string()),
            ]
        );
    }

    #[test]
    fn access_token_wins_over_username_and_password() {
        let path = Path::new("/etc/borgkeeper/config.yaml");
        let mut config = config();
        config.username = Some("user".into());
        assert_eq!(Ntfy::new(&config).basic_auth(path), None);

        config.password = Some("pass".into());
        assert_eq!(
            Ntfy::new(&config).basic_auth(path),
            Some(("user".to_string(), "pass".to_string()))
        );

        config.access_token = Some("tk_abc".into());
        assert_eq!(
            Ntfy::new(&config).basic_auth(path),
            Some((String::new(), "tk_abc".to_string()))
        );
    }
}
