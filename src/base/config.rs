//! Load configuration via `config` crate with env-override support.

use std::{net::SocketAddr, ops::Deref, sync::Arc};

use serde::Deserialize;

use super::types::Res;

/// Default public origin for registration links.
fn default_base_server_url() -> String {
    "http://localhost:8181".to_string()
}

/// Default bind address for the registration web server.
fn default_listen_addr() -> String {
    "0.0.0.0:8181".to_string()
}

/// Configuration for the roster-bot application.
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub inner: Arc<ConfigInner>,
}

impl Deref for Config {
    type Target = ConfigInner;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ConfigInner {
    /// Slack app token (`ROSTER_BOT_SLACK_APP_TOKEN`).
    pub slack_app_token: String,
    /// Slack bot token (`ROSTER_BOT_SLACK_BOT_TOKEN`).
    pub slack_bot_token: String,
    /// Public origin that prefixes registration links (`ROSTER_BOT_BASE_SERVER_URL`).
    ///
    /// Must include the scheme, and must not end with a slash.
    #[serde(default = "default_base_server_url")]
    pub base_server_url: String,
    /// Address the registration web server binds to (`ROSTER_BOT_LISTEN_ADDR`).
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
}

impl Config {
    pub fn load(explicit_path: Option<&std::path::Path>) -> Res<Self> {
        let mut cfg = config::Config::builder().add_source(config::Environment::default().prefix("ROSTER_BOT"));

        if let Some(p) = explicit_path {
            cfg = cfg.add_source(config::File::from(p.to_path_buf()));
        } else if std::path::Path::new(".hidden/config.toml").exists() {
            cfg = cfg.add_source(config::File::with_name(".hidden/config.toml"));
        }

        let result = Config {
            inner: Arc::new(cfg.build()?.try_deserialize()?),
        };

        result.validate()?;

        Ok(result)
    }

    /// Checks the values that the rest of the application relies on.
    pub fn validate(&self) -> Res<()> {
        if !self.base_server_url.starts_with("http://") && !self.base_server_url.starts_with("https://") {
            return Err(anyhow::anyhow!("Base server URL must start with `http://` or `https://`."));
        }

        if self.base_server_url.ends_with('/') {
            return Err(anyhow::anyhow!("Base server URL must not end with a slash."));
        }

        self.socket_addr()?;

        Ok(())
    }

    /// The parsed listen address.
    pub fn socket_addr(&self) -> Res<SocketAddr> {
        self.listen_addr.parse().map_err(|e| anyhow::anyhow!("Invalid listen address `{}`: {}", self.listen_addr, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(base_server_url: &str, listen_addr: &str) -> Config {
        Config {
            inner: Arc::new(ConfigInner {
                base_server_url: base_server_url.to_string(),
                listen_addr: listen_addr.to_string(),
                ..Default::default()
            }),
        }
    }

    #[test]
    fn accepts_defaults() {
        assert!(config(&default_base_server_url(), &default_listen_addr()).validate().is_ok());
    }

    #[test]
    fn rejects_bad_urls() {
        assert!(config("localhost:8181", "0.0.0.0:8181").validate().is_err());
        assert!(config("https://events.example.com/", "0.0.0.0:8181").validate().is_err());
    }

    #[test]
    fn rejects_bad_listen_addr() {
        assert!(config("https://events.example.com", "nowhere").validate().is_err());
    }
}
