// ABOUTME: Target host configuration for SSH connections.
// ABOUTME: Parses formats like "host", "user@host", "host:port", "user@host:port".

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::env_value::SecretRef;
use crate::error::Result;
use crate::ssh::SessionConfig;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TargetConfig {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_user")]
    pub user: String,
    /// Login password, only ever read from the environment.
    #[serde(default)]
    pub password: Option<SecretRef>,
    #[serde(default)]
    pub key_path: Option<PathBuf>,
    #[serde(default)]
    pub trust_first_connection: bool,
    #[serde(default = "default_keepalive", with = "humantime_serde")]
    pub keepalive: Duration,
    /// Upper bound on a single remote command. Unset means wait as long as it takes.
    #[serde(default, with = "humantime_serde")]
    pub command_timeout: Option<Duration>,
}

fn default_port() -> u16 {
    22
}

fn default_user() -> String {
    "root".to_string()
}

fn default_keepalive() -> Duration {
    Duration::from_secs(30)
}

impl TargetConfig {
    pub fn parse(s: &str) -> std::result::Result<Self, String> {
        let s = s.trim();
        if s.is_empty() {
            return Err("target address cannot be empty".to_string());
        }

        // [user@]host[:port]
        let (user_part, rest) = match s.split_once('@') {
            Some((user, rest)) => (Some(user), rest),
            None => (None, s),
        };

        let (host, port) = match rest.rsplit_once(':') {
            Some((host, port_str)) => {
                let port = port_str
                    .parse::<u16>()
                    .map_err(|_| format!("invalid port: {}", port_str))?;
                (host, port)
            }
            None => (rest, default_port()),
        };

        if host.is_empty() {
            return Err("hostname cannot be empty".to_string());
        }
        if user_part.is_some_and(str::is_empty) {
            return Err("user cannot be empty".to_string());
        }

        Ok(TargetConfig {
            host: host.to_string(),
            port,
            user: user_part.map_or_else(default_user, str::to_string),
            password: None,
            key_path: None,
            trust_first_connection: false,
            keepalive: default_keepalive(),
            command_timeout: None,
        })
    }

    /// Build the session settings, resolving the password from the environment.
    pub fn session_config(&self) -> Result<SessionConfig> {
        let mut config = SessionConfig::new(&self.host, &self.user)
            .port(self.port)
            .trust_on_first_use(self.trust_first_connection)
            .keepalive_interval(self.keepalive);
        if let Some(timeout) = self.command_timeout {
            config = config.command_timeout(timeout);
        }
        if let Some(secret) = &self.password {
            config = config.password(secret.resolve()?);
        }
        if let Some(path) = &self.key_path {
            config = config.key_path(expand_home(path));
        }
        Ok(config)
    }

    /// `host` or `host:port` when the port is not 22.
    pub fn address(&self) -> String {
        if self.port == default_port() {
            self.host.clone()
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

fn expand_home(path: &Path) -> PathBuf {
    match (path.strip_prefix("~"), std::env::var_os("HOME")) {
        (Ok(rest), Some(home)) => PathBuf::from(home).join(rest),
        _ => path.to_path_buf(),
    }
}
