use crate::categories::DEFAULT_POLL_INTERVAL;
use crate::BASE_URL;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_STATE_FILE: &str = ".taskboard.json";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?} ({reason})")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Base URL of the tasks API, including the `/api` prefix.
    pub api_url: String,
    /// Address `serve` binds to.
    pub addr: SocketAddr,
    /// Where the theme preference is persisted.
    pub state_file: PathBuf,
    pub poll_interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: BASE_URL.to_string(),
            addr: SocketAddr::from(([127, 0, 0, 1], 8000)),
            state_file: PathBuf::from(DEFAULT_STATE_FILE),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl Config {
    /// Reads `TASKBOARD_*` variables, after loading `.env` if present.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Config::default();

        if let Some(url) = lookup("TASKBOARD_API_URL") {
            config.api_url = url.trim_end_matches('/').to_string();
        }
        if let Some(addr) = lookup("TASKBOARD_ADDR") {
            config.addr = addr.parse().map_err(|e: std::net::AddrParseError| ConfigError::Invalid {
                key: "TASKBOARD_ADDR",
                value: addr.clone(),
                reason: e.to_string(),
            })?;
        }
        if let Some(path) = lookup("TASKBOARD_STATE_FILE") {
            config.state_file = PathBuf::from(path);
        }
        if let Some(secs) = lookup("TASKBOARD_POLL_SECS") {
            let parsed = secs
                .parse::<u64>()
                .ok()
                .filter(|s| *s > 0)
                .ok_or_else(|| ConfigError::Invalid {
                    key: "TASKBOARD_POLL_SECS",
                    value: secs.clone(),
                    reason: "expected a positive number of seconds".to_string(),
                })?;
            config.poll_interval = Duration::from_secs(parsed);
        }

        Ok(config)
    }
}
