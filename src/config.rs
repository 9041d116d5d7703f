use std::path::PathBuf;
use std::time::Duration;

use eyre::{Result, WrapErr};
use log::debug;
use serde::Deserialize;

pub const DEFAULT_PORT: u16 = 6667;
pub const DEFAULT_MESSAGE_BUDGET: u32 = 3500;
pub const DEFAULT_NAMES_INTERVAL_SECS: u64 = 120;
pub const DEFAULT_MAX_NICK_RETRIES: u32 = 5;
pub const DEFAULT_FAREWELL: &str = ";-;";
pub const DEFAULT_LOCALE: &str = "en";
pub const DEFAULT_LOOKUP_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_MAX_RESTART_DELAY_SECS: u64 = 60;

/// Optional overrides read from `~/.config/ytserv/config.toml`
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub port: Option<u16>,
    pub message_budget: Option<u32>,
    pub names_interval_secs: Option<u64>,
    pub max_nick_retries: Option<u32>,
    pub farewell: Option<String>,
    pub locale: Option<String>,
    pub lookup_timeout_secs: Option<u64>,
    pub max_restart_delay_secs: Option<u64>,
}

impl Config {
    /// Load config from ~/.config/ytserv/config.toml if it exists
    pub fn load() -> Result<Self> {
        let path = config_path();
        if path.exists() {
            debug!("Loading config from {}", path.display());
            let content = std::fs::read_to_string(&path)?;
            let config: Config =
                toml::from_str(&content).wrap_err_with(|| format!("invalid config file {}", path.display()))?;
            Ok(config)
        } else {
            debug!("No config file found at {}", path.display());
            Ok(Config::default())
        }
    }
}

pub fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from(".config"))
        .join("ytserv")
        .join("config.toml")
}

/// Everything one session needs, resolved from the command line and config.
#[derive(Clone)]
pub struct Settings {
    pub server: String,
    pub port: u16,
    pub channel: String,
    pub nickname: String,
    pub api_key: String,
    pub message_budget: u32,
    pub names_interval: Duration,
    pub max_nick_retries: u32,
    pub farewell: String,
    pub locale: String,
    pub lookup_timeout: Duration,
    pub max_restart_delay: Duration,
}

impl Settings {
    pub fn new(
        server: impl Into<String>,
        channel: impl Into<String>,
        nickname: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            server: server.into(),
            port: DEFAULT_PORT,
            channel: channel.into(),
            nickname: nickname.into(),
            api_key: api_key.into(),
            message_budget: DEFAULT_MESSAGE_BUDGET,
            names_interval: Duration::from_secs(DEFAULT_NAMES_INTERVAL_SECS),
            max_nick_retries: DEFAULT_MAX_NICK_RETRIES,
            farewell: DEFAULT_FAREWELL.to_string(),
            locale: DEFAULT_LOCALE.to_string(),
            lookup_timeout: Duration::from_secs(DEFAULT_LOOKUP_TIMEOUT_SECS),
            max_restart_delay: Duration::from_secs(DEFAULT_MAX_RESTART_DELAY_SECS),
        }
    }

    /// Apply values present in the config file on top of the defaults.
    pub fn with_config(mut self, config: &Config) -> Self {
        if let Some(port) = config.port {
            self.port = port;
        }
        if let Some(budget) = config.message_budget {
            // zero would end the session before it could read anything
            self.message_budget = budget.max(1);
        }
        if let Some(secs) = config.names_interval_secs {
            self.names_interval = Duration::from_secs(secs.max(1));
        }
        if let Some(retries) = config.max_nick_retries {
            self.max_nick_retries = retries;
        }
        if let Some(ref farewell) = config.farewell {
            self.farewell = farewell.clone();
        }
        if let Some(ref locale) = config.locale {
            self.locale = locale.clone();
        }
        if let Some(secs) = config.lookup_timeout_secs {
            self.lookup_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = config.max_restart_delay_secs {
            self.max_restart_delay = Duration::from_secs(secs);
        }
        self
    }
}
