//! sysrelay Configuration
//!
//! TOML-based configuration loading with sensible defaults. Only the bot
//! nickname is required; everything else can be left out.
//!
//! # Parsing
//!
//! Use the `FromStr` trait to parse configuration:
//!
//! ```
//! use sysrelay_config::Config;
//! use std::str::FromStr;
//!
//! let config = Config::from_str("[irc.bot]\nnickname = \"Syslogger\"").unwrap();
//! assert!(config.irc.active_server().is_none());
//! ```
//!
//! # Example Config
//!
//! ```toml
//! [log]
//! level = "info"
//!
//! [irc.server]
//! host = "irc.example.test"
//!
//! [irc.bot]
//! nickname = "Syslogger"
//!
//! [irc]
//! channels = [ { name = "#ops" }, { name = "#net", password = "key" } ]
//!
//! [routes]
//! "514/udp" = ["#ops", "#net"]
//! "55514/udp" = ["#net"]
//! ```

mod error;
mod global;
mod irc;
mod listeners;
mod logging;
mod routes;
mod validation;

use std::fs;
use std::path::Path;
use std::str::FromStr;

pub use error::{ConfigError, Result};
pub use global::GlobalConfig;
pub use irc::{IrcBotConfig, IrcChannelConfig, IrcConfig, IrcServerConfig, ShutdownConfig};
pub use listeners::ListenersConfig;
pub use logging::{LogConfig, LogFormat, LogLevel};
pub use routes::RoutesConfig;

use serde::Deserialize;
use sysrelay_routing::{Destination, Route};

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Global settings (queue size, shutdown timeout)
    pub global: GlobalConfig,

    /// Logging configuration
    pub log: LogConfig,

    /// Syslog listener settings
    pub listeners: ListenersConfig,

    /// IRC connection, bot identity and channels
    pub irc: IrcConfig,

    /// Syslog port → IRC channels
    pub routes: RoutesConfig,
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read, contains invalid TOML, or
    /// fails validation.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::IoError {
            path: path.display().to_string(),
            source: e,
        })?;

        Self::from_str(&contents)
    }

    /// Parse configuration from a TOML string
    ///
    /// Prefer using the `FromStr` trait implementation.
    fn parse(s: &str) -> Result<Self> {
        let config: Config = toml::from_str(s).map_err(ConfigError::ParseError)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        validation::validate_config(self)
    }

    /// All configured routes
    ///
    /// # Errors
    ///
    /// Only fails for configs that were not validated.
    pub fn routes(&self) -> Result<Vec<Route>> {
        self.routes.routes()
    }

    /// All configured channels as destinations
    pub fn destinations(&self) -> Vec<Destination> {
        self.irc.destinations()
    }
}

impl FromStr for Config {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
