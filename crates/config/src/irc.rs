//! IRC configuration
//!
//! Without a `[irc.server]` section (or with an empty host) messages are
//! echoed to stdout instead of being sent to IRC.

use std::time::Duration;

use serde::Deserialize;
use sysrelay_routing::Destination;

/// Default IRC port, also used with TLS unless set
const DEFAULT_PORT: u16 = 6667;

/// Default real name announced to the server
const DEFAULT_REALNAME: &str = "syslog";

/// IRC section
///
/// # Example
///
/// ```toml
/// [irc]
/// commands = ["MODE Syslogger +i"]
/// channels = [
///     { name = "#ops" },
///     { name = "#net", password = "secret" },
/// ]
///
/// [irc.server]
/// host = "irc.example.test"
/// port = 6667
/// rate_limit = 0.5
///
/// [irc.bot]
/// nickname = "Syslogger"
///
/// [irc.shutdown]
/// command = "shutdown!"
/// nicknames = ["admin"]
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct IrcConfig {
    /// Server to connect to; absent means local echo
    pub server: Option<IrcServerConfig>,

    pub bot: IrcBotConfig,

    /// Raw commands sent after registration, before joining channels
    pub commands: Vec<String>,

    /// Channels to join
    pub channels: Vec<IrcChannelConfig>,

    /// Shutdown via private message
    pub shutdown: ShutdownConfig,
}

impl IrcConfig {
    /// The server to connect to, if one is configured with a host
    pub fn active_server(&self) -> Option<&IrcServerConfig> {
        self.server.as_ref().filter(|s| !s.host.is_empty())
    }

    /// Configured channels as routing destinations
    pub fn destinations(&self) -> Vec<Destination> {
        self.channels
            .iter()
            .map(IrcChannelConfig::to_destination)
            .collect()
    }
}

/// IRC server connection
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct IrcServerConfig {
    /// Server host name; empty disables IRC
    pub host: String,

    /// Default: 6667
    pub port: u16,

    /// Connect over TLS, verifying the server against the platform roots
    pub ssl: bool,

    /// Server password (PASS)
    pub password: Option<String>,

    /// Maximum messages per second sent to the server
    pub rate_limit: Option<f64>,

    /// Delay before reconnecting after the connection is lost
    /// Default: 10s
    #[serde(with = "humantime_serde")]
    pub reconnect_interval: Duration,

    /// TCP connect timeout
    /// Default: 10s
    #[serde(with = "humantime_serde")]
    pub connect_timeout: Duration,
}

impl Default for IrcServerConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: DEFAULT_PORT,
            ssl: false,
            password: None,
            rate_limit: None,
            reconnect_interval: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

impl IrcServerConfig {
    /// `host:port`
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl std::fmt::Debug for IrcServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IrcServerConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("ssl", &self.ssl)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("rate_limit", &self.rate_limit)
            .field("reconnect_interval", &self.reconnect_interval)
            .field("connect_timeout", &self.connect_timeout)
            .finish()
    }
}

/// Bot identity
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IrcBotConfig {
    /// Required
    pub nickname: String,

    /// Default: "syslog"
    pub realname: String,
}

impl Default for IrcBotConfig {
    fn default() -> Self {
        Self {
            nickname: String::new(),
            realname: DEFAULT_REALNAME.into(),
        }
    }
}

/// A channel to join, with optional key
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct IrcChannelConfig {
    pub name: String,
    #[serde(default)]
    pub password: Option<String>,
}

impl IrcChannelConfig {
    pub fn to_destination(&self) -> Destination {
        match &self.password {
            Some(password) => Destination::with_secret(&self.name, password),
            None => Destination::new(&self.name),
        }
    }
}

/// Who may shut the relay down by private message, and with what text
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ShutdownConfig {
    /// Exact message text; unset disables shutdown via IRC
    pub command: Option<String>,

    /// Nicknames allowed to send the command; empty allows anyone
    pub nicknames: Vec<String>,
}

impl ShutdownConfig {
    /// Whether `text` from `nickmask` (`nick!user@host`) requests shutdown
    pub fn is_shutdown_request(&self, nickmask: &str, text: &str) -> bool {
        let Some(command) = &self.command else {
            return false;
        };
        if text.trim() != command {
            return false;
        }
        let nick = nickmask.split('!').next().unwrap_or(nickmask);
        self.nicknames.is_empty() || self.nicknames.iter().any(|n| n == nick)
    }
}
