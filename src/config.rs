//! Client configuration
//!
//! CLI arguments and environment variable handling using clap.
//! The parsed value is handed to the client at construction time.

use std::time::Duration;

use clap::Parser;

/// Default login endpoint
pub const DEFAULT_LOGIN_URL: &str = "https://play.pokemonshowdown.com/~~showdown/action.php";

/// Persistent Pokemon Showdown protocol client
#[derive(Parser, Debug, Clone)]
#[command(name = "showdown_client")]
#[command(about = "Persistent client for the Pokemon Showdown chat protocol")]
pub struct Config {
    /// WebSocket scheme (ws or wss)
    #[arg(long, env = "SCHEME", default_value = "ws")]
    pub scheme: String,

    /// Server host
    #[arg(long, env = "SERVER", default_value = "sim3.psim.us")]
    pub server: String,

    /// Server port
    #[arg(long, env = "PORT", default_value_t = 8000)]
    pub port: u16,

    /// Username to log in as
    #[arg(long, env = "NICK")]
    pub nick: String,

    /// Password for a registered name
    #[arg(long, env = "PASS")]
    pub pass: Option<String>,

    /// Avatar to set once logged in
    #[arg(long, env = "AVATAR")]
    pub avatar: Option<String>,

    /// Rooms to join after login (comma separated)
    #[arg(long, env = "AUTOJOIN", value_delimiter = ',')]
    pub autojoin: Vec<String>,

    /// Seconds to wait before reconnecting (0 disables reconnect)
    #[arg(long, env = "RECONNECT_TIME")]
    pub reconnect_time: Option<u64>,

    /// Fallback room for collaborators; unused by the protocol layer
    #[arg(long, env = "PRIMARY_ROOM")]
    pub primary_room: Option<String>,

    /// Minimum interval between outbound messages in milliseconds
    #[arg(long, env = "THROTTLE_MS", default_value_t = 600)]
    pub throttle_ms: u64,

    /// Login server endpoint
    #[arg(long, env = "LOGIN_URL", default_value = DEFAULT_LOGIN_URL)]
    pub login_url: String,

    /// Timeout for the login HTTP exchange in seconds
    #[arg(long, env = "LOGIN_TIMEOUT_SECS", default_value_t = 30)]
    pub login_timeout_secs: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Config {
    /// Build a config with defaults for everything but the nick
    pub fn new(nick: impl Into<String>) -> Self {
        Self {
            scheme: "ws".to_string(),
            server: "sim3.psim.us".to_string(),
            port: 8000,
            nick: nick.into(),
            pass: None,
            avatar: None,
            autojoin: Vec::new(),
            reconnect_time: None,
            primary_room: None,
            throttle_ms: 600,
            login_url: DEFAULT_LOGIN_URL.to_string(),
            login_timeout_secs: 30,
            log_level: "info".to_string(),
        }
    }

    /// `{scheme}://{server}:{port}/showdown/websocket`
    pub fn websocket_url(&self) -> String {
        format!(
            "{}://{}:{}/showdown/websocket",
            self.scheme, self.server, self.port
        )
    }

    /// Delay before reconnecting, `None` when reconnect is disabled
    pub fn reconnect_delay(&self) -> Option<Duration> {
        match self.reconnect_time {
            Some(secs) if secs > 0 => Some(Duration::from_secs(secs)),
            _ => None,
        }
    }

    pub fn throttle(&self) -> Duration {
        Duration::from_millis(self.throttle_ms)
    }

    pub fn login_timeout(&self) -> Duration {
        Duration::from_secs(self.login_timeout_secs)
    }

    /// Password, treating an empty string as absent
    pub fn password(&self) -> Option<&str> {
        self.pass.as_deref().filter(|p| !p.is_empty())
    }
}
