//! Gateway configuration loaded from environment variables.
//!
//! Follows 12-factor style: all settings come from environment variables
//! (or a `.env` file via `dotenvy`).

use std::net::SocketAddr;
use std::time::Duration;

use crate::error::GatewayError;

/// Top-level gateway configuration.
///
/// Loaded once at startup via [`GatewayConfig::from_env`].
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Socket address to bind the HTTP server to (e.g. `0.0.0.0:8088`).
    pub listen_addr: SocketAddr,

    /// Route at which subscriber sockets are upgraded.
    pub ws_path: String,

    /// Settings applied to every subscriber session.
    pub session: SessionSettings,

    /// Capacity of the registry request channel.
    pub registry_queue_capacity: usize,

    /// Seconds between statistics reports (0 = disabled).
    pub stats_interval_secs: u64,
}

/// Per-session settings shared by every subscriber session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSettings {
    /// Period at which the ticker forces a change check.
    pub tick_interval: Duration,

    /// Deadline for receiving the next frame. `None` waits forever.
    pub read_timeout: Option<Duration>,

    /// Deadline for writing one frame. `None` waits forever.
    pub write_timeout: Option<Duration>,

    /// Period between server pings. `None` sends no pings.
    pub ping_interval: Option<Duration>,

    /// Silence after which a pinged client is dropped. Checked on each
    /// ping, so it has no effect while pings are disabled.
    pub client_timeout: Option<Duration>,

    /// Capacity of the inbox and outbound channels of each session.
    pub queue_capacity: usize,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(1000),
            read_timeout: None,
            write_timeout: None,
            ping_interval: Some(Duration::from_secs(5)),
            client_timeout: Some(Duration::from_secs(60)),
            queue_capacity: 16,
        }
    }
}

impl GatewayConfig {
    /// Loads configuration from environment variables.
    ///
    /// Falls back to sensible defaults when a variable is not set.
    /// Calls `dotenvy::dotenv().ok()` to optionally load a `.env` file.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidConfig`] if `LISTEN_ADDR` is set but
    /// cannot be parsed as a [`SocketAddr`], or if `WS_PATH` does not
    /// start with `/`.
    pub fn from_env() -> Result<Self, GatewayError> {
        dotenvy::dotenv().ok();

        let raw_addr =
            std::env::var("LISTEN_ADDR").unwrap_or_else(|_| "0.0.0.0:8088".to_string());
        let listen_addr: SocketAddr = raw_addr
            .parse()
            .map_err(|e| GatewayError::InvalidConfig(format!("LISTEN_ADDR={raw_addr}: {e}")))?;

        let ws_path = std::env::var("WS_PATH").unwrap_or_else(|_| "/ccus".to_string());
        if !ws_path.starts_with('/') {
            return Err(GatewayError::InvalidConfig(format!(
                "WS_PATH must start with '/': {ws_path}"
            )));
        }

        let defaults = SessionSettings::default();
        let session = SessionSettings {
            tick_interval: Duration::from_millis(
                parse_env("TICK_INTERVAL_MS", 1000_u64).max(1),
            ),
            read_timeout: parse_timeout("WS_READ_TIMEOUT_SECS"),
            write_timeout: parse_timeout("WS_WRITE_TIMEOUT_SECS"),
            ping_interval: deadline_from_secs(parse_env("PING_INTERVAL_SECS", 5)),
            client_timeout: deadline_from_secs(parse_env("CLIENT_TIMEOUT_SECS", 60)),
            queue_capacity: parse_env("SESSION_QUEUE_CAPACITY", defaults.queue_capacity).max(1),
        };

        let registry_queue_capacity = parse_env("REGISTRY_QUEUE_CAPACITY", 1024_usize).max(1);
        let stats_interval_secs = parse_env("STATS_INTERVAL_SECS", 10);

        Ok(Self {
            listen_addr,
            ws_path,
            session,
            registry_queue_capacity,
            stats_interval_secs,
        })
    }
}

/// Parses an environment variable as `T`, returning `default` on missing
/// or invalid values.
fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Parses a deadline in seconds. Missing, invalid or `0` means no deadline.
fn parse_timeout(key: &str) -> Option<Duration> {
    deadline_from_secs(parse_env(key, 0))
}

const fn deadline_from_secs(secs: u64) -> Option<Duration> {
    match secs {
        0 => None,
        secs => Some(Duration::from_secs(secs)),
    }
}
