//! Gateway configuration loaded from environment variables.
//!
//! Follows 12-factor style: all settings come from environment variables
//! (or a `.env` file via `dotenvy`). Every TTL that bounds the liveness of
//! shared-store entries is configured here.

use std::net::SocketAddr;
use std::time::Duration;

/// Top-level gateway configuration.
///
/// Loaded once at startup via [`GatewayConfig::from_env`].
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Socket address to bind the HTTP server to (e.g. `0.0.0.0:3000`).
    pub listen_addr: SocketAddr,

    /// Capacity of the EventBus broadcast channel.
    pub event_bus_capacity: usize,

    /// TTL for session records and the per-identity session index.
    pub session_ttl: Duration,

    /// Window during which a same-credential reconnect is not treated as a
    /// duplicate login.
    pub session_grace: Duration,

    /// TTL for marked-for-termination pointers.
    pub terminate_ttl: Duration,

    /// TTL for quiz round data (answer key, submissions, participants).
    pub quiz_ttl: Duration,

    /// Interval between expired-session sweeps.
    pub session_sweep_interval: Duration,
}

impl GatewayConfig {
    /// Loads configuration from environment variables.
    ///
    /// Falls back to sensible defaults when a variable is not set.
    /// Calls `dotenvy::dotenv().ok()` to optionally load a `.env` file.
    ///
    /// # Errors
    ///
    /// Returns an error if `LISTEN_ADDR` is set but cannot be parsed as
    /// a [`SocketAddr`].
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        dotenvy::dotenv().ok();

        let listen_addr: SocketAddr = std::env::var("LISTEN_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:3000".to_string())
            .parse()?;

        let event_bus_capacity = parse_env("EVENT_BUS_CAPACITY", 10_000);

        let session_ttl = Duration::from_secs(parse_env("SESSION_TTL_SECS", 3_600));
        let session_grace = Duration::from_secs(parse_env("SESSION_GRACE_SECS", 10));
        let terminate_ttl = Duration::from_secs(parse_env("SESSION_TERMINATE_TTL_SECS", 10));
        let quiz_ttl = Duration::from_secs(parse_env("QUIZ_TTL_SECS", 1_800));
        let session_sweep_interval =
            Duration::from_secs(parse_env("SESSION_SWEEP_INTERVAL_SECS", 60));

        Ok(Self {
            listen_addr,
            event_bus_capacity,
            session_ttl,
            session_grace,
            terminate_ttl,
            quiz_ttl,
            session_sweep_interval,
        })
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listen_addr: std::net::SocketAddr::from(([0, 0, 0, 0], 3000)),
            event_bus_capacity: 10_000,
            session_ttl: Duration::from_secs(3_600),
            session_grace: Duration::from_secs(10),
            terminate_ttl: Duration::from_secs(10),
            quiz_ttl: Duration::from_secs(1_800),
            session_sweep_interval: Duration::from_secs(60),
        }
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
