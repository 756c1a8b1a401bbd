//! Network Configuration
//!
//! Plain structs passed explicitly to the host server and the client
//! transport. Defaults match the stock game; environment variables
//! override them.

use std::time::Duration;

use crate::core::point::Point;

/// Default session port.
pub const DEFAULT_PORT: u16 = 25444;

/// Default upper bound on a single frame (8 MB, one full map snapshot).
pub const DEFAULT_MAX_FRAME_BYTES: usize = 8 * 1024 * 1024;

/// Transport settings shared by host and client.
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkConfig {
    /// Host name or address to bind or connect to.
    pub host: String,
    /// TCP port.
    pub port: u16,
    /// Bounded wait for the initial connect.
    pub connect_timeout: Duration,
    /// Largest accepted frame.
    pub max_frame_bytes: usize,
    /// Per-connection outbound queue depth on the host.
    pub outbound_queue: usize,
    /// Maximum concurrent connections the host accepts.
    pub max_connections: usize,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            connect_timeout: Duration::from_secs(5),
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
            outbound_queue: 64,
            max_connections: 16,
        }
    }
}

impl NetworkConfig {
    /// Defaults overridden by `DUNGEON_SYNC_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns.
    ///
    /// Unparseable values fall back to the default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            host: lookup("DUNGEON_SYNC_HOST").unwrap_or(defaults.host),
            port: lookup("DUNGEON_SYNC_PORT")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.port),
            connect_timeout: lookup("DUNGEON_SYNC_CONNECT_TIMEOUT_MS")
                .and_then(|v| v.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.connect_timeout),
            max_frame_bytes: lookup("DUNGEON_SYNC_MAX_FRAME_BYTES")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_frame_bytes),
            ..defaults
        }
    }

    /// `host:port`, for binding.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// WebSocket URL, for connecting.
    pub fn url(&self) -> String {
        format!("ws://{}:{}", self.host, self.port)
    }
}

/// Host-side session settings.
#[derive(Debug, Clone, PartialEq)]
pub struct HostConfig {
    /// First global id handed out.
    pub first_global_id: u32,
    /// Where joining heroes are placed.
    pub initial_hero_position: Point,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            first_global_id: 1,
            initial_hero_position: Point::ZERO,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_config_default() {
        let config = NetworkConfig::default();
        assert_eq!(config.port, 25444);
        assert_eq!(config.connect_timeout, Duration::from_secs(5));
        assert_eq!(config.max_frame_bytes, 8 * 1024 * 1024);
        assert_eq!(config.url(), "ws://127.0.0.1:25444");
    }

    #[test]
    fn test_lookup_overrides() {
        let config = NetworkConfig::from_lookup(|key| match key {
            "DUNGEON_SYNC_HOST" => Some("10.0.0.2".into()),
            "DUNGEON_SYNC_PORT" => Some("4000".into()),
            "DUNGEON_SYNC_CONNECT_TIMEOUT_MS" => Some("250".into()),
            "DUNGEON_SYNC_MAX_FRAME_BYTES" => Some("not-a-number".into()),
            _ => None,
        });
        assert_eq!(config.address(), "10.0.0.2:4000");
        assert_eq!(config.connect_timeout, Duration::from_millis(250));
        assert_eq!(config.max_frame_bytes, DEFAULT_MAX_FRAME_BYTES);
    }
}
