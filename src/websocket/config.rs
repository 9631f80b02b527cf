//! Live client configuration.

use std::time::Duration;

use crate::network::DEFAULT_WS_URL;

/// Live client configuration
#[derive(Debug, Clone)]
pub struct LiveConfig {
    /// WebSocket endpoint of the push channel
    pub url: String,
    /// Fixed delay before each reconnect attempt (ms)
    pub reconnect_delay_ms: u64,
    /// Number of reconnect attempts before giving up
    pub max_reconnect_attempts: u32,
    /// Whether to automatically reconnect on disconnect
    pub auto_reconnect: bool,
    /// Timeout for a single connection attempt (seconds)
    pub connect_timeout_secs: u64,
    /// Capacity of the event channel. Default: 1000
    pub event_channel_capacity: usize,
    /// Capacity of the command channel. Default: 100
    pub command_channel_capacity: usize,
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_WS_URL.to_string(),
            reconnect_delay_ms: 2000,
            max_reconnect_attempts: 5,
            auto_reconnect: true,
            connect_timeout_secs: 30,
            event_channel_capacity: 1000,
            command_channel_capacity: 100,
        }
    }
}

impl LiveConfig {
    /// Default configuration pointed at `url`.
    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = LiveConfig::default();
        assert_eq!(config.url, "ws://localhost:5000/ws");
        assert_eq!(config.reconnect_delay_ms, 2000);
        assert_eq!(config.max_reconnect_attempts, 5);
        assert!(config.auto_reconnect);
        assert_eq!(config.connect_timeout_secs, 30);
        assert_eq!(config.event_channel_capacity, 1000);
        assert_eq!(config.command_channel_capacity, 100);
    }

    #[test]
    fn test_with_url() {
        let config = LiveConfig::with_url("ws://127.0.0.1:9000/ws");
        assert_eq!(config.url, "ws://127.0.0.1:9000/ws");
        assert_eq!(config.reconnect_delay(), Duration::from_secs(2));
    }
}
