//! Server configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::FieldlinkError;

/// Configuration for one game server instance.
///
/// Every field has a default, so a config file only needs to override
/// what it changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the listener binds to.
    pub bind_addr: String,
    /// Zone (channel) identity announced to clients.
    pub zone_id: i32,
    /// World identity announced to clients.
    pub world_id: i32,
    /// Update tick rate in Hz. 0 disables the tick loop.
    pub tick_rate: u32,
    /// Outbound frame queue depth per connection. A full queue marks
    /// the connection unwritable and sends are dropped.
    pub send_queue_depth: usize,
    /// Accept connections in read-only (diagnostic) mode.
    pub read_only: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8484".to_string(),
            zone_id: 1,
            world_id: 0,
            tick_rate: 1,
            send_queue_depth: 128,
            read_only: false,
        }
    }
}

impl ServerConfig {
    /// Parses a config from JSON text.
    pub fn from_json(json: &str) -> Result<Self, FieldlinkError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Loads a config from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, FieldlinkError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_fills_in_defaults() {
        let config =
            ServerConfig::from_json(r#"{"zone_id": 3, "tick_rate": 20}"#).unwrap();
        assert_eq!(config.zone_id, 3);
        assert_eq!(config.tick_rate, 20);
        assert_eq!(config.bind_addr, ServerConfig::default().bind_addr);
    }

    #[test]
    fn test_malformed_json_is_config_error() {
        assert!(matches!(
            ServerConfig::from_json("{nope"),
            Err(FieldlinkError::Config(_))
        ));
    }

    #[test]
    fn test_round_trips_through_json() {
        let config = ServerConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let back = ServerConfig::from_json(&json).unwrap();
        assert_eq!(back.bind_addr, config.bind_addr);
        assert_eq!(back.send_queue_depth, config.send_queue_depth);
    }
}
