//! TOML-based configuration for mesh nodes.

use std::path::Path;

use serde::Deserialize;

use crate::error::MeshError;

/// Top-level node configuration loaded from a TOML file.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct MeshConfig {
    #[serde(default)]
    pub mesh: MeshSection,
    #[serde(default)]
    pub logging: LoggingSection,
}

impl MeshConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, MeshError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| MeshError::Config(format!("failed to read config file: {e}")))?;
        toml::from_str(&content)
            .map_err(|e| MeshError::Config(format!("failed to parse config: {e}")))
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self, MeshError> {
        toml::from_str(s).map_err(|e| MeshError::Config(format!("failed to parse config: {e}")))
    }
}

/// The `[mesh]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct MeshSection {
    /// Idle time in node-time microseconds after which a connection is
    /// evicted. Re-sync staggering thresholds derive from this value.
    #[serde(default = "default_node_timeout_us")]
    pub node_timeout_us: u64,
    /// Maintenance tick period in milliseconds.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    /// Maximum frames waiting per connection. Enqueues beyond this are
    /// rejected with [`MeshError::SendQueueFull`].
    #[serde(default = "default_send_queue_limit")]
    pub send_queue_limit: usize,
}

impl Default for MeshSection {
    fn default() -> Self {
        Self {
            node_timeout_us: default_node_timeout_us(),
            tick_interval_ms: default_tick_interval_ms(),
            send_queue_limit: default_send_queue_limit(),
        }
    }
}

/// The `[logging]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSection {
    #[serde(default = "default_log_level")]
    pub level: String,
    /// `"plain"` or `"json"`.
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_node_timeout_us() -> u64 {
    3_000_000
}

fn default_tick_interval_ms() -> u64 {
    250
}

fn default_send_queue_limit() -> usize {
    64
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "plain".to_string()
}
