//! Configuration schema definitions.
//!
//! ```toml
//! [connection]
//! url = "ws://127.0.0.1:3001"
//! reconnect_delay_secs = 5
//!
//! [api]
//! url = "http://127.0.0.1:3000"
//! timeout_secs = 30
//!
//! [dedup]
//! capacity = 1000
//!
//! [logging]
//! level = "info"
//! format = "compact"
//! output = "stdout"
//! filters = { xiaoci_transport = "debug" }
//! ```

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use xiaoci_adapter_onebot::ForwardStyle;

/// Root configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct XiaociConfig {
    /// Inbound WebSocket link.
    pub connection: ConnectionConfig,
    /// Outbound HTTP API.
    pub api: ApiConfig,
    /// Duplicate suppression.
    pub dedup: DedupConfig,
    /// Logging.
    pub logging: LoggingConfig,
    /// Forward card presentation.
    pub forward: ForwardStyle,
}

// =============================================================================
// Connection / API / Dedup
// =============================================================================

/// Inbound connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// WebSocket URL of the gateway.
    pub url: String,
    /// Bearer token sent on the handshake.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    /// Fixed delay before reconnecting.
    pub reconnect_delay_secs: u64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            url: "ws://127.0.0.1:3001".to_string(),
            access_token: None,
            reconnect_delay_secs: 5,
        }
    }
}

impl ConnectionConfig {
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect_delay_secs)
    }
}

/// Outbound API settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL; actions are posted to `{url}/{action}`.
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    /// Per-request timeout.
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:3000".to_string(),
            access_token: None,
            timeout_secs: 30,
        }
    }
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Dedup cache settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DedupConfig {
    /// Maximum number of remembered keys.
    pub capacity: usize,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            capacity: xiaoci_framework::DEFAULT_CAPACITY,
        }
    }
}

// =============================================================================
// Logging
// =============================================================================

/// Log level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }

    pub fn to_tracing_level(self) -> tracing::Level {
        match self {
            Self::Trace => tracing::Level::TRACE,
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Log line format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Full,
    Pretty,
    /// Requires the `json-log` feature; falls back to compact otherwise.
    Json,
}

/// Log destination.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    #[default]
    Stdout,
    Stderr,
    File,
}

/// Log file rotation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogRotation {
    #[default]
    Never,
    Hourly,
    Daily,
}

/// Which span lifecycle events are logged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpanEventConfig {
    pub new: bool,
    pub enter: bool,
    pub exit: bool,
    pub close: bool,
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: LogLevel,
    pub format: LogFormat,
    pub output: LogOutput,
    /// Used when `output = "file"`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_path: Option<PathBuf>,
    pub rotation: LogRotation,
    /// Per-module levels, e.g. `xiaoci_transport = "debug"`.
    pub filters: HashMap<String, LogLevel>,
    pub span_events: SpanEventConfig,
    pub thread_ids: bool,
    /// Show file and line of each event.
    pub file_location: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            format: LogFormat::Compact,
            output: LogOutput::Stdout,
            file_path: Some(PathBuf::from("logs/xiaoci.log")),
            rotation: LogRotation::Never,
            filters: HashMap::new(),
            span_events: SpanEventConfig::default(),
            thread_ids: false,
            file_location: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_gateway_defaults() {
        let config = XiaociConfig::default();
        assert_eq!(config.connection.url, "ws://127.0.0.1:3001");
        assert_eq!(config.connection.reconnect_delay(), Duration::from_secs(5));
        assert_eq!(config.api.url, "http://127.0.0.1:3000");
        assert_eq!(config.dedup.capacity, 1000);
        assert_eq!(config.logging.level, LogLevel::Info);
        assert_eq!(config.forward.nickname, "小辞");
    }

    #[test]
    fn test_partial_sections_keep_defaults() {
        let config: XiaociConfig = serde_json::from_value(serde_json::json!({
            "connection": {"access_token": "secret"},
            "logging": {"level": "debug", "filters": {"xiaoci_transport": "trace"}}
        }))
        .unwrap();
        assert_eq!(config.connection.url, "ws://127.0.0.1:3001");
        assert_eq!(config.connection.access_token.as_deref(), Some("secret"));
        assert_eq!(config.logging.level, LogLevel::Debug);
        assert_eq!(
            config.logging.filters.get("xiaoci_transport"),
            Some(&LogLevel::Trace)
        );
    }
}
