//! Configuration schema definitions.
//!
//! Every field has a default, so an empty configuration is valid:
//!
//! ```toml
//! host = "localhost"
//! port = 6700
//! data = "./data"
//! # access_token = "..."
//! api_timeout_secs = 30
//! auto_reconnect = true
//!
//! [logging]
//! level = "info"
//! format = "compact"
//! output = "stdout"
//!
//! [logging.filters]
//! cqbot_transport = "debug"
//! ```

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use cqbot_transport::ClientConfig;
use serde::{Deserialize, Serialize};

/// Root configuration structure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CqConfig {
    /// Host of the protocol endpoint.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port of the protocol endpoint.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Directory holding one JSON document per bot.
    #[serde(default = "default_data_dir")]
    pub data: PathBuf,

    /// Sent as a bearer token on connect.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,

    /// How long an API call waits for its response.
    #[serde(default = "default_api_timeout_secs")]
    pub api_timeout_secs: u64,

    /// Reconnect with backoff when the connection drops.
    #[serde(default = "default_true")]
    pub auto_reconnect: bool,

    /// Consecutive reconnect attempts before giving up (unbounded if unset).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<u32>,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for CqConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            data: default_data_dir(),
            access_token: None,
            api_timeout_secs: default_api_timeout_secs(),
            auto_reconnect: true,
            max_retries: None,
            logging: LoggingConfig::default(),
        }
    }
}

impl CqConfig {
    /// Transport settings for the universal endpoint.
    pub fn client_config(&self) -> ClientConfig {
        let mut client = ClientConfig::new(&self.host, self.port)
            .with_api_timeout(Duration::from_secs(self.api_timeout_secs));
        if let Some(token) = &self.access_token {
            client = client.with_token(token.clone());
        }
        if let Some(max) = self.max_retries {
            client = client.with_max_retries(max);
        }
        if !self.auto_reconnect {
            client = client.no_reconnect();
        }
        client
    }
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    6700
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

fn default_api_timeout_secs() -> u64 {
    30
}

fn default_true() -> bool {
    true
}

// =============================================================================
// Logging
// =============================================================================

/// The `[logging]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub level: LogLevel,

    #[serde(default)]
    pub format: LogFormat,

    #[serde(default)]
    pub output: LogOutput,

    /// Log file, required when `output = "file"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<PathBuf>,

    /// Span lifecycle events to log.
    #[serde(default)]
    pub span_events: SpanEvents,

    #[serde(default)]
    pub thread_ids: bool,

    /// Include file name and line number.
    #[serde(default)]
    pub file_location: bool,

    /// Per-target levels, e.g. `cqbot_core = "trace"`.
    #[serde(default)]
    pub filters: BTreeMap<String, LogLevel>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::default(),
            format: LogFormat::default(),
            output: LogOutput::default(),
            file_path: None,
            span_events: SpanEvents::default(),
            thread_ids: false,
            file_location: false,
            filters: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
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
    pub fn as_str(self) -> &'static str {
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

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output format of the fmt layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Full,
    Pretty,
    /// Requires the `json-log` feature.
    #[cfg(feature = "json-log")]
    Json,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    #[default]
    Stdout,
    Stderr,
    File,
}

/// Which span lifecycle events produce a log line.
///
/// `lifecycle` shows each dispatch opening and closing; `full` adds every
/// enter and exit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpanEvents {
    #[default]
    None,
    Lifecycle,
    Full,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config: CqConfig = parse("{}");
        assert_eq!(config, CqConfig::default());
        assert_eq!(config.host, "localhost");
        assert_eq!(config.port, 6700);
        assert_eq!(config.data, PathBuf::from("./data"));
        assert_eq!(config.api_timeout_secs, 30);
        assert!(config.auto_reconnect);
    }

    #[test]
    fn test_logging_section() {
        let config: CqConfig = parse(
            r#"{"logging": {"level": "debug", "format": "pretty", "filters": {"cqbot_core": "trace"}}}"#,
        );
        assert_eq!(config.logging.level, LogLevel::Debug);
        assert_eq!(config.logging.format, LogFormat::Pretty);
        assert_eq!(config.logging.filters["cqbot_core"], LogLevel::Trace);
        assert_eq!(config.logging.output, LogOutput::Stdout);
    }

    #[test]
    fn test_client_config() {
        let config = CqConfig {
            host: "10.0.0.2".into(),
            port: 5700,
            access_token: Some("abc".into()),
            api_timeout_secs: 5,
            auto_reconnect: false,
            max_retries: Some(3),
            ..Default::default()
        };
        let client = config.client_config();
        assert_eq!(client.url, "ws://10.0.0.2:5700/");
        assert_eq!(client.access_token.as_deref(), Some("abc"));
        assert_eq!(client.api_timeout, Duration::from_secs(5));
        assert!(!client.auto_reconnect);
        assert_eq!(client.max_retries, Some(3));
    }

    fn parse(json: &str) -> CqConfig {
        serde_json::from_str(json).unwrap()
    }
}
