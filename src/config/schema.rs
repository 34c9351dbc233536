//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from a TOML file.
//! Every field has a default, so an empty file is a valid configuration.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;

/// Root configuration for the interceptor.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct InterceptorConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Upstream inference server.
    pub upstream: UpstreamConfig,

    /// Exchange capture settings.
    pub capture: CaptureConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address, `host:port`. A leading `:` (e.g. ":11435") binds all
    /// interfaces; hostnames such as `localhost:11435` are resolved at bind.
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: ":11435".to_string(),
        }
    }
}

impl ListenerConfig {
    /// Address handed to the listener: `:port` becomes `0.0.0.0:port`,
    /// hostnames are left for the resolver.
    pub fn bind_target(&self) -> String {
        normalize_bind_address(&self.bind_address)
    }
}

/// Expand the port-only `:port` shorthand to all interfaces.
pub fn normalize_bind_address(raw: &str) -> String {
    let raw = raw.trim();
    if raw.starts_with(':') {
        format!("0.0.0.0{}", raw)
    } else {
        raw.to_string()
    }
}

/// `host:port` where host is an IP literal or a hostname.
pub fn is_bind_address(raw: &str) -> bool {
    let normalized = normalize_bind_address(raw);
    if normalized.parse::<SocketAddr>().is_ok() {
        return true;
    }
    match normalized.rsplit_once(':') {
        Some((host, port)) => {
            !host.is_empty()
                && !host.contains([':', '[', ']', '/'])
                && !host.contains(char::is_whitespace)
                && port.parse::<u16>().is_ok()
        }
        None => false,
    }
}

/// Parse `ip:port`, accepting the port-only `:port` shorthand.
pub fn parse_bind_address(raw: &str) -> Result<SocketAddr, std::net::AddrParseError> {
    normalize_bind_address(raw).parse()
}

/// Upstream configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Base URL requests are forwarded to; the inbound path and query are appended.
    pub target: String,

    /// Connection establishment timeout in seconds. Unset keeps the client default.
    pub connect_timeout_secs: Option<u64>,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            target: "http://localhost:11434".to_string(),
            connect_timeout_secs: None,
        }
    }
}

/// Exchange capture configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Directory receiving one JSON file per exchange.
    pub log_dir: PathBuf,

    /// Largest inbound body buffered for forwarding (bytes).
    pub max_request_body_bytes: usize,

    /// Response header carrying the exchange id. Empty disables it.
    pub id_header: String,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            log_dir: PathBuf::from("./logs"),
            max_request_body_bytes: 32 * 1024 * 1024, // 32MB
            id_header: "x-capture-id".to_string(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error). `RUST_LOG` takes precedence.
    pub log_level: String,

    /// Log line format.
    pub log_format: LogFormat,

    /// Enable the Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
