//! # Configuration Management
//!
//! Centralized configuration for sessions, servers and outbound connections.
//!
//! ## Configuration Sources
//! - TOML files via `from_file()`
//! - Direct instantiation with defaults
//! - Environment overrides via `from_env()` (`SMPP_SESSION_*` variables)
//!
//! ## Defaults
//! - Plaintext port 2775, TLS port 3550
//! - PDUs larger than 64 KiB are rejected as a decode error

use crate::error::{ProtocolError, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::time::Duration;
use tracing::Level;

/// Default port for plaintext sessions
pub const DEFAULT_PORT: u16 = 2775;

/// Default port for TLS sessions
pub const DEFAULT_TLS_PORT: u16 = 3550;

/// Max allowed PDU size including the 16 byte header
pub const MAX_PDU_SIZE: usize = 64 * 1024;

/// Size of the chunk read from the transport per readiness notification
pub const READ_BUFFER_SIZE: usize = 8 * 1024;

/// Returns the default port for the given transport security.
pub const fn default_port(tls: bool) -> u16 {
    if tls {
        DEFAULT_TLS_PORT
    } else {
        DEFAULT_PORT
    }
}

/// Top-level configuration structure
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct SmppConfig {
    /// Server-specific configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Client-specific configuration
    #[serde(default)]
    pub client: ClientConfig,

    /// Per-session engine configuration
    #[serde(default)]
    pub session: SessionConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl SmppConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = File::open(path)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to open config file: {e}")))?;

        let mut contents = String::new();
        file.read_to_string(&mut contents)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to read config file: {e}")))?;

        Self::from_toml(&contents)
    }

    /// Load configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str::<Self>(content)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to parse TOML: {e}")))
    }

    /// Load configuration from environment variables on top of the defaults
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(host) = std::env::var("SMPP_SESSION_SERVER_HOST") {
            config.server.host = host;
        }

        if let Ok(port) = std::env::var("SMPP_SESSION_SERVER_PORT") {
            let port = port.parse::<u16>().map_err(|e| {
                ProtocolError::ConfigError(format!("Invalid SMPP_SESSION_SERVER_PORT: {e}"))
            })?;
            config.server.port = Some(port);
        }

        if let Ok(cert) = std::env::var("SMPP_SESSION_TLS_CERT") {
            config.server.tls_cert_path = Some(cert);
        }

        if let Ok(key) = std::env::var("SMPP_SESSION_TLS_KEY") {
            config.server.tls_key_path = Some(key);
        }

        if let Ok(url) = std::env::var("SMPP_SESSION_CLIENT_URL") {
            config.client.url = url;
        }

        if let Ok(timeout) = std::env::var("SMPP_SESSION_CONNECT_TIMEOUT_MS") {
            if let Ok(val) = timeout.parse::<u64>() {
                config.client.connect_timeout = Duration::from_millis(val);
            }
        }

        if let Ok(size) = std::env::var("SMPP_SESSION_MAX_PDU_SIZE") {
            if let Ok(val) = size.parse::<usize>() {
                config.session.max_pdu_size = val;
            }
        }

        Ok(config)
    }

    /// Apply overrides to the default configuration
    pub fn default_with_overrides<F>(mutator: F) -> Self
    where
        F: FnOnce(&mut Self),
    {
        let mut config = Self::default();
        mutator(&mut config);
        config
    }

    /// Generate example configuration file content
    pub fn example_config() -> String {
        toml::to_string_pretty(&Self::default())
            .unwrap_or_else(|_| String::from("# Failed to generate example config"))
    }

    /// Save configuration to a file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to serialize config: {e}")))?;

        std::fs::write(path, content)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to write config file: {e}")))?;

        Ok(())
    }

    /// Validate the configuration for common issues and misconfigurations
    ///
    /// Returns a list of validation errors. Empty list means configuration is valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        errors.extend(self.server.validate());
        errors.extend(self.client.validate());
        errors.extend(self.session.validate());
        errors.extend(self.logging.validate());
        errors
    }

    /// Validate and return Result - convenience method
    pub fn validate_strict(&self) -> Result<()> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ProtocolError::ConfigError(format!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            )))
        }
    }
}

/// Server-specific configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Interface to bind (e.g., "0.0.0.0")
    pub host: String,

    /// Explicit port; `None` picks 3550 with TLS and 2775 without
    #[serde(default)]
    pub port: Option<u16>,

    /// PEM certificate chain; TLS is enabled when both this and the key are set
    #[serde(default)]
    pub tls_cert_path: Option<String>,

    /// PEM PKCS#8 private key
    #[serde(default)]
    pub tls_key_path: Option<String>,

    /// Maximum number of live sessions
    pub max_connections: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: String::from("0.0.0.0"),
            port: None,
            tls_cert_path: None,
            tls_key_path: None,
            max_connections: 1000,
        }
    }
}

impl ServerConfig {
    /// Whether TLS credentials are configured
    pub fn tls_enabled(&self) -> bool {
        self.tls_cert_path.is_some() && self.tls_key_path.is_some()
    }

    /// Validate server configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.host.is_empty() {
            errors.push("Server host cannot be empty".to_string());
        } else if self.host.parse::<std::net::IpAddr>().is_err() {
            errors.push(format!(
                "Invalid server host: '{}' (expected an IP address such as '0.0.0.0')",
                self.host
            ));
        }

        if self.port == Some(0) {
            errors.push("Server port 0 is only valid for tests; leave it unset instead".to_string());
        }

        if self.tls_cert_path.is_some() != self.tls_key_path.is_some() {
            errors.push("TLS requires both tls_cert_path and tls_key_path".to_string());
        }

        if self.max_connections == 0 {
            errors.push("Max connections must be greater than 0".to_string());
        } else if self.max_connections > 100_000 {
            errors.push(format!(
                "Max connections very high: {} (ensure system resources can support this)",
                self.max_connections
            ));
        }

        errors
    }
}

/// Client-specific configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClientConfig {
    /// Connection target, `smpp://host:port` or `ssmpp://host:port`
    pub url: String,

    /// Timeout for connection attempts
    #[serde(with = "duration_serde")]
    pub connect_timeout: Duration,

    /// Skip server certificate verification (development only)
    #[serde(default)]
    pub tls_insecure: bool,

    /// Custom CA bundle used instead of the native roots
    #[serde(default)]
    pub tls_ca_path: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: String::from("smpp://127.0.0.1:2775"),
            connect_timeout: Duration::from_secs(10),
            tls_insecure: false,
            tls_ca_path: None,
        }
    }
}

impl ClientConfig {
    /// Validate client configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.url.is_empty() {
            errors.push("Client url cannot be empty".to_string());
        } else if let Err(e) = self.url.parse::<crate::service::connector::ConnectTarget>() {
            errors.push(format!("Invalid client url '{}': {e}", self.url));
        }

        if self.connect_timeout.as_millis() < 100 {
            errors.push("Connection timeout too short (minimum: 100ms)".to_string());
        } else if self.connect_timeout.as_secs() > 300 {
            errors.push("Connection timeout too long (maximum: 300s)".to_string());
        }

        errors
    }
}

/// Per-session engine configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SessionConfig {
    /// Largest PDU accepted by the codec, header included
    pub max_pdu_size: usize,

    /// Bytes requested from the transport per read
    pub read_buffer_size: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_pdu_size: MAX_PDU_SIZE,
            read_buffer_size: READ_BUFFER_SIZE,
        }
    }
}

impl SessionConfig {
    /// Validate session configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.max_pdu_size < crate::core::pdu::HEADER_LEN {
            errors.push(format!(
                "Max PDU size too small: {} (minimum: {} bytes)",
                self.max_pdu_size,
                crate::core::pdu::HEADER_LEN
            ));
        } else if self.max_pdu_size > u32::MAX as usize {
            errors.push("Max PDU size cannot exceed u32::MAX".to_string());
        }

        if self.read_buffer_size == 0 {
            errors.push("Read buffer size must be greater than 0".to_string());
        } else if self.read_buffer_size > 16 * 1024 * 1024 {
            errors.push(format!(
                "Read buffer size too large: {} bytes (maximum: 16 MB)",
                self.read_buffer_size
            ));
        }

        errors
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Application name for logs
    pub app_name: String,

    /// Log level
    #[serde(with = "log_level_serde")]
    pub log_level: Level,

    /// Whether to log to console
    pub log_to_console: bool,

    /// Whether to use JSON formatting for logs
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            app_name: String::from("smpp-session"),
            log_level: Level::INFO,
            log_to_console: true,
            json_format: false,
        }
    }
}

impl LoggingConfig {
    /// Validate logging configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.app_name.is_empty() {
            errors.push("Application name cannot be empty".to_string());
        } else if self.app_name.len() > 64 {
            errors.push(format!(
                "Application name too long: {} characters (maximum: 64)",
                self.app_name.len()
            ));
        }

        errors
    }
}

/// Helper module for Duration serialization/deserialization
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let millis = duration.as_millis() as u64;
        millis.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

/// Helper module for tracing::Level serialization/deserialization
mod log_level_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::str::FromStr;
    use tracing::Level;

    pub fn serialize<S>(level: &Level, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let level_str = match *level {
            Level::TRACE => "trace",
            Level::DEBUG => "debug",
            Level::INFO => "info",
            Level::WARN => "warn",
            Level::ERROR => "error",
        };
        level_str.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Level, D::Error>
    where
        D: Deserializer<'de>,
    {
        let level_str = String::deserialize(deserializer)?;
        Level::from_str(&level_str)
            .map_err(|_| serde::de::Error::custom(format!("Invalid log level: {level_str}")))
    }
}
