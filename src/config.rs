//! # Configuration Management
//!
//! Settings for the device connection, the identity presented to the key and
//! process logging.
//!
//! ## Configuration Sources
//! - TOML files via `from_file()`
//! - Direct instantiation with defaults
//! - `MACER_*` environment overrides
//!
//! Command-line flags in the binary take precedence over all of these.

use crate::error::{ProtocolError, Result};
use crate::protocol::engine::{DerivationMode, HostInfo, APP_NAME};
use crate::utils::timeout;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default hidraw node probed when no device is configured
pub const DEFAULT_DEVICE_PATH: &str = "/dev/hidraw0";

/// Log levels accepted by `LoggingConfig::level`
const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Top-level configuration
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct MacerConfig {
    /// Device connection settings
    #[serde(default)]
    pub device: DeviceConfig,

    /// Identity presented to the key
    #[serde(default)]
    pub identity: IdentityConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl MacerConfig {
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

    /// Defaults overlaid with `MACER_*` environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Overlay values produced by `lookup` onto this configuration.
    ///
    /// Unparseable numbers and flags are reported rather than ignored.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup("MACER_DEVICE") {
            self.device.path = PathBuf::from(path);
        }

        if let Some(value) = lookup("MACER_REPORT_ID") {
            self.device.report_id = parse_env("MACER_REPORT_ID", &value)?;
        }

        if let Some(value) = lookup("MACER_WRITE_TIMEOUT_MS") {
            self.device.write_timeout =
                Duration::from_millis(parse_env("MACER_WRITE_TIMEOUT_MS", &value)?);
        }

        if let Some(value) = lookup("MACER_READ_TIMEOUT_MS") {
            self.device.read_timeout =
                Duration::from_millis(parse_env("MACER_READ_TIMEOUT_MS", &value)?);
        }

        if let Some(value) = lookup("MACER_LEGACY") {
            self.device.legacy = parse_env("MACER_LEGACY", &value)?;
        }

        if let Some(user) = lookup("MACER_USER") {
            self.identity.user = user;
        }

        if let Some(host) = lookup("MACER_HOST") {
            self.identity.host = host;
        }

        if let Some(message) = lookup("MACER_MESSAGE") {
            self.identity.message = message;
        }

        if let Some(level) = lookup("MACER_LOG_LEVEL") {
            self.logging.level = level;
        }

        if let Some(value) = lookup("MACER_LOG_JSON") {
            self.logging.json = parse_env("MACER_LOG_JSON", &value)?;
        }

        Ok(())
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

    /// Validate the configuration
    ///
    /// Returns a list of validation errors. Empty list means configuration is valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        errors.extend(self.device.validate());
        errors.extend(self.identity.validate());
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

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| ProtocolError::ConfigError(format!("Invalid value for {key}: '{value}'")))
}

/// Device connection settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// hidraw node of the security key
    pub path: PathBuf,

    /// Prefix each written report with a zero report-id byte
    pub report_id: bool,

    /// Timeout for each outgoing report
    #[serde(with = "duration_serde", rename = "write_timeout_ms")]
    pub write_timeout: Duration,

    /// Timeout for each incoming report, zero waits forever
    #[serde(with = "duration_serde", rename = "read_timeout_ms")]
    pub read_timeout: Duration,

    /// Use signed-identity derivation instead of ECDH
    pub legacy: bool,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_DEVICE_PATH),
            report_id: true,
            write_timeout: timeout::DEFAULT_WRITE_TIMEOUT,
            read_timeout: Duration::ZERO,
            legacy: false,
        }
    }
}

impl DeviceConfig {
    /// Validate device configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.path.as_os_str().is_empty() {
            errors.push("Device path cannot be empty".to_string());
        }

        if self.write_timeout.as_millis() < 10 {
            errors.push("Write timeout too short (minimum: 10ms)".to_string());
        } else if self.write_timeout.as_secs() > 60 {
            errors.push("Write timeout too long (maximum: 60s)".to_string());
        }

        // Reads wait on the user pressing a button, so only tiny values are suspect.
        if !self.read_timeout.is_zero() && self.read_timeout.as_secs() < 5 {
            errors.push(
                "Read timeout too short (minimum: 5s, or 0 to wait forever)".to_string(),
            );
        }

        errors
    }

    /// Read timeout as the transport expects it
    pub fn read_timeout(&self) -> Option<Duration> {
        (!self.read_timeout.is_zero()).then_some(self.read_timeout)
    }

    pub fn mode(&self) -> DerivationMode {
        DerivationMode::from_legacy_flag(self.legacy)
    }
}

/// Identity presented to the key
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct IdentityConfig {
    /// Protocol name in the identity and derivation strings
    pub app: String,

    /// User part of the identity
    pub user: String,

    /// Host part of the identity, usually the encrypted volume name
    pub host: String,

    /// Text shown on the device screen in legacy mode
    pub message: String,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            app: APP_NAME.to_string(),
            user: String::new(),
            host: String::new(),
            message: String::new(),
        }
    }
}

impl IdentityConfig {
    /// Validate identity configuration
    ///
    /// An empty host is allowed here; the binary requires it on the command line.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.app.is_empty() {
            errors.push("Application name cannot be empty".to_string());
        } else if self.app.len() > 64 {
            errors.push(format!(
                "Application name too long: {} characters (maximum: 64)",
                self.app.len()
            ));
        }

        for (name, value) in [("user", &self.user), ("host", &self.host)] {
            if value.contains('@') || value.contains('/') {
                errors.push(format!("Identity {name} cannot contain '@' or '/': '{value}'"));
            }
        }

        errors
    }

    pub fn host_info(&self) -> HostInfo {
        HostInfo::new(self.user.as_str(), self.host.as_str())
            .with_app(self.app.as_str())
            .with_message(self.message.as_str())
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset
    pub level: String,

    /// Emit JSON lines instead of human-readable output
    pub json: bool,

    /// Append to this file instead of stderr
    pub file: Option<PathBuf>,

    /// Include the event target in each line
    pub show_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: String::from("warn"),
            json: false,
            file: None,
            show_target: false,
        }
    }
}

impl LoggingConfig {
    /// Validate logging configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if !LOG_LEVELS.contains(&self.level.to_ascii_lowercase().as_str()) {
            errors.push(format!(
                "Invalid log level: '{}' (expected one of: {})",
                self.level,
                LOG_LEVELS.join(", ")
            ));
        }

        if let Some(ref path) = self.file {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() && !parent.exists() {
                    errors.push(format!(
                        "Log file directory does not exist: {}",
                        parent.display()
                    ));
                }
            }
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
