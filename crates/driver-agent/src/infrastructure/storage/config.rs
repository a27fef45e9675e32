//! TOML configuration for the driver agent.
//!
//! Read from `--config <PATH>` when given, otherwise from the
//! platform-appropriate config file:
//! - Windows:  `%APPDATA%\RemoteDriver\config.toml`
//! - Linux:    `~/.config/remote-driver/config.toml`
//! - macOS:    `~/Library/Application Support/RemoteDriver/config.toml`
//!
//! Example:
//!
//! ```toml
//! [agent]
//! log_level = "info"
//!
//! [network]
//! bind_address = "0.0.0.0"
//! command_port = 8100
//! port_range_start = 8080
//! port_range_end = 65000
//!
//! [automation]
//! command_timeout_secs = 30
//! applications = ["com.example.app"]
//!
//! [stream]
//! jpeg_quality = 60
//! ```
//!
//! Every field has a default, so a missing file, a missing section or a
//! missing key all fall back to the values shown above (ports absent means
//! "allocate one").

use std::net::IpAddr;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::infrastructure::network::port_allocator::DEFAULT_PORT_RANGE;
use crate::infrastructure::screen_capture::DEFAULT_JPEG_QUALITY;

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The platform config directory could not be determined.
    #[error("could not determine platform config directory")]
    NoPlatformConfigDir,

    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value parsed but makes no sense.
    #[error("invalid config value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level agent configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AgentConfig {
    #[serde(default)]
    pub agent: GeneralConfig,
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub automation: AutomationConfig,
    #[serde(default)]
    pub stream: StreamConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GeneralConfig {
    /// `tracing` filter used when `RUST_LOG` is not set.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Addresses and ports.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NetworkConfig {
    /// IP address both servers bind to.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    /// Fixed HTTP command port; allocated from the range when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command_port: Option<u16>,
    /// Fixed UDP stream port; allocated from the range when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream_port: Option<u16>,
    #[serde(default = "default_port_range_start")]
    pub port_range_start: u16,
    #[serde(default = "default_port_range_end")]
    pub port_range_end: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AutomationConfig {
    /// Upper bound on one command; `0` disables the bound.
    #[serde(default = "default_command_timeout_secs")]
    pub command_timeout_secs: u64,
    /// Application identifiers reported by `app list` and installed on the
    /// simulated device.
    #[serde(default = "default_applications")]
    pub applications: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StreamConfig {
    /// JPEG quality factor, 1-100.
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_log_level() -> String {
    "info".to_string()
}
fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}
fn default_port_range_start() -> u16 {
    *DEFAULT_PORT_RANGE.start()
}
fn default_port_range_end() -> u16 {
    *DEFAULT_PORT_RANGE.end()
}
fn default_command_timeout_secs() -> u64 {
    30
}
fn default_applications() -> Vec<String> {
    vec!["com.example.app".to_string()]
}
fn default_jpeg_quality() -> u8 {
    DEFAULT_JPEG_QUALITY
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            command_port: None,
            stream_port: None,
            port_range_start: default_port_range_start(),
            port_range_end: default_port_range_end(),
        }
    }
}

impl Default for AutomationConfig {
    fn default() -> Self {
        Self {
            command_timeout_secs: default_command_timeout_secs(),
            applications: default_applications(),
        }
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            jpeg_quality: default_jpeg_quality(),
        }
    }
}

impl NetworkConfig {
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if `bind_address` is not an IP address.
    pub fn bind_ip(&self) -> Result<IpAddr, ConfigError> {
        self.bind_address
            .parse()
            .map_err(|_| ConfigError::Invalid {
                key: "network.bind_address",
                reason: format!("'{}' is not an IP address", self.bind_address),
            })
    }

    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if the range is empty.
    pub fn port_range(&self) -> Result<RangeInclusive<u16>, ConfigError> {
        if self.port_range_start > self.port_range_end {
            return Err(ConfigError::Invalid {
                key: "network.port_range_start",
                reason: format!(
                    "{} is above port_range_end {}",
                    self.port_range_start, self.port_range_end
                ),
            });
        }
        Ok(self.port_range_start..=self.port_range_end)
    }
}

impl AutomationConfig {
    pub fn command_timeout(&self) -> Option<Duration> {
        (self.command_timeout_secs > 0).then(|| Duration::from_secs(self.command_timeout_secs))
    }
}

// ── Loading ───────────────────────────────────────────────────────────────────

/// Determines the platform-appropriate directory for the config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] when the platform config base
/// directory cannot be determined from the environment.
pub fn config_dir() -> Result<PathBuf, ConfigError> {
    platform_config_dir().ok_or(ConfigError::NoPlatformConfigDir)
}

/// Resolves the full path to the default config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] if the base directory cannot be
/// determined.
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    Ok(config_dir()?.join("config.toml"))
}

/// Loads the config from `path`, or from the default location when `path` is
/// `None`.  A missing file yields [`AgentConfig::default()`].
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config(path: Option<&Path>) -> Result<AgentConfig, ConfigError> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => config_file_path()?,
    };
    load_from(&path)
}

fn load_from(path: &Path) -> Result<AgentConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(toml::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(AgentConfig::default()),
        Err(source) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Resolves the platform config base directory including the app subdirectory.
fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA").map(|p| PathBuf::from(p).join("RemoteDriver"))
    }

    #[cfg(target_os = "linux")]
    {
        // XDG_CONFIG_HOME or ~/.config
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
        Some(base.join("remote-driver"))
    }

    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME").map(|h| {
            PathBuf::from(h)
                .join("Library")
                .join("Application Support")
                .join("RemoteDriver")
        })
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    {
        None
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
