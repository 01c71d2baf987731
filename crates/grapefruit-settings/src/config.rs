//! Configuration management for Grapefruit
//!
//! Provides configuration file handling, defaults, and validation.
//! Supports JSON and TOML file formats stored in the platform config
//! directory.
//!
//! Configuration is organized into logical sections:
//! - Connection settings (port, baud rate, read timeout)
//! - Link settings (boot settle delay, pacing, handshake and shutdown commands)
//! - Streaming settings (inter-command delay)
//! - Motion defaults (move feed rate)
//! - File settings (where the file browser starts)

use crate::error::{SettingsError, SettingsResult};
use grapefruit_core::InlineCommentPolicy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Directory name under the platform config dir
pub const APP_DIR_NAME: &str = "grapefruit";

/// Config file name inside [`APP_DIR_NAME`]
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Serial connection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionSettings {
    /// Last used port; empty when none was chosen yet
    pub port: String,
    /// Baud rate
    pub baud_rate: u32,
    /// Read timeout in milliseconds; bounds every response read
    pub read_timeout_ms: u64,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            port: String::new(),
            baud_rate: 115200,
            read_timeout_ms: 1000,
        }
    }
}

/// CNC link behaviour
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkSettings {
    /// Time to let the controller boot after opening the port
    pub settle_delay_ms: u64,
    /// Pause between writing a command and reading its response
    pub pacing_interval_ms: u64,
    /// Diagnostic command sent right after connecting
    pub handshake_command: String,
    /// End-of-job command sent on terminate
    pub shutdown_command: String,
    /// Treatment of comments trailing a command
    pub inline_comments: InlineCommentPolicy,
}

impl Default for LinkSettings {
    fn default() -> Self {
        Self {
            settle_delay_ms: 2000,
            pacing_interval_ms: 1000,
            handshake_command: "$$".to_string(),
            shutdown_command: "M02".to_string(),
            inline_comments: InlineCommentPolicy::default(),
        }
    }
}

/// Batch streaming behaviour
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamingSettings {
    /// Pause between two transmitted lines of a batch
    pub inter_command_delay_ms: u64,
}

impl Default for StreamingSettings {
    fn default() -> Self {
        Self {
            inter_command_delay_ms: 100,
        }
    }
}

/// Motion command defaults
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionSettings {
    /// Feed rate in units/minute for moves given without one
    pub move_rate: f64,
}

impl Default for MotionSettings {
    fn default() -> Self {
        Self { move_rate: 25.0 }
    }
}

/// File browsing settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileSettings {
    /// Directory the file browser starts in
    pub start_directory: PathBuf,
}

impl Default for FileSettings {
    fn default() -> Self {
        Self {
            start_directory: dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")),
        }
    }
}

/// Complete application configuration
///
/// Aggregates all settings sections and provides file I/O operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub connection: ConnectionSettings,
    pub link: LinkSettings,
    pub streaming: StreamingSettings,
    pub motion: MotionSettings,
    pub files: FileSettings,
}

impl Config {
    /// Create new config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Default config file location (`<config dir>/grapefruit/config.toml`)
    pub fn default_path() -> SettingsResult<PathBuf> {
        dirs::config_dir()
            .map(|dir| dir.join(APP_DIR_NAME).join(CONFIG_FILE_NAME))
            .ok_or_else(|| {
                SettingsError::ConfigDirectory("no config directory on this platform".to_string())
            })
    }

    /// Load config from file (JSON or TOML)
    pub fn load_from_file(path: &Path) -> SettingsResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            SettingsError::LoadError(format!("{}: {}", path.display(), e))
        })?;

        let config: Self = match Format::of(path)? {
            Format::Json => serde_json::from_str(&content)?,
            Format::Toml => toml::from_str(&content)?,
        };

        config.validate()?;
        tracing::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Load config from `path`, falling back to defaults when the file does not exist
    pub fn load_or_default(path: &Path) -> SettingsResult<Self> {
        if path.exists() {
            Self::load_from_file(path)
        } else {
            tracing::debug!("No config at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Save config to file (JSON or TOML), creating parent directories
    pub fn save_to_file(&self, path: &Path) -> SettingsResult<()> {
        self.validate()?;

        let content = match Format::of(path)? {
            Format::Json => serde_json::to_string_pretty(self)?,
            Format::Toml => toml::to_string_pretty(self)?,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                SettingsError::ConfigDirectory(format!("{}: {}", parent.display(), e))
            })?;
        }

        std::fs::write(path, content)
            .map_err(|e| SettingsError::SaveError(format!("{}: {}", path.display(), e)))?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> SettingsResult<()> {
        if self.connection.baud_rate == 0 {
            return Err(SettingsError::invalid("connection.baud_rate", "must be > 0"));
        }

        if self.connection.read_timeout_ms == 0 {
            return Err(SettingsError::invalid(
                "connection.read_timeout_ms",
                "must be > 0",
            ));
        }

        if self.link.handshake_command.trim().is_empty() {
            return Err(SettingsError::invalid(
                "link.handshake_command",
                "must not be empty",
            ));
        }

        if self.link.shutdown_command.trim().is_empty() {
            return Err(SettingsError::invalid(
                "link.shutdown_command",
                "must not be empty",
            ));
        }

        if self.motion.move_rate <= 0.0 {
            return Err(SettingsError::invalid("motion.move_rate", "must be > 0"));
        }

        Ok(())
    }
}

enum Format {
    Json,
    Toml,
}

impl Format {
    fn of(path: &Path) -> SettingsResult<Self> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Ok(Format::Json),
            Some("toml") => Ok(Format::Toml),
            other => Err(SettingsError::UnsupportedFormat(
                other.unwrap_or("<none>").to_string(),
            )),
        }
    }
}
