//! Configuration loading and config file resolution
//!
//! Settings sources, highest priority first:
//! 1. Command-line arguments (applied by the binary on top of the loaded file)
//! 2. `AUDITE_CONFIG` environment variable naming a TOML file
//! 3. `<config_dir>/audite/config.toml`
//! 4. Built-in defaults
//!
//! A missing config file SHALL NOT stop playback: it is reported with a
//! warning and the built-in defaults are used. A file that exists but does not
//! parse is an error.

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Environment variable naming the TOML configuration file
pub const CONFIG_ENV_VAR: &str = "AUDITE_CONFIG";

/// Bootstrap configuration loaded from TOML
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct TomlConfig {
    /// Output stream parameters
    #[serde(default)]
    pub output: OutputConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Output stream parameters
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct OutputConfig {
    /// Output device name (None = host default device)
    #[serde(default)]
    pub device: Option<String>,

    /// Output channel count
    #[serde(default = "default_channels")]
    pub channels: u16,

    /// Output sample rate in Hz
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,

    /// Fixed hardware buffer size in frames
    #[serde(default = "default_frames_per_buffer")]
    pub frames_per_buffer: u32,

    /// Interval between level meter reports in milliseconds
    #[serde(default = "default_meter_interval_ms")]
    pub meter_interval_ms: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_channels() -> u16 {
    2
}

fn default_sample_rate() -> u32 {
    44100
}

fn default_frames_per_buffer() -> u32 {
    4096
}

fn default_meter_interval_ms() -> u64 {
    250
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            device: None,
            channels: default_channels(),
            sample_rate: default_sample_rate(),
            frames_per_buffer: default_frames_per_buffer(),
            meter_interval_ms: default_meter_interval_ms(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl TomlConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: TomlConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    ///
    /// # Errors
    /// - File cannot be read
    /// - TOML is malformed or fails validation
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Load configuration, falling back to defaults when no file is available
    ///
    /// `None` and paths that do not exist both yield the built-in defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) if path.exists() => Self::load(path),
            Some(path) => {
                warn!(
                    "Config file {} not found, using built-in defaults",
                    path.display()
                );
                Ok(Self::default())
            }
            None => {
                debug!("No config file, using built-in defaults");
                Ok(Self::default())
            }
        }
    }

    /// Reject values the output stream cannot be opened with
    pub fn validate(&self) -> Result<()> {
        let output = &self.output;

        if output.channels == 0 {
            return Err(Error::Config("output.channels must be at least 1".to_string()));
        }
        if output.sample_rate == 0 {
            return Err(Error::Config("output.sample_rate must be non-zero".to_string()));
        }
        if output.frames_per_buffer == 0 {
            return Err(Error::Config(
                "output.frames_per_buffer must be non-zero".to_string(),
            ));
        }
        if output.meter_interval_ms == 0 {
            return Err(Error::Config(
                "output.meter_interval_ms must be non-zero".to_string(),
            ));
        }

        Ok(())
    }
}

/// Resolves which config file to read
///
/// Priority: explicit path, then the environment variable, then the
/// per-user default location (only if that file exists).
#[derive(Debug, Clone)]
pub struct ConfigResolver {
    env_var: String,
}

impl ConfigResolver {
    /// Resolver reading the standard `AUDITE_CONFIG` variable
    pub fn new() -> Self {
        Self::with_env_var(CONFIG_ENV_VAR)
    }

    /// Resolver reading a custom environment variable
    pub fn with_env_var(env_var: &str) -> Self {
        Self {
            env_var: env_var.to_string(),
        }
    }

    /// Pick the config file path, if any
    pub fn resolve(&self, cli_path: Option<&Path>) -> Option<PathBuf> {
        if let Some(path) = cli_path {
            debug!("Config file from command line: {}", path.display());
            return Some(path.to_path_buf());
        }

        if let Ok(path) = std::env::var(&self.env_var) {
            if !path.is_empty() {
                debug!("Config file from {}: {}", self.env_var, path);
                return Some(PathBuf::from(path));
            }
        }

        default_config_path().filter(|path| path.exists())
    }
}

impl Default for ConfigResolver {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-user config file location (`~/.config/audite/config.toml` on Linux)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("audite").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_stream_contract() {
        let config = TomlConfig::default();
        assert_eq!(config.output.channels, 2);
        assert_eq!(config.output.sample_rate, 44100);
        assert_eq!(config.output.frames_per_buffer, 4096);
        assert_eq!(config.output.device, None);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = TomlConfig::from_toml_str("").unwrap();
        assert_eq!(config, TomlConfig::default());
    }

    #[test]
    fn test_partial_section_keeps_other_defaults() {
        let config = TomlConfig::from_toml_str(
            r#"
            [output]
            frames_per_buffer = 1024
            device = "USB DAC"
            "#,
        )
        .unwrap();

        assert_eq!(config.output.frames_per_buffer, 1024);
        assert_eq!(config.output.device.as_deref(), Some("USB DAC"));
        assert_eq!(config.output.sample_rate, 44100);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_zero_buffer_rejected() {
        let err = TomlConfig::from_toml_str("[output]\nframes_per_buffer = 0\n").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_malformed_toml_rejected() {
        let err = TomlConfig::from_toml_str("[output\nchannels = 2").unwrap_err();
        assert!(matches!(err, Error::Toml(_)));
    }
}
