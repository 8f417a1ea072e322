//! # Audite Common Library
//!
//! Shared code for the Audite playback crates:
//! - Error type shared by configuration loading
//! - TOML configuration with built-in defaults
//! - Configuration file resolution

pub mod config;
pub mod error;

pub use config::{LoggingConfig, OutputConfig, TomlConfig};
pub use error::{Error, Result};
