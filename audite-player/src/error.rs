//! Error types for audite-player
//!
//! Control operations (open, start, stop, seek, read, close) report failures
//! synchronously through [`Error`]. The real-time callback never returns one.

use thiserror::Error;

/// Main error type for audite-player
#[derive(Error, Debug)]
pub enum Error {
    /// Decoder initialization, format negotiation, read or seek failure
    #[error("Audio decode error: {0}")]
    Decode(String),

    /// Output device open/start/stop failure
    #[error("Audio device error: {0}")]
    AudioDevice(String),

    /// Configuration loading errors
    #[error("Configuration error: {0}")]
    Config(#[from] audite_common::Error),
}

/// Convenience Result type using audite-player Error
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_converts() {
        let err: Error = audite_common::Error::Config("bad buffer".to_string()).into();
        assert!(matches!(err, Error::Config(_)));
        assert!(err.to_string().contains("bad buffer"));
    }

    #[test]
    fn test_messages_carry_diagnostic() {
        let err = Error::Decode("Seek to frame 9 failed".to_string());
        assert_eq!(err.to_string(), "Audio decode error: Seek to frame 9 failed");
    }
}
