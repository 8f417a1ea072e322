//! # Audite Player Library (audite-player)
//!
//! Real-time decode-and-playback bridge.
//!
//! **Purpose:** Decode one compressed audio stream to interleaved f32 PCM and
//! feed it to a callback-driven output device, with lazy seeking, position
//! tracking and a live RMS level meter.
//!
//! **Architecture:** symphonia decoder pulled synchronously from the cpal
//! output callback; shared fields are single atomic words.

pub mod audio;
pub mod error;

pub use audio::{
    BridgeConfig, PlaybackBridge, RenderContext, SharedDecoder, StreamDecoder,
};
pub use error::{Error, Result};
