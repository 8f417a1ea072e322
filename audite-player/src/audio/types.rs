//! Core audio data types
//!
//! Units used throughout the crate:
//! - **frame**: one sample per channel
//! - **sample**: one interleaved f32 value, so a stereo frame is two samples

use std::fmt;

/// Sample encoding handed out by the decoder.
///
/// Only 32-bit float is supported; negotiation fails for anything else.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleEncoding {
    /// Interleaved IEEE-754 single precision, nominal range -1.0 to 1.0
    Float32,
}

/// Negotiated stream format, pinned for the lifetime of a decoder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioFormat {
    /// Frames per second
    pub sample_rate: u32,

    /// Interleaved channel count
    pub channels: u16,

    /// Sample encoding (always Float32)
    pub encoding: SampleEncoding,
}

impl AudioFormat {
    /// Samples in one frame
    pub fn samples_per_frame(&self) -> usize {
        self.channels as usize
    }

    /// Duration of one frame in seconds
    pub fn seconds_per_frame(&self) -> f64 {
        1.0 / self.sample_rate as f64
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} Hz, {} ch, f32", self.sample_rate, self.channels)
    }
}

/// Result of an allocating [`read`](crate::audio::StreamDecoder::read).
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedChunk {
    /// Decoded interleaved samples, at most the requested count
    pub samples: Vec<f32>,

    /// Stream ended before the request was satisfied
    pub end_of_stream: bool,
}

impl DecodedChunk {
    /// Number of samples delivered
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// True when no samples were delivered
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Result of a non-allocating [`read_into`](crate::audio::StreamDecoder::read_into).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadOutcome {
    /// Samples written at the start of the destination buffer
    pub samples_written: usize,

    /// Stream ended before the buffer was filled
    pub end_of_stream: bool,
}

/// Snapshot of real-time callback counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallbackStats {
    /// Total callback invocations
    pub callbacks: u64,

    /// Callbacks that hit a decode or seek failure
    pub errors: u64,

    /// Callbacks that rendered silence because the decoder was busy
    pub contended: u64,
}
