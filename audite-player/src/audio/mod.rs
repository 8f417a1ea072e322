//! Audio subsystem: decoding, level metering and real-time output

pub mod decoder;
pub mod level;
pub mod output;
pub mod render;
pub mod types;

pub use decoder::{SharedDecoder, StreamDecoder};
pub use level::rms;
pub use output::{BridgeConfig, PlaybackBridge};
pub use render::RenderContext;
pub use types::{AudioFormat, CallbackStats, DecodedChunk, ReadOutcome, SampleEncoding};
