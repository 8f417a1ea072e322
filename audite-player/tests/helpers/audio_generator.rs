//! Audio test file generation utilities
//!
//! Writes deterministic 32-bit float WAV files. The WAV PCM path decodes
//! float samples bit-exactly, so tests can compare decoded values with `==`.

use hound::{WavSpec, WavWriter};
use std::f32::consts::PI;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Standard test sample rate (44.1 kHz)
pub const TEST_SAMPLE_RATE: u32 = 44100;

/// Frames in the 2-second reference fixture
pub const TWO_SECONDS: u64 = 2 * TEST_SAMPLE_RATE as u64;

fn float_spec(channels: u16) -> WavSpec {
    WavSpec {
        channels,
        sample_rate: TEST_SAMPLE_RATE,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    }
}

/// Left-channel value of frame `frame` in a ramp file.
///
/// Right channel carries the negated value.
pub fn ramp_value(frame: u64) -> f32 {
    frame as f32 * 1.0e-5
}

/// Stereo ramp: each frame encodes its own index, so a decoded sample
/// reveals exactly which frame it came from.
pub fn generate_ramp_wav<P: AsRef<Path>>(path: P, frames: u64) -> Result<(), hound::Error> {
    let mut writer = WavWriter::create(path, float_spec(2))?;

    for frame in 0..frames {
        let value = ramp_value(frame);
        writer.write_sample(value)?;
        writer.write_sample(-value)?;
    }

    writer.finalize()?;
    Ok(())
}

/// Every sample set to `value` on all channels
pub fn generate_constant_wav<P: AsRef<Path>>(
    path: P,
    frames: u64,
    channels: u16,
    value: f32,
) -> Result<(), hound::Error> {
    let mut writer = WavWriter::create(path, float_spec(channels))?;

    for _ in 0..frames * channels as u64 {
        writer.write_sample(value)?;
    }

    writer.finalize()?;
    Ok(())
}

/// Stereo sine wave, same signal on both channels
pub fn generate_sine_wav<P: AsRef<Path>>(
    path: P,
    frames: u64,
    frequency_hz: f32,
    amplitude: f32,
) -> Result<(), hound::Error> {
    let mut writer = WavWriter::create(path, float_spec(2))?;

    for frame in 0..frames {
        let t = frame as f32 / TEST_SAMPLE_RATE as f32;
        let value = amplitude * (2.0 * PI * frequency_hz * t).sin();
        writer.write_sample(value)?;
        writer.write_sample(value)?;
    }

    writer.finalize()?;
    Ok(())
}

/// Temporary directory plus the path of one fixture inside it.
///
/// The directory is removed when the fixture is dropped.
pub struct Fixture {
    _dir: TempDir,
    pub path: PathBuf,
}

impl Fixture {
    fn new(name: &str) -> Self {
        let dir = TempDir::new().expect("create temp dir");
        let path = dir.path().join(name);
        Self { _dir: dir, path }
    }

    /// 2 s, 44.1 kHz stereo float32 ramp (88200 frames)
    pub fn two_second_ramp() -> Self {
        Self::ramp(TWO_SECONDS)
    }

    pub fn ramp(frames: u64) -> Self {
        let fixture = Self::new("ramp.wav");
        generate_ramp_wav(&fixture.path, frames).expect("write ramp fixture");
        fixture
    }

    pub fn constant(frames: u64, channels: u16, value: f32) -> Self {
        let fixture = Self::new("constant.wav");
        generate_constant_wav(&fixture.path, frames, channels, value)
            .expect("write constant fixture");
        fixture
    }

    pub fn sine(frames: u64, frequency_hz: f32, amplitude: f32) -> Self {
        let fixture = Self::new("sine.wav");
        generate_sine_wav(&fixture.path, frames, frequency_hz, amplitude)
            .expect("write sine fixture");
        fixture
    }
}
