//! Audio output using cpal
//!
//! [`PlaybackBridge`] owns one output stream whose callback drives a bound
//! [`StreamDecoder`](crate::audio::StreamDecoder) through a shared
//! [`RenderContext`].
//!
//! Lifecycle: `open` builds the stream (silence until a decoder is bound),
//! `start` binds a decoder and plays, `stop` pauses, `close` (or drop)
//! pauses and releases the stream exactly once.

use crate::audio::decoder::SharedDecoder;
use crate::audio::render::RenderContext;
use crate::audio::types::CallbackStats;
use crate::error::{Error, Result};
use audite_common::OutputConfig;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, Stream, StreamConfig};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError};
use tracing::{debug, error, info, warn};

/// Output stream parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeConfig {
    /// Output device name (None = default device)
    pub device: Option<String>,

    /// Output channel count
    pub output_channels: u16,

    /// Stream sample rate in Hz
    pub sample_rate: u32,

    /// Fixed hardware buffer size in frames
    pub frames_per_buffer: u32,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            device: None,
            output_channels: 2,
            sample_rate: 44100,
            frames_per_buffer: 4096,
        }
    }
}

impl From<&OutputConfig> for BridgeConfig {
    fn from(config: &OutputConfig) -> Self {
        Self {
            device: config.device.clone(),
            output_channels: config.channels,
            sample_rate: config.sample_rate,
            frames_per_buffer: config.frames_per_buffer,
        }
    }
}

impl BridgeConfig {
    fn stream_config(&self) -> StreamConfig {
        StreamConfig {
            channels: self.output_channels,
            sample_rate: cpal::SampleRate(self.sample_rate),
            buffer_size: cpal::BufferSize::Fixed(self.frames_per_buffer),
        }
    }
}

/// Decode-and-playback bridge over one cpal output stream.
///
/// The bridge never owns the decoder's lifecycle; it holds a shared handle
/// from `start` until `close`.
pub struct PlaybackBridge {
    device: Device,
    config: BridgeConfig,
    stream: Option<Stream>,
    context: Arc<RenderContext>,
    /// Set by the stream error callback
    error_flag: Arc<AtomicBool>,
}

impl PlaybackBridge {
    /// List available audio output devices.
    pub fn list_devices() -> Result<Vec<String>> {
        let host = cpal::default_host();

        let devices: Vec<String> = host
            .output_devices()
            .map_err(|e| Error::AudioDevice(format!("Failed to enumerate devices: {}", e)))?
            .filter_map(|device| device.name().ok())
            .collect();

        debug!("Found {} output devices", devices.len());
        Ok(devices)
    }

    /// Open the output stream.
    ///
    /// No decoder is bound yet; callbacks render silence.
    ///
    /// # Errors
    /// - No output device available
    /// - Device rejects the channel count, sample rate or buffer size
    pub fn open(config: BridgeConfig) -> Result<Self> {
        let device = Self::select_device(config.device.as_deref())?;
        let stream_config = config.stream_config();

        debug!(
            "Audio config: sample_rate={}, channels={}, buffer_size={:?}",
            stream_config.sample_rate.0, stream_config.channels, stream_config.buffer_size
        );

        let context = Arc::new(RenderContext::new());
        let error_flag = Arc::new(AtomicBool::new(false));
        let stream = Self::build_stream(
            &device,
            &stream_config,
            Arc::clone(&context),
            Arc::clone(&error_flag),
        )?;

        info!(
            "Output stream opened: {} Hz, {} ch, {} frames per buffer",
            config.sample_rate, config.output_channels, config.frames_per_buffer
        );

        Ok(Self {
            device,
            config,
            stream: Some(stream),
            context,
            error_flag,
        })
    }

    /// Requested device, falling back to the default device.
    fn select_device(name: Option<&str>) -> Result<Device> {
        let host = cpal::default_host();

        if let Some(name) = name {
            let mut devices = host
                .output_devices()
                .map_err(|e| Error::AudioDevice(format!("Failed to enumerate devices: {}", e)))?;

            if let Some(device) = devices.find(|d| d.name().ok().as_deref() == Some(name)) {
                info!("Found requested audio device: {}", name);
                return Ok(device);
            }

            warn!("Requested device '{}' not found, falling back to default device", name);
        }

        let device = host
            .default_output_device()
            .ok_or_else(|| Error::AudioDevice("No default output device found".to_string()))?;

        info!(
            "Using audio device: {}",
            device.name().unwrap_or_else(|_| "Unknown".to_string())
        );
        Ok(device)
    }

    fn build_stream(
        device: &Device,
        config: &StreamConfig,
        context: Arc<RenderContext>,
        error_flag: Arc<AtomicBool>,
    ) -> Result<Stream> {
        device
            .build_output_stream(
                config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    context.render(data);
                },
                move |err| {
                    error!("Audio stream error: {}", err);
                    error_flag.store(true, Ordering::SeqCst);
                },
                None,
            )
            .map_err(|e| Error::AudioDevice(format!("Failed to build output stream: {}", e)))
    }

    /// Bind `decoder` and start the stream.
    ///
    /// The decoder keeps playing from its current cursor. It must stay open
    /// until `stop` or `close`; a decoder closed while the stream runs only
    /// produces silence.
    pub fn start(&mut self, decoder: SharedDecoder) -> Result<()> {
        let stream = self
            .stream
            .as_ref()
            .ok_or_else(|| Error::AudioDevice("Output stream is closed".to_string()))?;

        {
            let guard = decoder.lock().unwrap_or_else(PoisonError::into_inner);
            if guard.is_closed() {
                return Err(Error::Decode("Cannot start playback of a closed decoder".to_string()));
            }

            let format = guard.format();
            if format.sample_rate != self.config.sample_rate
                || format.channels != self.config.output_channels
            {
                warn!(
                    "Decoder format ({}) differs from output stream ({} Hz, {} ch); playback will be distorted",
                    format, self.config.sample_rate, self.config.output_channels
                );
            }
        }

        self.context.bind(decoder);

        stream
            .play()
            .map_err(|e| Error::AudioDevice(format!("Failed to start stream: {}", e)))?;

        info!("Audio stream started at frame {}", self.context.position());
        Ok(())
    }

    /// Pause the stream.
    ///
    /// Safe to call whether or not `start` succeeded. Once this returns cpal
    /// no longer invokes the callback.
    pub fn stop(&mut self) -> Result<()> {
        if let Some(stream) = self.stream.as_ref() {
            stream
                .pause()
                .map_err(|e| Error::AudioDevice(format!("Failed to pause stream: {}", e)))?;
            info!("Audio stream stopped at frame {}", self.context.position());
        }

        Ok(())
    }

    /// Request playback from an absolute frame.
    ///
    /// Applied by the next callback; never touches the decoder here.
    pub fn seek_frames(&self, frame: u64) {
        self.context.request_seek(frame);
        debug!("Seek requested to frame {}", frame);
    }

    /// RMS of the most recently rendered buffer
    pub fn current_level(&self) -> f32 {
        self.context.level()
    }

    /// Last requested or rendered frame position
    pub fn position(&self) -> u64 {
        self.context.position()
    }

    /// True once the bound decoder has run out of data
    pub fn reached_end(&self) -> bool {
        self.context.reached_end()
    }

    pub fn stats(&self) -> CallbackStats {
        self.context.stats()
    }

    /// True if the device reported a stream error
    pub fn has_error(&self) -> bool {
        self.error_flag.load(Ordering::SeqCst)
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn device_name(&self) -> String {
        self.device.name().unwrap_or_else(|_| "Unknown".to_string())
    }

    /// Shared callback state
    pub fn context(&self) -> &Arc<RenderContext> {
        &self.context
    }

    /// Pause and release the stream, then unbind the decoder.
    ///
    /// The stream is released exactly once; later calls are no-ops.
    pub fn close(&mut self) -> Result<()> {
        let Some(stream) = self.stream.take() else {
            return Ok(());
        };

        let paused = stream.pause();
        drop(stream);
        self.context.unbind();

        let stats = self.context.stats();
        info!(
            "Output stream closed after {} callbacks ({} errors, {} contended)",
            stats.callbacks, stats.errors, stats.contended
        );

        paused.map_err(|e| Error::AudioDevice(format!("Failed to pause stream: {}", e)))
    }
}

impl Drop for PlaybackBridge {
    fn drop(&mut self) {
        // Ensure stream is stopped on drop
        let _ = self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_matches_stream_contract() {
        let config = BridgeConfig::default();
        assert_eq!(config.output_channels, 2);
        assert_eq!(config.sample_rate, 44100);
        assert_eq!(config.frames_per_buffer, 4096);

        let stream_config = config.stream_config();
        assert_eq!(stream_config.channels, 2);
        assert_eq!(stream_config.sample_rate.0, 44100);
        assert_eq!(stream_config.buffer_size, cpal::BufferSize::Fixed(4096));
    }

    #[test]
    fn test_config_from_output_section() {
        let output = OutputConfig {
            device: Some("USB DAC".to_string()),
            frames_per_buffer: 1024,
            ..OutputConfig::default()
        };

        let config = BridgeConfig::from(&output);
        assert_eq!(config.device.as_deref(), Some("USB DAC"));
        assert_eq!(config.frames_per_buffer, 1024);
        assert_eq!(config.sample_rate, 44100);
    }
}
