//! Streaming audio decoder using symphonia
//!
//! Decodes MP3, FLAC, AAC, Vorbis and WAV to interleaved f32 samples with
//! pull-based reads and sample-accurate absolute seeking.
//!
//! Every source sample format is converted to f32, so the negotiated encoding
//! is always [`SampleEncoding::Float32`]. Rate and channel count are pinned at
//! open time; a packet that disagrees with them is a decode error.

use crate::audio::types::{AudioFormat, DecodedChunk, ReadOutcome, SampleEncoding};
use crate::error::{Error, Result};
use std::fs::File;
use std::path::Path;
use std::sync::{Arc, Mutex};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{Decoder, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader, SeekMode, SeekTo};
use symphonia::core::io::{MediaSource, MediaSourceStream};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::core::units::TimeBase;
use tracing::{debug, info};

/// Consecutive corrupt packets tolerated before a read fails
const MAX_DECODE_RETRIES: usize = 3;

/// Decoder handle shared between the control thread and the audio callback
pub type SharedDecoder = Arc<Mutex<StreamDecoder>>;

/// Native engine state, dropped exactly once on close or drop
struct EngineHandle {
    format: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    time_base: Option<TimeBase>,
    /// Last decoded packet, interleaved; reused across packets
    pending: Option<SampleBuffer<f32>>,
    /// Samples of `pending` already consumed
    pending_offset: usize,
}

impl EngineHandle {
    fn pending_samples(&self) -> &[f32] {
        match &self.pending {
            Some(buffer) => &buffer.samples()[self.pending_offset..],
            None => &[],
        }
    }

    /// Mark the buffered packet consumed, keeping its allocation
    fn clear_pending(&mut self) {
        self.pending_offset = self.pending.as_ref().map_or(0, |buffer| buffer.len());
    }

    /// Decode the next packet of our track into `pending`.
    ///
    /// Returns `Ok(false)` at end of stream.
    fn decode_next(&mut self, expected: &AudioFormat) -> Result<bool> {
        let mut decode_errors = 0;

        loop {
            let packet = match self.format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(ref e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    return Ok(false);
                }
                Err(SymphoniaError::ResetRequired) => {
                    self.decoder.reset();
                    continue;
                }
                Err(e) => return Err(Error::Decode(format!("Failed to read packet: {}", e))),
            };

            // Skip packets for other tracks
            if packet.track_id() != self.track_id {
                continue;
            }

            let decoded = match self.decoder.decode(&packet) {
                Ok(decoded) => decoded,
                Err(SymphoniaError::DecodeError(e)) => {
                    decode_errors += 1;
                    if decode_errors > MAX_DECODE_RETRIES {
                        return Err(Error::Decode(format!(
                            "Decoding failed on {} consecutive packets: {}",
                            decode_errors, e
                        )));
                    }
                    continue;
                }
                Err(e) => return Err(Error::Decode(format!("Decode failed: {}", e))),
            };

            let spec = decoded.spec().clone();
            if spec.rate != expected.sample_rate
                || spec.channels.count() != expected.channels as usize
            {
                return Err(Error::Decode(format!(
                    "Stream format changed to {} Hz, {} ch (negotiated {})",
                    spec.rate,
                    spec.channels.count(),
                    expected
                )));
            }

            if decoded.frames() == 0 {
                continue;
            }

            // Reuse the previous buffer unless this packet is larger
            let needed = decoded.capacity() * spec.channels.count();
            let mut buffer = match self.pending.take() {
                Some(buffer) if buffer.capacity() >= needed => buffer,
                _ => SampleBuffer::<f32>::new(decoded.capacity() as u64, spec),
            };
            buffer.copy_interleaved_ref(decoded);

            self.pending = Some(buffer);
            self.pending_offset = 0;
            return Ok(true);
        }
    }
}

/// Pull-based decoder over one audio track.
///
/// The read cursor only moves forward on reads, except for explicit seeks.
pub struct StreamDecoder {
    engine: Option<EngineHandle>,
    format: AudioFormat,
    n_frames: Option<u64>,
    /// Read cursor in samples
    cursor_samples: u64,
    /// Decoded samples to discard before the cursor (after a coarse seek)
    skip_samples: u64,
    end_of_stream: bool,
}

impl StreamDecoder {
    /// Open an audio file for decoding.
    ///
    /// The file extension is used as a probe hint.
    ///
    /// # Errors
    /// - Failed to open file
    /// - Unsupported or unrecognised format
    /// - Sample rate or channel layout unknown
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        debug!("Opening decoder: {}", path.display());

        let file = File::open(path)
            .map_err(|e| Error::Decode(format!("Failed to open file {}: {}", path.display(), e)))?;

        let extension = path.extension().and_then(|ext| ext.to_str());
        Self::open_source(Box::new(file), extension)
    }

    /// Open any media source (file, in-memory cursor, ...).
    pub fn open_source(source: Box<dyn MediaSource>, extension: Option<&str>) -> Result<Self> {
        let mss = MediaSourceStream::new(source, Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = extension {
            hint.with_extension(ext);
        }

        let format_opts = FormatOptions {
            enable_gapless: true,
            ..Default::default()
        };

        let probed = symphonia::default::get_probe()
            .format(&hint, mss, &format_opts, &MetadataOptions::default())
            .map_err(|e| Error::Decode(format!("Failed to probe format: {}", e)))?;

        let reader = probed.format;

        let track = reader
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| Error::Decode("No audio track found".to_string()))?;

        let track_id = track.id;
        let params = track.codec_params.clone();

        let sample_rate = params
            .sample_rate
            .ok_or_else(|| Error::Decode("Sample rate not found".to_string()))?;

        let channels = params
            .channels
            .map(|c| c.count() as u16)
            .ok_or_else(|| Error::Decode("Channel count not found".to_string()))?;

        let format = negotiate_format(sample_rate, channels)?;

        let decoder = symphonia::default::get_codecs()
            .make(&params, &DecoderOptions::default())
            .map_err(|e| Error::Decode(format!("Failed to create decoder: {}", e)))?;

        info!(
            "Decoder opened: {}, length={:?} frames",
            format, params.n_frames
        );

        Ok(Self {
            engine: Some(EngineHandle {
                format: reader,
                decoder,
                track_id,
                time_base: params.time_base,
                pending: None,
                pending_offset: 0,
            }),
            format,
            n_frames: params.n_frames,
            cursor_samples: 0,
            skip_samples: 0,
            end_of_stream: false,
        })
    }

    /// Wrap in the shared handle a [`PlaybackBridge`](crate::audio::PlaybackBridge) binds to
    pub fn into_shared(self) -> SharedDecoder {
        Arc::new(Mutex::new(self))
    }

    /// Negotiated format
    pub fn format(&self) -> AudioFormat {
        self.format
    }

    pub fn sample_rate(&self) -> u32 {
        self.format.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.format.channels
    }

    /// Samples per frame (the channel count)
    pub fn samples_per_frame(&self) -> usize {
        self.format.samples_per_frame()
    }

    /// Duration of one frame in seconds
    pub fn seconds_per_frame(&self) -> f64 {
        self.format.seconds_per_frame()
    }

    /// Total frames as reported by the container.
    ///
    /// An estimate for variable bit-rate streams; `None` when unknown.
    pub fn length(&self) -> Option<u64> {
        self.n_frames
    }

    /// Read cursor in samples
    pub fn tell(&self) -> u64 {
        self.cursor_samples
    }

    /// Read cursor in frames
    pub fn tell_frame(&self) -> u64 {
        self.cursor_samples / self.format.channels as u64
    }

    /// True once a read ran into the end of the stream (cleared by seeking)
    pub fn is_end_of_stream(&self) -> bool {
        self.end_of_stream
    }

    /// True after [`close`](Self::close)
    pub fn is_closed(&self) -> bool {
        self.engine.is_none()
    }

    /// Decode up to `count` samples.
    ///
    /// A short result at stream end is not an error; it comes back with
    /// `end_of_stream` set.
    pub fn read(&mut self, count: usize) -> Result<DecodedChunk> {
        let mut samples = vec![0.0; count];
        let outcome = self.read_into(&mut samples)?;
        samples.truncate(outcome.samples_written);

        Ok(DecodedChunk {
            samples,
            end_of_stream: outcome.end_of_stream,
        })
    }

    /// Decode directly into `out`, filling it from the start.
    ///
    /// Samples past `samples_written` are left untouched. Allocates only when
    /// a packet is larger than any seen before.
    pub fn read_into(&mut self, out: &mut [f32]) -> Result<ReadOutcome> {
        let engine = self.engine.as_mut().ok_or_else(closed_error)?;
        let mut written = 0;

        while written < out.len() {
            let available = engine.pending_samples();

            if !available.is_empty() {
                if self.skip_samples > 0 {
                    let skipped = (self.skip_samples as usize).min(available.len());
                    engine.pending_offset += skipped;
                    self.skip_samples -= skipped as u64;
                    continue;
                }

                let n = available.len().min(out.len() - written);
                out[written..written + n].copy_from_slice(&available[..n]);
                engine.pending_offset += n;
                written += n;
                self.cursor_samples += n as u64;
                continue;
            }

            if self.end_of_stream {
                break;
            }

            if !engine.decode_next(&self.format)? {
                self.end_of_stream = true;
            }
        }

        Ok(ReadOutcome {
            samples_written: written,
            end_of_stream: written < out.len(),
        })
    }

    /// Seek to an absolute frame.
    ///
    /// Sample-accurate: the container's landing point is refined by dropping
    /// decoded frames up to `frame`. Returns the new frame position.
    ///
    /// # Errors
    /// - `frame` is not within `[0, length())`
    /// - The container cannot seek (e.g. non-seekable source)
    /// - Decoder is closed
    pub fn seek_frame(&mut self, frame: u64) -> Result<u64> {
        if let Some(length) = self.n_frames {
            if frame >= length {
                return Err(Error::Decode(format!(
                    "Seek target frame {} out of range (length {} frames)",
                    frame, length
                )));
            }
        }

        let sample_rate = self.format.sample_rate;
        let channels = self.format.channels as u64;
        let engine = self.engine.as_mut().ok_or_else(closed_error)?;

        let seeked = engine
            .format
            .seek(
                SeekMode::Accurate,
                SeekTo::TimeStamp {
                    ts: frame_to_ts(frame, sample_rate, engine.time_base),
                    track_id: engine.track_id,
                },
            )
            .map_err(|e| Error::Decode(format!("Seek to frame {} failed: {}", frame, e)))?;

        engine.decoder.reset();
        engine.clear_pending();

        let landed = ts_to_frame(seeked.actual_ts, sample_rate, engine.time_base).min(frame);
        self.skip_samples = (frame - landed) * channels;
        self.cursor_samples = frame * channels;
        self.end_of_stream = false;

        Ok(frame)
    }

    /// Seek to an absolute sample offset.
    ///
    /// Offsets inside a frame round down to the frame start. Returns the new
    /// position in samples.
    pub fn seek(&mut self, sample_offset: u64) -> Result<u64> {
        let channels = self.format.channels as u64;
        let frame = self.seek_frame(sample_offset / channels)?;
        Ok(frame * channels)
    }

    /// Nearest frame for a time offset; does not move the cursor.
    pub fn frame_for_time(&self, seconds: f64) -> Result<u64> {
        if !seconds.is_finite() || seconds < 0.0 {
            return Err(Error::Decode(format!("Invalid time offset: {}", seconds)));
        }

        Ok((seconds * self.format.sample_rate as f64).round() as u64)
    }

    /// Release the native decoder.
    ///
    /// Later calls are no-ops; reads and seeks fail afterwards.
    pub fn close(&mut self) {
        if self.engine.take().is_some() {
            debug!("Decoder closed at frame {}", self.tell_frame());
        }
    }
}

impl std::fmt::Debug for StreamDecoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamDecoder")
            .field("format", &self.format)
            .field("n_frames", &self.n_frames)
            .field("cursor_samples", &self.cursor_samples)
            .field("end_of_stream", &self.end_of_stream)
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Pin the output format; every source sample format converts to f32.
fn negotiate_format(sample_rate: u32, channels: u16) -> Result<AudioFormat> {
    if sample_rate == 0 {
        return Err(Error::Decode("Invalid sample rate 0".to_string()));
    }
    if channels == 0 {
        return Err(Error::Decode("Stream has no channels".to_string()));
    }

    Ok(AudioFormat {
        sample_rate,
        channels,
        encoding: SampleEncoding::Float32,
    })
}

fn closed_error() -> Error {
    Error::Decode("Decoder is closed".to_string())
}

/// Frame index to track timestamp. Identity when the time base is 1/rate.
fn frame_to_ts(frame: u64, sample_rate: u32, time_base: Option<TimeBase>) -> u64 {
    match time_base {
        Some(tb) if tb.numer != 0 => {
            (frame as u128 * tb.denom as u128 / (sample_rate as u128 * tb.numer as u128)) as u64
        }
        _ => frame,
    }
}

/// Track timestamp to frame index.
fn ts_to_frame(ts: u64, sample_rate: u32, time_base: Option<TimeBase>) -> u64 {
    match time_base {
        Some(tb) if tb.denom != 0 => {
            (ts as u128 * sample_rate as u128 * tb.numer as u128 / tb.denom as u128) as u64
        }
        _ => ts,
    }
}
