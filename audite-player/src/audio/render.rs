//! Real-time render callback
//!
//! [`RenderContext`] is the typed state shared between the control thread and
//! the audio device thread. [`RenderContext::render`] runs once per device
//! buffer and must finish inside the buffer period (~93ms for 4096 frames at
//! 44.1kHz).
//!
//! **NEVER BLOCKS**: `render` only uses atomics and `try_lock`, never logs and
//! never returns an error. If the decoder is busy on the control thread the
//! cycle renders silence. Decoding itself may allocate inside symphonia.
//!
//! Seek requests live in their own slot until a callback takes them, so a
//! request is never lost, even one equal to the current position. A request
//! made mid-callback is applied on the next cycle.

use crate::audio::decoder::{SharedDecoder, StreamDecoder};
use crate::audio::level::{rms, AtomicLevel};
use crate::audio::types::CallbackStats;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use tracing::debug;

/// Empty seek slot
const NO_SEEK: u64 = u64::MAX;

/// State shared with the audio callback
#[derive(Debug)]
pub struct RenderContext {
    /// Bound decoder (None = silence)
    decoder: Mutex<Option<SharedDecoder>>,

    /// Requested / last rendered frame position
    position: AtomicU64,

    /// Frame a callback still has to seek to (`NO_SEEK` = none)
    seek_request: AtomicU64,

    /// RMS of the last rendered buffer
    level: AtomicLevel,

    /// Last completed cycle ran out of data
    end_of_stream: AtomicBool,

    callbacks: AtomicU64,
    errors: AtomicU64,
    contended: AtomicU64,
}

impl Default for RenderContext {
    fn default() -> Self {
        Self {
            decoder: Mutex::new(None),
            position: AtomicU64::new(0),
            seek_request: AtomicU64::new(NO_SEEK),
            level: AtomicLevel::default(),
            end_of_stream: AtomicBool::new(false),
            callbacks: AtomicU64::new(0),
            errors: AtomicU64::new(0),
            contended: AtomicU64::new(0),
        }
    }
}

impl RenderContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a decoder to the callback.
    ///
    /// The current decoder cursor becomes the position and any pending seek
    /// is dropped, so binding never triggers a seek by itself. Blocks briefly
    /// if a callback is running.
    pub fn bind(&self, decoder: SharedDecoder) {
        let cursor = decoder
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .tell_frame();

        let mut slot = self.decoder.lock().unwrap_or_else(PoisonError::into_inner);
        self.seek_request.store(NO_SEEK, Ordering::Release);
        self.position.store(cursor, Ordering::Relaxed);
        self.end_of_stream.store(false, Ordering::Relaxed);
        *slot = Some(decoder);

        debug!("Decoder bound at frame {}", cursor);
    }

    /// Detach the decoder; later callbacks render silence
    pub fn unbind(&self) -> Option<SharedDecoder> {
        self.decoder
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    pub fn is_bound(&self) -> bool {
        self.decoder
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Record a desired absolute frame; the next callback seeks to it
    pub fn request_seek(&self, frame: u64) {
        self.position.store(frame, Ordering::Relaxed);
        self.seek_request.store(frame, Ordering::Release);
    }

    /// True while a seek request waits for a callback
    pub fn seek_pending(&self) -> bool {
        self.seek_request.load(Ordering::Acquire) != NO_SEEK
    }

    /// Last requested or rendered frame position
    pub fn position(&self) -> u64 {
        self.position.load(Ordering::Relaxed)
    }

    /// RMS of the last rendered buffer
    pub fn level(&self) -> f32 {
        self.level.load()
    }

    /// True once the bound decoder has run dry.
    ///
    /// False as soon as a seek is requested.
    pub fn reached_end(&self) -> bool {
        !self.seek_pending() && self.end_of_stream.load(Ordering::Relaxed)
    }

    pub fn stats(&self) -> CallbackStats {
        CallbackStats {
            callbacks: self.callbacks.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            contended: self.contended.load(Ordering::Relaxed),
        }
    }

    /// Fill one device buffer of interleaved f32 samples.
    ///
    /// 1. No decoder (or decoder busy): silence
    /// 2. Pending seek request: take it and seek once
    /// 3. Decode straight into `out`; a short read leaves a silent tail
    /// 4. Publish RMS of the whole buffer
    /// 5. Publish the new cursor and end-of-stream state
    pub fn render(&self, out: &mut [f32]) {
        self.callbacks.fetch_add(1, Ordering::Relaxed);

        let Ok(slot) = self.decoder.try_lock() else {
            self.contended.fetch_add(1, Ordering::Relaxed);
            self.render_silence(out);
            return;
        };

        let Some(shared) = slot.as_ref() else {
            self.render_silence(out);
            return;
        };

        let Ok(mut decoder) = shared.try_lock() else {
            self.contended.fetch_add(1, Ordering::Relaxed);
            self.render_silence(out);
            return;
        };

        if self.seek_pending() {
            // Clear before emptying the slot; reached_end checks the slot first
            self.end_of_stream.store(false, Ordering::Relaxed);
            let target = self.seek_request.swap(NO_SEEK, Ordering::AcqRel);
            if target != NO_SEEK {
                self.apply_seek(&mut decoder, target);
            }
        }
        let published = self.position.load(Ordering::Relaxed);

        let end_of_stream = match decoder.read_into(out) {
            Ok(outcome) => {
                out[outcome.samples_written..].fill(0.0);
                outcome.end_of_stream
            }
            Err(_) => {
                out.fill(0.0);
                self.errors.fetch_add(1, Ordering::Relaxed);
                false
            }
        };

        self.level.store(rms(out));

        // A request that arrived during this cycle owns the position; if it
        // slips in after this check it is still in the slot for next cycle.
        if !self.seek_pending() {
            let _ = self.position.compare_exchange(
                published,
                decoder.tell_frame(),
                Ordering::Relaxed,
                Ordering::Relaxed,
            );
        }
        self.end_of_stream.store(end_of_stream, Ordering::Relaxed);
    }

    /// Seek within the known length; anything else counts as an error and
    /// playback continues from the current cursor.
    fn apply_seek(&self, decoder: &mut StreamDecoder, frame: u64) {
        let in_range = decoder.length().map_or(true, |length| frame < length);
        if !in_range || decoder.seek_frame(frame).is_err() {
            self.errors.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn render_silence(&self, out: &mut [f32]) {
        out.fill(0.0);
        self.level.store(0.0);
    }
}
