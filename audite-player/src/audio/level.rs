//! Signal level metering
//!
//! RMS over the raw interleaved buffer: one joint loudness value across all
//! channels, not a per-channel meter.

use std::sync::atomic::{AtomicU32, Ordering};

/// Root mean square of `samples`.
///
/// `sqrt(sum(v^2) / n)`, accumulated in f64. An empty slice has level 0.0.
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }

    let sum_squares: f64 = samples
        .iter()
        .map(|&v| {
            let v = v as f64;
            v * v
        })
        .sum();

    (sum_squares / samples.len() as f64).sqrt() as f32
}

/// f32 stored as its bit pattern in one atomic word.
///
/// Written once per callback cycle by the audio thread, read by anyone.
#[derive(Debug)]
pub struct AtomicLevel(AtomicU32);

impl AtomicLevel {
    pub fn new(value: f32) -> Self {
        Self(AtomicU32::new(value.to_bits()))
    }

    pub fn load(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Relaxed))
    }

    pub fn store(&self, value: f32) {
        self.0.store(value.to_bits(), Ordering::Relaxed);
    }
}

impl Default for AtomicLevel {
    fn default() -> Self {
        Self::new(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rms_of_silence_is_zero() {
        assert_eq!(rms(&[0.0; 8192]), 0.0);
    }

    #[test]
    fn test_rms_of_constant_magnitude() {
        assert_eq!(rms(&[0.5; 8192]), 0.5);

        // Sign does not matter
        let alternating: Vec<f32> = (0..8192)
            .map(|i| if i % 2 == 0 { 0.25 } else { -0.25 })
            .collect();
        assert_eq!(rms(&alternating), 0.25);
    }

    #[test]
    fn test_rms_joint_across_channels() {
        // Left full scale, right silent: sqrt(1/2)
        let buffer: Vec<f32> = (0..1024).map(|i| if i % 2 == 0 { 1.0 } else { 0.0 }).collect();
        let level = rms(&buffer);
        assert!((level - std::f32::consts::FRAC_1_SQRT_2).abs() < 1e-6);
    }

    #[test]
    fn test_rms_of_empty_buffer() {
        assert_eq!(rms(&[]), 0.0);
    }

    #[test]
    fn test_atomic_level_round_trips_bits() {
        let level = AtomicLevel::default();
        assert_eq!(level.load(), 0.0);

        level.store(0.707);
        assert_eq!(level.load(), 0.707);
    }
}
