//! Pure audio classification and buffering primitives.
//!
//! Nothing in this crate performs I/O or suspends: the voice activity
//! detector and the jitter buffer are synchronous state machines driven by
//! whatever capture loop feeds them.

pub mod jitter;
pub mod vad;

pub use jitter::JitterBuffer;
pub use vad::{VadConfig, VoiceActivityDetector};

/// Root-mean-square energy of a PCM frame, in `0..=1` for normalized input.
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_sq: f32 = samples.iter().map(|s| s * s).sum();
    (sum_sq / samples.len() as f32).sqrt()
}

/// Fraction of adjacent sample pairs whose signs differ.
///
/// Voiced speech sits in a characteristic band: low-frequency rumble barely
/// crosses zero, broadband hiss crosses constantly.
pub fn zero_crossing_rate(samples: &[f32]) -> f32 {
    if samples.len() < 2 {
        return 0.0;
    }
    let crossings = samples
        .windows(2)
        .filter(|w| (w[0] >= 0.0) != (w[1] >= 0.0))
        .count();
    crossings as f32 / (samples.len() - 1) as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rms_of_silence_is_zero() {
        assert_eq!(rms(&[0.0; 128]), 0.0);
        assert_eq!(rms(&[]), 0.0);
    }

    #[test]
    fn rms_of_full_scale_square_is_one() {
        let frame = [1.0f32, -1.0, 1.0, -1.0];
        assert!((rms(&frame) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn zcr_of_alternating_signal_is_one() {
        let frame = [1.0f32, -1.0, 1.0, -1.0];
        assert!((zero_crossing_rate(&frame) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn zcr_of_constant_signal_is_zero() {
        assert_eq!(zero_crossing_rate(&[0.5f32; 64]), 0.0);
        assert_eq!(zero_crossing_rate(&[0.5f32]), 0.0);
    }
}
