//! Voice activity detection with joint-threshold classification and
//! hangover hysteresis.

use std::time::{Duration, Instant};

/// Tunable thresholds for the detector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VadConfig {
    /// Minimum RMS energy for a sample to count as voiced (`0..=1`).
    pub rms_threshold: f32,
    /// Minimum zero-crossing rate for a sample to count as voiced.
    pub zcr_threshold: f32,
    /// How long `speaking` stays true after the last voiced sample.
    pub hangover: Duration,
}

impl Default for VadConfig {
    fn default() -> Self {
        Self {
            rms_threshold: 0.02,
            zcr_threshold: 0.02,
            hangover: Duration::from_millis(300),
        }
    }
}

/// Binary speaking/not-speaking classifier with hysteresis.
///
/// A sample is voiced only when *both* the energy and zero-crossing
/// thresholds pass: low-frequency rumble (high energy, low ZCR) and
/// broadband hiss (non-voice ZCR, low energy) each fail one of the two
/// gates. Once voiced input is seen, `speaking` holds true until a full
/// hangover window elapses with nothing voiced, so the indicator does not
/// chatter through the natural pauses between words.
#[derive(Debug)]
pub struct VoiceActivityDetector {
    config: VadConfig,
    speaking: bool,
    last_voiced: Option<Instant>,
}

impl VoiceActivityDetector {
    pub fn new(config: VadConfig) -> Self {
        Self {
            config,
            speaking: false,
            last_voiced: None,
        }
    }

    /// Feeds one measurement; returns the speaking state after the update.
    pub fn update(&mut self, rms: f32, zcr: f32, now: Instant) -> bool {
        let voiced = rms >= self.config.rms_threshold && zcr >= self.config.zcr_threshold;
        if voiced {
            self.last_voiced = Some(now);
            if !self.speaking {
                self.speaking = true;
            }
        } else if self.speaking {
            match self.last_voiced {
                Some(t) if now.duration_since(t) > self.config.hangover => {
                    self.speaking = false;
                }
                // Still inside the hangover grace period: no transition.
                _ => {}
            }
        }
        self.speaking
    }

    pub fn is_speaking(&self) -> bool {
        self.speaking
    }

    /// When the last voiced sample was observed, if any.
    pub fn last_voiced(&self) -> Option<Instant> {
        self.last_voiced
    }

    /// Clears all state, as when a capture stream restarts.
    pub fn reset(&mut self) {
        self.speaking = false;
        self.last_voiced = None;
    }
}

impl Default for VoiceActivityDetector {
    fn default() -> Self {
        Self::new(VadConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detector(hangover_ms: u64) -> VoiceActivityDetector {
        VoiceActivityDetector::new(VadConfig {
            rms_threshold: 0.02,
            zcr_threshold: 0.02,
            hangover: Duration::from_millis(hangover_ms),
        })
    }

    #[test]
    fn joint_threshold_requires_both_metrics() {
        let t0 = Instant::now();
        let mut vad = detector(250);

        // High energy, low ZCR: rumble, not speech.
        assert!(!vad.update(0.5, 0.001, t0));
        // Low energy, high ZCR: hiss, not speech.
        assert!(!vad.update(0.001, 0.5, t0));
        // Both above threshold: speech.
        assert!(vad.update(0.1, 0.1, t0));
    }

    #[test]
    fn hangover_holds_speaking_through_short_silence() {
        let t0 = Instant::now();
        let mut vad = detector(250);

        // One voiced sample at t=0, silence thereafter.
        assert!(vad.update(0.1, 0.1, t0));
        assert!(vad.update(0.0, 0.0, t0 + Duration::from_millis(200)));
        assert!(!vad.update(0.0, 0.0, t0 + Duration::from_millis(260)));
        assert!(!vad.is_speaking());
    }

    #[test]
    fn continued_voice_keeps_extending_the_window() {
        let t0 = Instant::now();
        let mut vad = detector(250);

        // Voiced for 100ms, then silence.
        for ms in [0u64, 50, 100] {
            assert!(vad.update(0.1, 0.1, t0 + Duration::from_millis(ms)));
        }
        // 240ms past the last voiced sample: still inside hangover.
        assert!(vad.update(0.0, 0.0, t0 + Duration::from_millis(340)));
        // 260ms past: released.
        assert!(!vad.update(0.0, 0.0, t0 + Duration::from_millis(360)));
    }

    #[test]
    fn no_flicker_on_near_threshold_dropouts() {
        let t0 = Instant::now();
        let mut vad = detector(250);

        // Alternating voiced/silent samples 60ms apart never release.
        let mut t = t0;
        vad.update(0.1, 0.1, t);
        for i in 0..10 {
            t += Duration::from_millis(60);
            let speaking = if i % 2 == 0 {
                vad.update(0.0, 0.0, t)
            } else {
                vad.update(0.1, 0.1, t)
            };
            assert!(speaking, "dropout at step {} should not release", i);
        }
    }

    #[test]
    fn silence_never_starts_speaking() {
        let t0 = Instant::now();
        let mut vad = detector(250);
        for ms in 0..20u64 {
            assert!(!vad.update(0.0, 0.0, t0 + Duration::from_millis(ms * 50)));
        }
        assert!(vad.last_voiced().is_none());
    }

    #[test]
    fn reset_clears_state() {
        let t0 = Instant::now();
        let mut vad = detector(250);
        vad.update(0.1, 0.1, t0);
        assert!(vad.is_speaking());
        vad.reset();
        assert!(!vad.is_speaking());
        assert!(vad.last_voiced().is_none());
    }
}
