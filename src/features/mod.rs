//! Per-frame voice features: pitch, volume, clarity and pace.
//!
//! # Pipeline
//!
//! ```text
//! AudioFrame ─┬─ time domain ──▶ volume ──(> gate?)──┬─▶ pitch
//!             │                                      ├─▶ pace
//!             └─ frequency domain ───────────────────┴─▶ clarity
//! ```
//!
//! Every extractor is a pure function of one [`AudioFrame`]: no state, no
//! allocation beyond a scratch vector, and `0` instead of NaN or infinity
//! for degenerate input.  [`FrameMetrics::extract`] runs all four and skips
//! the expensive ones when the frame is too quiet to be speech.

pub mod clarity;
pub mod pace;
pub mod pitch;
pub mod volume;

use serde::Serialize;

use crate::audio::AudioFrame;

pub use clarity::clarity;
pub use pace::pace;
pub use pitch::pitch;
pub use volume::volume;

// ---------------------------------------------------------------------------
// FrameMetrics
// ---------------------------------------------------------------------------

/// The four metrics computed from one frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameMetrics {
    /// Fundamental frequency in Hz, `0` when undetected.
    pub pitch_hz: f32,
    /// Loudness, `0..=100`.
    pub volume: f32,
    /// Spectral clarity, `0..=100`.
    pub clarity: f32,
    /// Speaking pace, `0..=100`.
    pub pace: f32,
}

impl FrameMetrics {
    /// Extract all metrics from `frame`.
    ///
    /// Pitch, clarity and pace are only computed when the volume exceeds
    /// `volume_gate`; below it they are `0`.
    pub fn extract(frame: &AudioFrame, volume_gate: f32) -> Self {
        let volume = volume(frame);
        if volume <= volume_gate {
            return Self {
                volume,
                ..Self::default()
            };
        }
        Self {
            pitch_hz: pitch(frame),
            volume,
            clarity: clarity(frame),
            pace: pace(frame),
        }
    }

    /// `true` when the frame carried enough audio to be worth keeping.
    pub fn is_meaningful(&self, volume_gate: f32) -> bool {
        self.volume > volume_gate
    }
}

// ---------------------------------------------------------------------------
// Test frames
// ---------------------------------------------------------------------------


#[cfg(test)]
mod tests {
    use super::test_frames::*;
    use super::*;

    #[test]
    fn quiet_frame_skips_other_metrics() {
        let mut frame = tone_frame(200.0, 48_000, 0.012);
        frame.frequency_domain = vec![120; 1024];
        let m = FrameMetrics::extract(&frame, 8.0);
        assert!(m.volume > 0.0 && m.volume <= 8.0, "volume = {}", m.volume);
        assert_eq!(m.pitch_hz, 0.0);
        assert_eq!(m.clarity, 0.0);
        assert_eq!(m.pace, 0.0);
        assert!(!m.is_meaningful(8.0));
    }

    #[test]
    fn speech_level_frame_computes_everything() {
        let mut frame = tone_frame(175.0, 44_100, 0.5);
        frame.frequency_domain = vec![40; 1024];
        frame.frequency_domain[8] = 180;
        let m = FrameMetrics::extract(&frame, 8.0);
        assert!(m.is_meaningful(8.0));
        assert!((m.pitch_hz - 175.0).abs() < 0.5, "pitch = {}", m.pitch_hz);
        assert!(m.clarity > 0.0);
        assert!(m.pace > 0.0);
    }

    #[test]
    fn silence_is_all_zero() {
        assert_eq!(FrameMetrics::extract(&constant_frame(128), 8.0), FrameMetrics::default());
    }
}
