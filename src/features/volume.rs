//! Loudness from time-domain RMS.
//!
//! The normalised RMS is scaled by [`VOLUME_GAIN`] so ordinary speech lands
//! in the middle of `0..=100`; anything under [`VOLUME_FLOOR`] is treated as
//! room noise and reported as exactly `0`.

use crate::audio::AudioFrame;

/// Multiplier from normalised RMS to the 0–100 volume scale.
pub const VOLUME_GAIN: f32 = 500.0;

/// Scaled volumes below this are reported as `0`.
pub const VOLUME_FLOOR: f32 = 3.0;

/// Root-mean-square of the frame's normalised samples (`(x − 128) / 128`).
///
/// Returns `0.0` for an empty frame.
pub fn rms(frame: &AudioFrame) -> f32 {
    if frame.time_domain.is_empty() {
        return 0.0;
    }
    let mean_sq = frame.normalized().map(|s| s * s).sum::<f32>() / frame.time_domain.len() as f32;
    mean_sq.sqrt()
}

/// Volume in `[0, 100]`.
///
/// ```rust
/// use voice_quality::audio::AudioFrame;
/// use voice_quality::features::volume;
///
/// let frame = AudioFrame::silent(2048, 48_000, 0);
/// assert_eq!(volume(&frame), 0.0);
/// ```
pub fn volume(frame: &AudioFrame) -> f32 {
    let scaled = rms(frame) * VOLUME_GAIN;
    if scaled < VOLUME_FLOOR {
        return 0.0;
    }
    scaled.clamp(0.0, 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::test_frames::{constant_frame, tone_frame};

    #[test]
    fn silence_is_zero() {
        assert_eq!(volume(&constant_frame(128)), 0.0);
    }

    #[test]
    fn below_floor_is_gated_to_zero() {
        // |129 − 128| / 128 × 500 ≈ 3.9 passes; a 0.004-amplitude wobble does not.
        let quiet = tone_frame(200.0, 48_000, 0.004);
        assert!(rms(&quiet) * VOLUME_GAIN < VOLUME_FLOOR);
        assert_eq!(volume(&quiet), 0.0);
    }

    #[test]
    fn just_above_floor_is_reported() {
        let frame = constant_frame(129);
        let v = volume(&frame);
        assert!((v - 500.0 / 128.0).abs() < 1e-3, "volume = {v}");
    }

    #[test]
    fn loud_signal_is_clamped_to_hundred() {
        assert_eq!(volume(&constant_frame(255)), 100.0);
        assert_eq!(volume(&constant_frame(0)), 100.0);
    }

    #[test]
    fn moderate_tone_is_in_range() {
        // amplitude 0.05 → RMS ≈ 0.035 → ≈ 17.7
        let v = volume(&tone_frame(220.0, 48_000, 0.05));
        assert!(v > 15.0 && v < 20.0, "volume = {v}");
    }

    #[test]
    fn empty_frame_is_zero() {
        let mut frame = constant_frame(200);
        frame.time_domain.clear();
        assert_eq!(volume(&frame), 0.0);
    }
}
