//! Speaking pace from the share of voice-active samples in a frame.
//!
//! A sample is active when it sits more than [`ACTIVITY_THRESHOLD`] byte
//! steps away from the silence line.  Continuous speech keeps about half of
//! a frame active, which maps to the middle of the scale.

use crate::audio::{AudioFrame, SILENCE_BYTE};

/// Minimum `|x − 128|` for a sample to count as voice activity.
pub const ACTIVITY_THRESHOLD: u8 = 10;
/// Multiplier from active fraction to the 0–100 pace scale.
pub const PACE_GAIN: f32 = 200.0;

/// Fraction of samples in `[0, 1]` that exceed the activity threshold.
pub fn activity_ratio(frame: &AudioFrame) -> f32 {
    if frame.time_domain.is_empty() {
        return 0.0;
    }
    let active = frame
        .time_domain
        .iter()
        .filter(|&&b| b.abs_diff(SILENCE_BYTE) > ACTIVITY_THRESHOLD)
        .count();
    active as f32 / frame.time_domain.len() as f32
}

/// Pace in `[0, 100]`.
pub fn pace(frame: &AudioFrame) -> f32 {
    (activity_ratio(frame) * PACE_GAIN).clamp(0.0, 100.0)
}
