//! Fundamental-frequency estimate by time-domain autocorrelation.
//!
//! ## Algorithm
//!
//! Similarity at lag `L` is `1 − mean(|a[i] − a[i+L]|)` over the first half
//! of the frame (an inverted average magnitude difference function).  Lags
//! are scanned upward from half the 400 Hz period to the 60 Hz period.  The
//! first rising stretch that climbs above [`MIN_CORRELATION`] is followed to
//! its crest; the crest lag is the period.
//!
//! The scan starts below the 400 Hz period so that a tone whose crest sits
//! just under it is seen and rejected, instead of being reported an octave
//! down from its second crest.  The cost is bounded by
//! `(max_lag − min_lag / 2) × frame_len / 2` per frame.

use crate::audio::AudioFrame;
use crate::features::volume::rms;

/// Lowest accepted fundamental in Hz.
pub const MIN_PITCH_HZ: f32 = 60.0;
/// Highest accepted fundamental in Hz.
pub const MAX_PITCH_HZ: f32 = 400.0;
/// Frames quieter than this normalised RMS are not analysed.
pub const MIN_PITCH_RMS: f32 = 0.005;
/// Crest similarity required to call a frame voiced.
pub const MIN_CORRELATION: f32 = 0.4;

/// Inclusive lag range searched for a frame of `frame_len` samples.
///
/// Returns `None` when the range is empty.
pub fn lag_range(sample_rate: u32, frame_len: usize) -> Option<(usize, usize)> {
    let rate = sample_rate as f32;
    let min_lag = (rate / MAX_PITCH_HZ) as usize;
    let max_lag = (frame_len / 2).min((rate / MIN_PITCH_HZ) as usize);
    (min_lag >= 1 && min_lag <= max_lag).then_some((min_lag, max_lag))
}

/// Fundamental frequency in Hz, or `0.0` when nothing in `[60, 400]` Hz was
/// found.
pub fn pitch(frame: &AudioFrame) -> f32 {
    if rms(frame) < MIN_PITCH_RMS {
        return 0.0;
    }
    let samples: Vec<f32> = frame.normalized().collect();
    let Some((min_lag, max_lag)) = lag_range(frame.sample_rate, samples.len()) else {
        return 0.0;
    };

    let half = samples.len() / 2;
    let similarity = |lag: usize| -> f32 {
        let diff: f32 = samples[..half]
            .iter()
            .zip(&samples[lag..lag + half])
            .map(|(a, b)| (a - b).abs())
            .sum();
        1.0 - diff / half as f32
    };

    let first = (min_lag / 2).max(1);
    let mut best_lag = 0usize;
    let mut best_corr = 0.0f32;
    let mut previous = similarity(first - 1);

    for lag in first..=max_lag {
        let corr = similarity(lag);
        if corr > previous && corr > MIN_CORRELATION {
            if corr > best_corr {
                best_corr = corr;
                best_lag = lag;
            }
        } else if best_lag > 0 {
            // past the first crest
            break;
        }
        previous = corr;
    }

    // A crest shorter than the 400 Hz period is a higher tone.
    if best_lag < min_lag || best_corr < MIN_CORRELATION {
        return 0.0;
    }

    // `min_lag` is floored, so a crest there can land a fraction above 400 Hz.
    let hz = (frame.sample_rate as f32 / best_lag as f32).min(MAX_PITCH_HZ);
    if hz >= MIN_PITCH_HZ {
        hz
    } else {
        0.0
    }
}
