//! Spectral clarity: how strongly a few bins dominate the low speech band.
//!
//! Clear, resonant speech concentrates energy in a handful of harmonics, so
//! the peak stands well above the band average.  Mumbled or noisy speech is
//! flat.  The raw score is the capped peak-to-average ratio, damped when the
//! band's energy is widely spread, then lifted through a `x^0.7` curve so
//! mid-range voices are not punished too hard.

use std::ops::Range;

use crate::audio::AudioFrame;

/// Frequency bins inspected (about 47–2300 Hz at 48 kHz / 2048-point FFT).
pub const CLARITY_BINS: Range<usize> = 2..100;
/// Peak-to-average ratios above this count as perfectly peaked.
pub const MAX_PEAK_RATIO: f32 = 5.0;
/// Lower bound of the spread factor.
pub const MIN_SPREAD_FACTOR: f32 = 0.5;
/// Exponent of the compression curve.
pub const COMPRESSION: f32 = 0.7;

/// Clarity in `[0, 100]`; `0` when the band holds no energy.
pub fn clarity(frame: &AudioFrame) -> f32 {
    let len = frame.frequency_domain.len();
    let bins = &frame.frequency_domain[CLARITY_BINS.start.min(len)..CLARITY_BINS.end.min(len)];
    if bins.is_empty() {
        return 0.0;
    }

    let n = bins.len() as f32;
    let total: f32 = bins.iter().map(|&b| b as f32).sum();
    if total <= 0.0 {
        return 0.0;
    }
    let average = total / n;
    let peak = bins.iter().copied().max().unwrap_or(0) as f32;
    let variance = bins
        .iter()
        .map(|&b| {
            let d = b as f32 - average;
            d * d
        })
        .sum::<f32>()
        / n;

    score(peak / average, variance)
}

/// Clarity score from a peak-to-average ratio and the band's energy
/// variance.
///
/// Non-decreasing in `peak_ratio` for a fixed `variance`.
pub fn score(peak_ratio: f32, variance: f32) -> f32 {
    if !peak_ratio.is_finite() || peak_ratio <= 0.0 {
        return 0.0;
    }
    let ratio = peak_ratio.min(MAX_PEAK_RATIO);
    let spread = (1.0 - variance / 100.0).max(MIN_SPREAD_FACTOR);
    let raw = (ratio / MAX_PEAK_RATIO) * 100.0 * spread;
    (100.0 * (raw / 100.0).powf(COMPRESSION)).clamp(0.0, 100.0)
}
