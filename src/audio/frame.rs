//! Per-frame analysis buffers.
//!
//! [`FrameSource`] owns one capture session: the [`InputStream`], the
//! sliding sample window and the [`SpectrumAnalyser`].  Every call to
//! [`FrameSource::capture`] drains whatever audio arrived since the last
//! frame and produces an [`AudioFrame`] holding two byte buffers:
//!
//! | Buffer | Length | Encoding |
//! |--------|--------|----------|
//! | time domain | `fft_size` | `128 + x·128`, so silence is `128` |
//! | frequency domain | `fft_size / 2` | dB between `min_decibels` and `max_decibels` mapped onto `0..=255` |
//!
//! The spectrum is Blackman-windowed and exponentially smoothed across
//! frames, so a single loud click decays over a few frames instead of
//! vanishing at once.

use std::f32::consts::PI;
use std::sync::Arc;

use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};

use crate::audio::buffer::RingBuffer;
use crate::audio::capture::InputStream;
use crate::config::AnalyserConfig;

/// Byte value of a zero-amplitude time-domain sample.
pub const SILENCE_BYTE: u8 = 128;

// ---------------------------------------------------------------------------
// AudioFrame
// ---------------------------------------------------------------------------

/// One analysis frame: time- and frequency-domain views of the newest
/// `fft_size` samples.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioFrame {
    /// Time-domain amplitudes, one byte per sample, `128` = zero.
    pub time_domain: Vec<u8>,
    /// Smoothed magnitude spectrum, one byte per bin.
    pub frequency_domain: Vec<u8>,
    /// Sample rate of the underlying audio in Hz.
    pub sample_rate: u32,
    /// Capture time in milliseconds since the analyzer's epoch.
    pub timestamp_ms: u64,
}

impl AudioFrame {
    /// Time-domain samples mapped back to `[-1.0, 1.0)` via `(x − 128) / 128`.
    pub fn normalized(&self) -> impl Iterator<Item = f32> + '_ {
        self.time_domain
            .iter()
            .map(|&b| (b as f32 - SILENCE_BYTE as f32) / SILENCE_BYTE as f32)
    }

    /// A frame of pure silence (`128` everywhere, empty spectrum).
    pub fn silent(fft_size: usize, sample_rate: u32, timestamp_ms: u64) -> Self {
        Self {
            time_domain: vec![SILENCE_BYTE; fft_size],
            frequency_domain: vec![0; fft_size / 2],
            sample_rate,
            timestamp_ms,
        }
    }
}

/// Quantise one `[-1, 1]` sample to its time-domain byte.
pub fn sample_to_byte(x: f32) -> u8 {
    (SILENCE_BYTE as f32 * (1.0 + x)).clamp(0.0, 255.0) as u8
}

// ---------------------------------------------------------------------------
// SpectrumAnalyser
// ---------------------------------------------------------------------------

/// Windowed FFT with temporal smoothing and dB-to-byte quantisation.
pub struct SpectrumAnalyser {
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    scratch: Vec<Complex<f32>>,
    /// Smoothed linear magnitudes from the previous frame.
    smoothed: Vec<f32>,
    smoothing: f32,
    min_decibels: f32,
    max_decibels: f32,
}

impl SpectrumAnalyser {
    pub fn new(config: &AnalyserConfig) -> Self {
        let size = config.effective_fft_size();
        let mut planner = FftPlanner::<f32>::new();
        Self {
            fft: planner.plan_fft_forward(size),
            window: blackman_window(size),
            scratch: vec![Complex::new(0.0, 0.0); size],
            smoothed: vec![0.0; size / 2],
            smoothing: config.smoothing.clamp(0.0, 1.0),
            min_decibels: config.min_decibels,
            max_decibels: config.max_decibels,
        }
    }

    pub fn fft_size(&self) -> usize {
        self.window.len()
    }

    /// Analyse exactly `fft_size` samples and write one byte per bin into
    /// `out`.
    pub fn process(&mut self, samples: &[f32], out: &mut Vec<u8>) {
        let size = self.fft_size();
        for (i, slot) in self.scratch.iter_mut().enumerate() {
            let x = samples.get(i).copied().unwrap_or(0.0);
            *slot = Complex::new(x * self.window[i], 0.0);
        }
        self.fft.process(&mut self.scratch);

        let tau = self.smoothing;
        let range = self.max_decibels - self.min_decibels;
        out.clear();
        for (k, prev) in self.smoothed.iter_mut().enumerate() {
            let magnitude = self.scratch[k].norm() / size as f32;
            let mut next = tau * *prev + (1.0 - tau) * magnitude;
            if !next.is_finite() {
                next = 0.0;
            }
            *prev = next;

            let byte = if next > 0.0 && range > 0.0 {
                let db = 20.0 * next.log10();
                (255.0 / range * (db - self.min_decibels)).clamp(0.0, 255.0) as u8
            } else {
                0
            };
            out.push(byte);
        }
    }

    /// Forget the smoothing history.
    pub fn reset(&mut self) {
        self.smoothed.iter_mut().for_each(|m| *m = 0.0);
    }
}

fn blackman_window(size: usize) -> Vec<f32> {
    const A0: f32 = 0.42;
    const A1: f32 = 0.5;
    const A2: f32 = 0.08;
    let n = size as f32;
    (0..size)
        .map(|i| {
            let x = i as f32 / n;
            A0 - A1 * (2.0 * PI * x).cos() + A2 * (4.0 * PI * x).cos()
        })
        .collect()
}

// ---------------------------------------------------------------------------
// FrameSource
// ---------------------------------------------------------------------------

/// An open capture session: stream, sample window and spectrum state.
pub struct FrameSource<S> {
    stream: S,
    window: RingBuffer<f32>,
    incoming: Vec<f32>,
    samples: Vec<f32>,
    spectrum: SpectrumAnalyser,
}

impl<S: InputStream> FrameSource<S> {
    /// Open a session over `stream` sized by `config`.
    pub fn new(stream: S, config: &AnalyserConfig) -> Self {
        let spectrum = SpectrumAnalyser::new(config);
        let size = spectrum.fft_size();
        Self {
            stream,
            window: RingBuffer::new(size),
            incoming: Vec::with_capacity(size),
            samples: Vec::with_capacity(size),
            spectrum,
        }
    }

    pub fn stream(&self) -> &S {
        &self.stream
    }

    pub fn stream_mut(&mut self) -> &mut S {
        &mut self.stream
    }

    pub fn fft_size(&self) -> usize {
        self.spectrum.fft_size()
    }

    pub fn sample_rate(&self) -> u32 {
        self.stream.sample_rate()
    }

    /// Pull pending audio and build the frame for `timestamp_ms`.
    pub fn capture(&mut self, timestamp_ms: u64) -> AudioFrame {
        self.incoming.clear();
        self.stream.pull(&mut self.incoming);
        self.window.push_slice(&self.incoming);
        self.window.window_into(&mut self.samples, 0.0);

        let time_domain = self.samples.iter().map(|&x| sample_to_byte(x)).collect();
        let mut frequency_domain = Vec::with_capacity(self.fft_size() / 2);
        self.spectrum.process(&self.samples, &mut frequency_domain);

        AudioFrame {
            time_domain,
            frequency_domain,
            sample_rate: self.sample_rate(),
            timestamp_ms,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
