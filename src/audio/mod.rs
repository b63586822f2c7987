//! Audio input: microphone capture, sample windowing and analysis frames.
//!
//! # Pipeline
//!
//! ```text
//! Microphone → cpal callback → AudioChunk (mpsc) → DeviceStream::pull
//!           → stereo_to_mono → RingBuffer (fft_size) → FrameSource::capture
//!           → AudioFrame { time domain bytes, frequency domain bytes }
//! ```
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use voice_quality::audio::{AudioCapture, FrameSource, InputStream};
//! use voice_quality::config::AnalyserConfig;
//!
//! let capture = AudioCapture::new().unwrap();
//! let mut stream = capture.open().unwrap(); // dropping it stops the device
//! stream.resume().unwrap();
//!
//! let mut frames = FrameSource::new(stream, &AnalyserConfig::default());
//! let frame = frames.capture(0);
//! println!("{} bins @ {} Hz", frame.frequency_domain.len(), frame.sample_rate);
//! ```

pub mod buffer;
pub mod capture;
pub mod frame;

pub use buffer::RingBuffer;
pub use capture::{
    stereo_to_mono, AudioCapture, AudioChunk, CaptureError, ChannelStream, DeviceStream, InputStream,
    StreamStatus, TrackState,
};
pub use frame::{sample_to_byte, AudioFrame, FrameSource, SpectrumAnalyser, SILENCE_BYTE};
