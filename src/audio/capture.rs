//! Microphone capture via `cpal`, plus the [`InputStream`] seam the analyzer
//! consumes.
//!
//! [`AudioCapture`] wraps the cpal host/device lifecycle.
//! [`AudioCapture::open`] builds an input stream **without** playing it and
//! returns a [`DeviceStream`]; the analyzer resumes it once when it starts a
//! session.  Dropping the [`DeviceStream`] stops the underlying cpal stream.
//!
//! [`ChannelStream`] is the same stream shape without a device behind it:
//! any collaborator that already owns PCM audio can feed [`AudioChunk`]s
//! through an mpsc channel.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use thiserror::Error;

// ---------------------------------------------------------------------------
// AudioChunk
// ---------------------------------------------------------------------------

/// A single buffer of raw audio as delivered by the cpal callback.
///
/// Samples are interleaved `f32` in the range `[-1.0, 1.0]`.
#[derive(Debug, Clone)]
pub struct AudioChunk {
    /// Interleaved PCM samples in `[-1.0, 1.0]`.
    pub samples: Vec<f32>,
    /// Sample rate of this chunk in Hz (e.g. 44100, 48000).
    pub sample_rate: u32,
    /// Number of interleaved channels (1 = mono, 2 = stereo, …).
    pub channels: u16,
}

// ---------------------------------------------------------------------------
// CaptureError
// ---------------------------------------------------------------------------

/// Errors that can occur while setting up or running the audio capture.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("no input device found on the default audio host")]
    NoDevice,

    #[error("input device {0:?} not found")]
    DeviceNotFound(String),

    #[error("failed to enumerate input devices: {0}")]
    Devices(#[from] cpal::DevicesError),

    #[error("failed to query default input config: {0}")]
    DefaultConfig(#[from] cpal::DefaultStreamConfigError),

    #[error("failed to build input stream: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error("failed to start audio stream: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),

    #[error("stream resume rejected: {0}")]
    Resume(String),
}

// ---------------------------------------------------------------------------
// InputStream
// ---------------------------------------------------------------------------

/// State of the audio track carried by an [`InputStream`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackState {
    /// The track is delivering audio.
    Live,
    /// The track has ended (device unplugged, producer dropped, …).
    Ended,
}

/// A live source of mono-convertible PCM audio.
///
/// No `Send` bound: cpal streams are not `Send` on every platform, so the
/// analyzer runs on a single thread.
pub trait InputStream {
    /// `false` once the stream as a whole has shut down.
    fn is_active(&self) -> bool;

    /// The stream's audio track, or `None` when it carries no audio.
    fn audio_track(&self) -> Option<TrackState>;

    /// Sample rate of the audio returned by [`pull`](Self::pull), in Hz.
    fn sample_rate(&self) -> u32;

    /// `true` while the stream exists but is not yet producing audio.
    fn is_suspended(&self) -> bool {
        false
    }

    /// Ask a suspended stream to start producing audio.
    fn resume(&mut self) -> Result<(), CaptureError> {
        Ok(())
    }

    /// Append every mono sample that arrived since the last call to `out`
    /// and return how many were appended.  Never blocks.
    fn pull(&mut self, out: &mut Vec<f32>) -> usize;
}

// ---------------------------------------------------------------------------
// StreamStatus
// ---------------------------------------------------------------------------

/// Liveness flags shared between a stream and whatever produces its audio.
#[derive(Debug)]
pub struct StreamStatus {
    active: AtomicBool,
    live: AtomicBool,
}

impl StreamStatus {
    fn new() -> Self {
        Self {
            active: AtomicBool::new(true),
            live: AtomicBool::new(true),
        }
    }

    /// Mark the audio track as ended; the stream itself stays active.
    pub fn end_track(&self) {
        self.live.store(false, Ordering::Release);
    }

    /// Mark the whole stream as shut down.
    pub fn deactivate(&self) {
        self.active.store(false, Ordering::Release);
        self.end_track();
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::Acquire)
    }
}

// ---------------------------------------------------------------------------
// ChannelStream
// ---------------------------------------------------------------------------

/// [`InputStream`] fed from an mpsc channel of [`AudioChunk`]s.
///
/// ```rust
/// use std::sync::mpsc;
/// use voice_quality::audio::{AudioChunk, ChannelStream, InputStream};
///
/// let (tx, rx) = mpsc::channel();
/// let mut stream = ChannelStream::new(rx, 48_000, 2);
/// tx.send(AudioChunk { samples: vec![0.5, -0.5, 0.2, 0.4], sample_rate: 48_000, channels: 2 })
///     .unwrap();
///
/// let mut mono = Vec::new();
/// assert_eq!(stream.pull(&mut mono), 2);
/// assert!((mono[1] - 0.3).abs() < 1e-6);
/// ```
pub struct ChannelStream {
    rx: mpsc::Receiver<AudioChunk>,
    sample_rate: u32,
    channels: u16,
    status: Arc<StreamStatus>,
}

impl ChannelStream {
    /// Wrap `rx`.  A `channels` of `0` describes a stream with no audio
    /// track.
    pub fn new(rx: mpsc::Receiver<AudioChunk>, sample_rate: u32, channels: u16) -> Self {
        Self {
            rx,
            sample_rate,
            channels,
            status: Arc::new(StreamStatus::new()),
        }
    }

    /// Handle to the liveness flags, for the producing side.
    pub fn status(&self) -> Arc<StreamStatus> {
        Arc::clone(&self.status)
    }
}

impl InputStream for ChannelStream {
    fn is_active(&self) -> bool {
        self.status.is_active()
    }

    fn audio_track(&self) -> Option<TrackState> {
        if self.channels == 0 {
            return None;
        }
        Some(if self.status.is_live() {
            TrackState::Live
        } else {
            TrackState::Ended
        })
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn pull(&mut self, out: &mut Vec<f32>) -> usize {
        let before = out.len();
        loop {
            match self.rx.try_recv() {
                Ok(chunk) => out.extend(stereo_to_mono(&chunk.samples, chunk.channels)),
                Err(mpsc::TryRecvError::Empty) => break,
                Err(mpsc::TryRecvError::Disconnected) => {
                    if self.status.is_live() {
                        log::debug!("capture: producer disconnected, track ended");
                    }
                    self.status.end_track();
                    break;
                }
            }
        }
        out.len() - before
    }
}

// ---------------------------------------------------------------------------
// DeviceStream
// ---------------------------------------------------------------------------

/// A cpal input stream plus the channel its callback feeds.
///
/// Starts suspended: the stream is built but not playing until
/// [`resume`](InputStream::resume) is called.
pub struct DeviceStream {
    stream: cpal::Stream,
    inner: ChannelStream,
    playing: bool,
}

impl InputStream for DeviceStream {
    fn is_active(&self) -> bool {
        self.inner.is_active()
    }

    fn audio_track(&self) -> Option<TrackState> {
        self.inner.audio_track()
    }

    fn sample_rate(&self) -> u32 {
        self.inner.sample_rate()
    }

    fn is_suspended(&self) -> bool {
        !self.playing
    }

    fn resume(&mut self) -> Result<(), CaptureError> {
        self.stream.play()?;
        self.playing = true;
        Ok(())
    }

    fn pull(&mut self, out: &mut Vec<f32>) -> usize {
        self.inner.pull(out)
    }
}

impl Drop for DeviceStream {
    fn drop(&mut self) {
        if self.playing {
            pause_logged(&self.stream, "on drop");
        }
        self.inner.status.deactivate();
    }
}

/// Pause `stream`, logging a backend refusal instead of failing.
fn pause_logged(stream: &impl StreamTrait, when: &str) -> bool {
    match stream.pause() {
        Ok(()) => true,
        Err(e) => {
            log::debug!("capture: pause {when} failed: {e}");
            false
        }
    }
}

// ---------------------------------------------------------------------------
// AudioCapture
// ---------------------------------------------------------------------------

/// Microphone capture device wrapper built on top of `cpal`.
///
/// # Example
///
/// ```rust,no_run
/// use voice_quality::audio::{AudioCapture, InputStream};
///
/// let capture = AudioCapture::new().unwrap();
/// let mut stream = capture.open().unwrap();
/// assert!(stream.is_suspended());
/// stream.resume().unwrap();
/// ```
pub struct AudioCapture {
    device: cpal::Device,
    config: cpal::StreamConfig,
    /// Native sample rate reported by the device (Hz).
    sample_rate: u32,
    /// Number of interleaved channels reported by the device.
    channels: u16,
}

impl AudioCapture {
    /// Create a new [`AudioCapture`] using the system default input device.
    ///
    /// # Errors
    ///
    /// Returns [`CaptureError::NoDevice`] when no input device is available,
    /// or [`CaptureError::DefaultConfig`] when the device cannot report a
    /// default stream configuration.
    pub fn new() -> Result<Self, CaptureError> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or(CaptureError::NoDevice)?;
        Self::from_device(device)
    }

    /// Use the input device called `name`, or the default one for `None`.
    pub fn with_device(name: Option<&str>) -> Result<Self, CaptureError> {
        let Some(name) = name else {
            return Self::new();
        };
        let host = cpal::default_host();
        let device = host
            .input_devices()?
            .find(|d| d.name().map(|n| n == name).unwrap_or(false))
            .ok_or_else(|| CaptureError::DeviceNotFound(name.to_string()))?;
        Self::from_device(device)
    }

    fn from_device(device: cpal::Device) -> Result<Self, CaptureError> {
        let supported = device.default_input_config()?;

        let channels = supported.channels();
        let sample_rate = supported.sample_rate().0;
        let config: cpal::StreamConfig = supported.into();

        Ok(Self {
            device,
            config,
            sample_rate,
            channels,
        })
    }

    /// Build the input stream in a suspended state.
    ///
    /// The cpal callback runs on a dedicated audio thread and forwards each
    /// hardware buffer as an [`AudioChunk`].  Send errors (stream dropped)
    /// are ignored so the audio thread never panics; device errors end the
    /// stream's audio track.
    ///
    /// # Errors
    ///
    /// Returns [`CaptureError::BuildStream`] if the platform rejects the
    /// stream configuration.
    pub fn open(&self) -> Result<DeviceStream, CaptureError> {
        let sample_rate = self.sample_rate;
        let channels = self.channels;
        let (tx, rx) = mpsc::channel::<AudioChunk>();
        let inner = ChannelStream::new(rx, sample_rate, channels);
        let status = inner.status();

        let stream = self.device.build_input_stream(
            &self.config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                let chunk = AudioChunk {
                    samples: data.to_vec(),
                    sample_rate,
                    channels,
                };
                let _ = tx.send(chunk);
            },
            move |err: cpal::StreamError| {
                log::error!("cpal stream error: {err}");
                if matches!(err, cpal::StreamError::DeviceNotAvailable) {
                    status.end_track();
                }
            },
            None,
        )?;

        // Some backends start streams immediately on build.
        pause_logged(&stream, "after build");

        Ok(DeviceStream {
            stream,
            inner,
            playing: false,
        })
    }

    /// Native sample rate of the capture stream in Hz.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Number of interleaved channels in each [`AudioChunk`].
    pub fn channels(&self) -> u16 {
        self.channels
    }
}

// ---------------------------------------------------------------------------
// stereo_to_mono
// ---------------------------------------------------------------------------

/// Mix interleaved multi-channel audio down to mono by averaging all channels.
///
/// * `channels == 1` returns the input as an owned `Vec`.
/// * `channels == 0` returns an empty vector.
///
/// ```rust
/// use voice_quality::audio::stereo_to_mono;
///
/// let stereo = vec![0.5_f32, -0.5, 0.2, -0.2]; // L R L R
/// let mono = stereo_to_mono(&stereo, 2);
/// assert_eq!(mono.len(), 2);
/// assert!(mono[0].abs() < 1e-6);
/// ```
pub fn stereo_to_mono(samples: &[f32], channels: u16) -> Vec<f32> {
    match channels {
        0 => Vec::new(),
        1 => samples.to_vec(),
        n => {
            let n = n as usize;
            samples
                .chunks_exact(n)
                .map(|frame| frame.iter().sum::<f32>() / n as f32)
                .collect()
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn audio_chunk_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<AudioChunk>();
        assert_send::<ChannelStream>();
    }

    #[test]
    fn channel_stream_pulls_all_pending_chunks() {
        let (tx, rx) = mpsc::channel();
        let mut stream = ChannelStream::new(rx, 16_000, 1);
        for _ in 0..3 {
            tx.send(AudioChunk {
                samples: vec![0.1; 100],
                sample_rate: 16_000,
                channels: 1,
            })
            .unwrap();
        }

        let mut out = Vec::new();
        assert_eq!(stream.pull(&mut out), 300);
        assert_eq!(stream.pull(&mut out), 0);
        assert_eq!(out.len(), 300);
    }

    #[test]
    fn channel_stream_track_ends_when_producer_drops() {
        let (tx, rx) = mpsc::channel::<AudioChunk>();
        let mut stream = ChannelStream::new(rx, 16_000, 1);
        assert_eq!(stream.audio_track(), Some(TrackState::Live));

        drop(tx);
        stream.pull(&mut Vec::new());

        assert_eq!(stream.audio_track(), Some(TrackState::Ended));
        assert!(stream.is_active());
    }

    #[test]
    fn zero_channels_means_no_audio_track() {
        let (_tx, rx) = mpsc::channel::<AudioChunk>();
        let stream = ChannelStream::new(rx, 16_000, 0);
        assert_eq!(stream.audio_track(), None);
    }

    #[test]
    fn status_deactivate_ends_track_too() {
        let (_tx, rx) = mpsc::channel::<AudioChunk>();
        let stream = ChannelStream::new(rx, 16_000, 1);
        stream.status().deactivate();
        assert!(!stream.is_active());
        assert_eq!(stream.audio_track(), Some(TrackState::Ended));
    }

    #[test]
    fn channel_stream_is_never_suspended() {
        let (_tx, rx) = mpsc::channel::<AudioChunk>();
        let mut stream = ChannelStream::new(rx, 16_000, 1);
        assert!(!stream.is_suspended());
        assert!(stream.resume().is_ok());
    }

    struct RefusingStream {
        pauses: std::cell::Cell<u32>,
    }

    impl StreamTrait for RefusingStream {
        fn play(&self) -> Result<(), cpal::PlayStreamError> {
            Ok(())
        }

        fn pause(&self) -> Result<(), cpal::PauseStreamError> {
            self.pauses.set(self.pauses.get() + 1);
            Err(cpal::PauseStreamError::DeviceNotAvailable)
        }
    }

    #[test]
    fn refused_pause_is_reported_not_raised() {
        let stream = RefusingStream {
            pauses: std::cell::Cell::new(0),
        };
        assert!(!pause_logged(&stream, "after build"));
        assert_eq!(stream.pauses.get(), 1);
    }

    #[test]
    fn mono_passthrough_and_empty_channels() {
        assert_eq!(stereo_to_mono(&[0.1, 0.2], 1), vec![0.1, 0.2]);
        assert!(stereo_to_mono(&[0.1, 0.2], 0).is_empty());
    }
}
