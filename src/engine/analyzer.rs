//! [`VoiceAnalyzer`]: the lifecycle controller tying a device stream to the
//! feature extractors and the sample collector.
//!
//! The analyzer itself is synchronous: [`tick`](VoiceAnalyzer::tick) turns
//! one frame into metrics.  Scheduling lives in [`super::runner`].

use std::time::Instant;

use thiserror::Error;

use crate::analysis::{Admission, LiveSummary, MetricSample, ReportOutcome, SampleCollector};
use crate::audio::{FrameSource, InputStream, TrackState};
use crate::config::{AnalyserConfig, AppConfig, CollectorConfig};
use crate::features::FrameMetrics;

use super::runner::{cancel_pair, CancelHandle, CancelToken};
use super::state::{GateState, LifecycleState};

// ---------------------------------------------------------------------------
// StartError
// ---------------------------------------------------------------------------

/// Why a stream was refused by [`VoiceAnalyzer::start`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StartError {
    #[error("stream is not active")]
    InactiveStream,

    #[error("stream has no audio track")]
    NoAudioTrack,

    #[error("audio track is not live")]
    TrackNotLive,

    #[error("a session is already running")]
    AlreadyAnalyzing,
}

/// Check that `stream` can carry a session.
pub fn validate_stream<S: InputStream>(stream: &S) -> Result<(), StartError> {
    if !stream.is_active() {
        return Err(StartError::InactiveStream);
    }
    match stream.audio_track() {
        None => Err(StartError::NoAudioTrack),
        Some(TrackState::Ended) => Err(StartError::TrackNotLive),
        Some(TrackState::Live) => Ok(()),
    }
}

// ---------------------------------------------------------------------------
// VoiceAnalyzer
// ---------------------------------------------------------------------------

/// Owns the active session (if any), the collector and the lifecycle state.
///
/// Every session start and every stop bumps a generation counter.  Async
/// callers remember the generation they started under and drop their work
/// when it no longer matches, so a stop always wins over a late acquisition
/// or a frame loop that has not noticed yet.
pub struct VoiceAnalyzer<S> {
    analyser: AnalyserConfig,
    state: LifecycleState,
    session: Option<FrameSource<S>>,
    collector: SampleCollector,
    generation: u64,
    /// Fired by `stop()` to end a pending device wait.
    acquisition: Option<CancelHandle>,
    epoch: Instant,
    frames_processed: u64,
}

impl<S: InputStream> VoiceAnalyzer<S> {
    pub fn new(analyser: AnalyserConfig, collector: CollectorConfig) -> Self {
        Self::with_epoch(analyser, collector, Instant::now())
    }

    /// Like [`new`](Self::new) but with an explicit origin for sample
    /// timestamps.
    pub fn with_epoch(analyser: AnalyserConfig, collector: CollectorConfig, epoch: Instant) -> Self {
        Self {
            analyser,
            state: LifecycleState::Idle,
            session: None,
            collector: SampleCollector::new(collector),
            generation: 0,
            acquisition: None,
            epoch,
            frames_processed: 0,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.analyser.clone(), config.collector.clone())
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn gate(&self) -> GateState {
        GateState {
            device_connected: self.session.is_some(),
            collecting: self.collector.is_collecting(),
        }
    }

    /// Enter `Acquiring` and return the generation the acquisition belongs to.
    pub fn begin_acquiring(&mut self) -> Result<u64, StartError> {
        if !self.state.can_start() {
            return Err(StartError::AlreadyAnalyzing);
        }
        self.generation += 1;
        self.state = LifecycleState::Acquiring;
        let (handle, _) = cancel_pair();
        if let Some(previous) = self.acquisition.replace(handle) {
            previous.cancel();
        }
        log::debug!("analyzer: acquiring device (generation {})", self.generation);
        Ok(self.generation)
    }

    /// Token that fires when the current acquisition is stopped or
    /// superseded.  Never fires when nothing is being acquired.
    pub fn acquisition_token(&self) -> CancelToken {
        self.acquisition
            .as_ref()
            .map_or_else(CancelToken::never, CancelHandle::token)
    }

    /// Leave `Acquiring` after the device never became ready.
    pub fn abandon_acquiring(&mut self) {
        self.acquisition = None;
        if self.state == LifecycleState::Acquiring {
            log::info!("analyzer: device acquisition abandoned");
            self.state = LifecycleState::Idle;
        }
    }

    /// Open a session on `stream`.
    ///
    /// A rejected stream leaves the state untouched.  A suspended stream is
    /// resumed once; a failed resume is logged and the session starts anyway.
    pub fn start(&mut self, stream: S) -> Result<(), StartError> {
        if !self.state.can_start() {
            log::warn!("analyzer: start ignored, already analyzing");
            return Err(StartError::AlreadyAnalyzing);
        }
        if let Err(e) = validate_stream(&stream) {
            log::warn!("analyzer: stream rejected: {e}");
            return Err(e);
        }

        let mut source = FrameSource::new(stream, &self.analyser);
        if source.stream().is_suspended() {
            match source.stream_mut().resume() {
                Ok(()) => log::debug!("analyzer: stream resumed"),
                Err(e) => log::warn!("analyzer: resume failed, continuing: {e}"),
            }
        }

        self.generation += 1;
        self.acquisition = None;
        self.session = Some(source);
        self.state = LifecycleState::Analyzing;
        log::info!(
            "analyzer: session started ({} Hz, fft {}, generation {})",
            self.session.as_ref().map_or(0, |s| s.sample_rate()),
            self.analyser.effective_fft_size(),
            self.generation
        );
        Ok(())
    }

    /// Close the session and release the stream.  Safe to call any number of
    /// times; history is kept.
    pub fn stop(&mut self) {
        if self.state != LifecycleState::Stopped {
            self.generation += 1;
            log::info!(
                "analyzer: stopped from {} after {} frames",
                self.state.label(),
                self.frames_processed
            );
        }
        if let Some(acquisition) = self.acquisition.take() {
            acquisition.cancel();
        }
        self.session = None;
        self.collector.reset_current();
        self.state = LifecycleState::Stopped;
    }

    /// Analyse one frame captured at `now`.
    ///
    /// Returns `None` when there is no session.
    pub fn tick(&mut self, now: Instant) -> Option<Admission> {
        let timestamp_ms = now.saturating_duration_since(self.epoch).as_millis() as u64;
        self.tick_at(timestamp_ms)
    }

    /// [`tick`](Self::tick) with a timestamp already relative to the epoch.
    pub fn tick_at(&mut self, timestamp_ms: u64) -> Option<Admission> {
        if self.state != LifecycleState::Analyzing {
            return None;
        }
        let source = self.session.as_mut()?;
        let frame = source.capture(timestamp_ms);
        let metrics = FrameMetrics::extract(&frame, self.collector.config().volume_gate);
        self.frames_processed += 1;

        let admission = self.collector.record(metrics, timestamp_ms);
        if admission == Admission::Appended {
            log::trace!("analyzer: sample {} at {timestamp_ms} ms", self.collector.len());
        }
        Some(admission)
    }

    /// Open or close the collection gate.  Independent of the device.
    pub fn set_collecting_samples(&mut self, collecting: bool) {
        self.collector.set_collecting(collecting);
    }

    pub fn is_collecting_samples(&self) -> bool {
        self.collector.is_collecting()
    }

    pub fn clear_history(&mut self) {
        self.collector.clear_history();
    }

    /// Clear the history the first time a given session id is seen.
    pub fn clear_for_session(&mut self, session_id: &str) -> bool {
        self.collector.clear_for_session(session_id)
    }

    pub fn current_metrics(&self) -> FrameMetrics {
        self.collector.current()
    }

    pub fn history(&self) -> Vec<MetricSample> {
        self.collector.snapshot()
    }

    pub fn live_summary(&self) -> LiveSummary {
        self.collector.live_summary()
    }

    /// Report over the full history.  Does not change any state.
    pub fn report(&self) -> ReportOutcome {
        self.collector.report()
    }

    pub fn frames_processed(&self) -> u64 {
        self.frames_processed
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::audio::CaptureError;

    /// Scripted stream producing a steady tone.
    pub(crate) struct MockStream {
        pub active: bool,
        pub track: Option<TrackState>,
        pub suspended: bool,
        pub resume_fails: bool,
        pub resumes: u32,
        pub amplitude: f32,
        phase: usize,
    }

    impl MockStream {
        pub fn live(amplitude: f32) -> Self {
            Self {
                active: true,
                track: Some(TrackState::Live),
                suspended: false,
                resume_fails: false,
                resumes: 0,
                amplitude,
                phase: 0,
            }
        }
    }

    impl InputStream for MockStream {
        fn is_active(&self) -> bool {
            self.active
        }

        fn audio_track(&self) -> Option<TrackState> {
            self.track
        }

        fn sample_rate(&self) -> u32 {
            48_000
        }

        fn is_suspended(&self) -> bool {
            self.suspended
        }

        fn resume(&mut self) -> Result<(), CaptureError> {
            self.resumes += 1;
            if self.resume_fails {
                return Err(CaptureError::Resume("not allowed".into()));
            }
            self.suspended = false;
            Ok(())
        }

        fn pull(&mut self, out: &mut Vec<f32>) -> usize {
            let n = 800;
            for _ in 0..n {
                let t = self.phase as f32 / 48_000.0;
                out.push(self.amplitude * (2.0 * std::f32::consts::PI * 175.0 * t).sin());
                self.phase += 1;
            }
            n
        }
    }

    fn analyzer() -> VoiceAnalyzer<MockStream> {
        VoiceAnalyzer::new(AnalyserConfig::default(), CollectorConfig::default())
    }

    #[test]
    fn starts_idle_without_session() {
        let mut a = analyzer();
        assert_eq!(a.state(), LifecycleState::Idle);
        assert_eq!(a.tick_at(0), None);
        assert_eq!(a.frames_processed(), 0);
    }

    #[test]
    fn start_then_stop_twice_ends_stopped() {
        let mut a = analyzer();
        a.start(MockStream::live(0.5)).unwrap();
        assert_eq!(a.state(), LifecycleState::Analyzing);
        assert!(a.gate().device_connected);

        a.stop();
        let generation = a.generation();
        a.stop();
        assert_eq!(a.state(), LifecycleState::Stopped);
        assert_eq!(a.generation(), generation);
        assert!(!a.gate().device_connected);
        assert_eq!(a.tick_at(100), None);
    }

    #[test]
    fn rejected_streams_leave_state_unchanged() {
        let mut a = analyzer();

        let mut inactive = MockStream::live(0.5);
        inactive.active = false;
        assert_eq!(a.start(inactive), Err(StartError::InactiveStream));

        let mut no_track = MockStream::live(0.5);
        no_track.track = None;
        assert_eq!(a.start(no_track), Err(StartError::NoAudioTrack));

        let mut ended = MockStream::live(0.5);
        ended.track = Some(TrackState::Ended);
        assert_eq!(a.start(ended), Err(StartError::TrackNotLive));

        assert_eq!(a.state(), LifecycleState::Idle);
        assert_eq!(a.generation(), 0);
    }

    #[test]
    fn second_start_is_refused() {
        let mut a = analyzer();
        a.start(MockStream::live(0.5)).unwrap();
        assert_eq!(a.start(MockStream::live(0.5)), Err(StartError::AlreadyAnalyzing));
        assert_eq!(a.state(), LifecycleState::Analyzing);
    }

    #[test]
    fn failed_resume_does_not_block_start() {
        let mut a = analyzer();
        let mut s = MockStream::live(0.5);
        s.suspended = true;
        s.resume_fails = true;
        a.start(s).unwrap();
        assert_eq!(a.state(), LifecycleState::Analyzing);
        assert_eq!(a.tick_at(0), Some(Admission::GateClosed));
    }

    #[test]
    fn suspended_stream_is_resumed_once() {
        let mut a = analyzer();
        let mut s = MockStream::live(0.5);
        s.suspended = true;
        a.start(s).unwrap();
        let source = a.session.as_ref().unwrap();
        assert_eq!(source.stream().resumes, 1);
        assert!(!source.stream().is_suspended());
    }

    #[test]
    fn gate_table_drives_collection() {
        // Gate open, no device: armed, nothing happens.
        let mut a = analyzer();
        a.set_collecting_samples(true);
        assert_eq!(a.tick_at(0), None);
        assert!(a.history().is_empty());

        // Device, gate open: recording.
        a.start(MockStream::live(0.5)).unwrap();
        assert_eq!(a.tick_at(0), Some(Admission::Appended));
        assert!(a.current_metrics().volume > 8.0);

        // Device, gate closed: monitoring.
        a.set_collecting_samples(false);
        assert_eq!(a.tick_at(400), Some(Admission::GateClosed));
        assert!(a.current_metrics().volume > 8.0);
        assert_eq!(a.history().len(), 1);

        // No device, gate closed: dormant.
        a.stop();
        assert_eq!(a.tick_at(800), None);
        assert_eq!(a.current_metrics(), FrameMetrics::default());
        assert_eq!(a.history().len(), 1);
    }

    #[test]
    fn quiet_stream_never_reaches_history() {
        let mut a = analyzer();
        a.start(MockStream::live(0.005)).unwrap();
        a.set_collecting_samples(true);
        for i in 0..50u64 {
            assert_eq!(a.tick_at(i * 250), Some(Admission::TooQuiet));
        }
        assert!(!a.report().is_ready());
    }

    #[test]
    fn history_survives_restart() {
        let mut a = analyzer();
        a.set_collecting_samples(true);
        a.start(MockStream::live(0.5)).unwrap();
        for i in 0..6u64 {
            a.tick_at(i * 200);
        }
        a.stop();
        assert_eq!(a.history().len(), 6);

        a.start(MockStream::live(0.5)).unwrap();
        a.tick_at(2_000);
        assert_eq!(a.history().len(), 7);
        assert!(a.report().is_ready());
    }

    #[test]
    fn acquiring_can_be_abandoned() {
        let mut a = analyzer();
        let generation = a.begin_acquiring().unwrap();
        assert_eq!(a.state(), LifecycleState::Acquiring);
        assert_eq!(a.generation(), generation);
        a.abandon_acquiring();
        assert_eq!(a.state(), LifecycleState::Idle);

        a.start(MockStream::live(0.5)).unwrap();
        assert_eq!(a.begin_acquiring(), Err(StartError::AlreadyAnalyzing));
        a.abandon_acquiring();
        assert_eq!(a.state(), LifecycleState::Analyzing);
    }

    #[test]
    fn stop_cancels_pending_acquisition() {
        let mut a = analyzer();
        assert!(!a.acquisition_token().is_cancelled());

        a.begin_acquiring().unwrap();
        let first = a.acquisition_token();
        a.begin_acquiring().unwrap();
        let second = a.acquisition_token();
        assert!(first.is_cancelled(), "a newer acquisition supersedes the old one");
        assert!(!second.is_cancelled());

        a.stop();
        assert!(second.is_cancelled());
        assert!(!a.acquisition_token().is_cancelled());
    }
}
