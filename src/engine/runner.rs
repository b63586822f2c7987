//! Async drivers: device acquisition with bounded retries, and the frame
//! loop.
//!
//! # Flow
//!
//! ```text
//! acquire_and_start
//!   └─▶ state = Acquiring
//!         └─▶ await_device_ready  (probe every poll_interval, max_attempts)
//!               ├─ Ok(stream) ──▶ VoiceAnalyzer::start           [Analyzing]
//!               ├─ TimedOut / Cancelled ──▶ abandon_acquiring    [Idle]
//!               └─ stop() happened meanwhile ──▶ wait ends        [Stopped]
//!
//! run_frame_loop
//!   └─▶ every frame_interval: VoiceAnalyzer::tick
//!         exits on cancel, stop() or a newer session
//! ```
//!
//! Neither driver holds the analyzer lock across an `.await`.

use std::time::Duration;

use thiserror::Error;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

use crate::audio::InputStream;
use crate::config::DeviceConfig;

use super::analyzer::StartError;
use super::state::{lock, LifecycleState, SharedAnalyzer};

// ---------------------------------------------------------------------------
// Cancellation
// ---------------------------------------------------------------------------

/// Sending half of a cancellation signal.
#[derive(Debug)]
pub struct CancelHandle(watch::Sender<bool>);

impl CancelHandle {
    /// Signal every [`CancelToken`] cloned from this pair.
    pub fn cancel(&self) {
        self.0.send_replace(true);
    }

    /// A new token linked to this handle.
    pub fn token(&self) -> CancelToken {
        CancelToken(self.0.subscribe())
    }
}

/// Receiving half of a cancellation signal.  Cheap to clone.
#[derive(Debug, Clone)]
pub struct CancelToken(watch::Receiver<bool>);

impl CancelToken {
    /// A token that is never cancelled.
    pub fn never() -> Self {
        let (_tx, rx) = watch::channel(false);
        Self(rx)
    }

    pub fn is_cancelled(&self) -> bool {
        *self.0.borrow()
    }

    /// Resolves once the handle has cancelled.  Pending forever if the handle
    /// is dropped first.
    pub async fn cancelled(&mut self) {
        loop {
            if *self.0.borrow_and_update() {
                return;
            }
            if self.0.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

/// Create a linked handle/token pair.
pub fn cancel_pair() -> (CancelHandle, CancelToken) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle(tx), CancelToken(rx))
}

// ---------------------------------------------------------------------------
// Device acquisition
// ---------------------------------------------------------------------------

/// How often and how long to wait for a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub poll_interval: Duration,
    pub max_attempts: u32,
}

impl RetryPolicy {
    /// Upper bound on the time spent waiting.
    pub fn budget(&self) -> Duration {
        self.poll_interval * self.max_attempts
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&DeviceConfig::default())
    }
}

impl From<&DeviceConfig> for RetryPolicy {
    fn from(device: &DeviceConfig) -> Self {
        Self {
            poll_interval: device.poll_interval(),
            max_attempts: device.max_attempts.max(1),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeviceWaitError {
    #[error("device not ready after {attempts} attempts")]
    TimedOut { attempts: u32 },

    #[error("device wait cancelled")]
    Cancelled,
}

/// Probe for a ready stream until one appears, the attempts run out or
/// `cancel` fires.
///
/// The first probe runs immediately; later ones are spaced by
/// `policy.poll_interval`.
pub async fn await_device_ready<S, F>(
    mut probe: F,
    policy: RetryPolicy,
    cancel: &mut CancelToken,
) -> Result<S, DeviceWaitError>
where
    F: FnMut() -> Option<S>,
{
    let attempts = policy.max_attempts.max(1);
    for attempt in 1..=attempts {
        if cancel.is_cancelled() {
            return Err(DeviceWaitError::Cancelled);
        }
        if let Some(stream) = probe() {
            log::info!("runner: device ready after {attempt} attempt(s)");
            return Ok(stream);
        }
        log::debug!("runner: device not ready ({attempt}/{attempts})");
        if attempt == attempts {
            break;
        }
        tokio::select! {
            _ = tokio::time::sleep(policy.poll_interval) => {}
            _ = cancel.cancelled() => return Err(DeviceWaitError::Cancelled),
        }
    }
    log::warn!("runner: device not ready after {attempts} attempts");
    Err(DeviceWaitError::TimedOut { attempts })
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AcquireError {
    #[error(transparent)]
    Device(#[from] DeviceWaitError),

    #[error(transparent)]
    Start(#[from] StartError),

    /// `stop()` or another acquisition ran while this one was waiting.
    #[error("acquisition superseded")]
    Superseded,
}

/// Wait for a device and open a session on it.
///
/// Returns the generation of the new session, for [`run_frame_loop`].
pub async fn acquire_and_start<S, F>(
    shared: &SharedAnalyzer<S>,
    probe: F,
    policy: RetryPolicy,
    cancel: &mut CancelToken,
) -> Result<u64, AcquireError>
where
    S: InputStream,
    F: FnMut() -> Option<S>,
{
    let (generation, mut stopped) = {
        let mut analyzer = lock(shared);
        let generation = analyzer.begin_acquiring()?;
        (generation, analyzer.acquisition_token())
    };
    let result = tokio::select! {
        r = await_device_ready(probe, policy, cancel) => r,
        _ = stopped.cancelled() => Err(DeviceWaitError::Cancelled),
    };

    let mut analyzer = lock(shared);
    if analyzer.generation() != generation {
        log::info!("runner: analyzer changed during acquisition, releasing stream");
        return Err(AcquireError::Superseded);
    }
    match result {
        Ok(stream) => {
            if let Err(e) = analyzer.start(stream) {
                analyzer.abandon_acquiring();
                return Err(e.into());
            }
            Ok(analyzer.generation())
        }
        Err(e) => {
            analyzer.abandon_acquiring();
            Err(e.into())
        }
    }
}

// ---------------------------------------------------------------------------
// Frame loop
// ---------------------------------------------------------------------------

/// Tick the analyzer every `frame_interval` until `cancel` fires or the
/// session it started under ends.
///
/// Late ticks are skipped rather than bunched.  Returns the number of frames
/// this loop processed.
pub async fn run_frame_loop<S: InputStream>(
    shared: SharedAnalyzer<S>,
    frame_interval: Duration,
    mut cancel: CancelToken,
) -> u64 {
    let generation = {
        let analyzer = lock(&shared);
        if analyzer.state() != LifecycleState::Analyzing {
            log::debug!("runner: frame loop not started, no session");
            return 0;
        }
        analyzer.generation()
    };

    let mut ticker = tokio::time::interval(frame_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut frames = 0u64;

    log::debug!("runner: frame loop started (every {frame_interval:?})");
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                log::debug!("runner: frame loop cancelled");
                break;
            }
            instant = ticker.tick() => {
                let mut analyzer = lock(&shared);
                if analyzer.generation() != generation {
                    log::debug!("runner: session ended, frame loop exiting");
                    break;
                }
                if analyzer.tick(instant.into_std()).is_some() {
                    frames += 1;
                }
            }
        }
    }
    log::debug!("runner: frame loop processed {frames} frames");
    frames
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AnalyserConfig, CollectorConfig};
    use crate::engine::analyzer::tests::MockStream;
    use crate::engine::state::new_shared_analyzer;
    use crate::engine::VoiceAnalyzer;

    fn policy() -> RetryPolicy {
        RetryPolicy {
            poll_interval: Duration::from_millis(500),
            max_attempts: 60,
        }
    }

    fn shared() -> SharedAnalyzer<MockStream> {
        new_shared_analyzer(VoiceAnalyzer::with_epoch(
            AnalyserConfig::default(),
            CollectorConfig::default(),
            tokio::time::Instant::now().into_std(),
        ))
    }

    #[test]
    fn default_policy_budget_is_thirty_seconds() {
        assert_eq!(RetryPolicy::default().budget(), Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn ready_device_is_returned_immediately() {
        let start = tokio::time::Instant::now();
        let mut cancel = CancelToken::never();
        let s = await_device_ready(|| Some(7u8), policy(), &mut cancel).await;
        assert_eq!(s, Ok(7));
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn device_becoming_ready_on_third_probe() {
        let start = tokio::time::Instant::now();
        let mut calls = 0;
        let mut cancel = CancelToken::never();
        let s = await_device_ready(
            || {
                calls += 1;
                (calls == 3).then_some("mic")
            },
            policy(),
            &mut cancel,
        )
        .await;
        assert_eq!(s, Ok("mic"));
        assert_eq!(start.elapsed(), Duration::from_millis(1_000));
    }

    #[tokio::test(start_paused = true)]
    async fn never_ready_times_out_after_max_attempts() {
        let mut calls = 0u32;
        let mut cancel = CancelToken::never();
        let r: Result<(), _> = await_device_ready(
            || {
                calls += 1;
                None
            },
            policy(),
            &mut cancel,
        )
        .await;
        assert_eq!(r, Err(DeviceWaitError::TimedOut { attempts: 60 }));
        assert_eq!(calls, 60);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_interrupts_the_wait() {
        let (handle, mut token) = cancel_pair();
        let wait = await_device_ready(|| None::<()>, policy(), &mut token);
        let canceller = async {
            tokio::time::sleep(Duration::from_millis(1_200)).await;
            handle.cancel();
        };
        let (r, ()) = tokio::join!(wait, canceller);
        assert_eq!(r, Err(DeviceWaitError::Cancelled));
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_returns_to_idle() {
        let shared = shared();
        let mut cancel = CancelToken::never();
        let r = acquire_and_start(&shared, || None, policy(), &mut cancel).await;
        assert_eq!(r, Err(AcquireError::Device(DeviceWaitError::TimedOut { attempts: 60 })));
        assert_eq!(lock(&shared).state(), LifecycleState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn acquisition_starts_session() {
        let shared = shared();
        let mut cancel = CancelToken::never();
        let generation = acquire_and_start(&shared, || Some(MockStream::live(0.5)), policy(), &mut cancel)
            .await
            .unwrap();
        let analyzer = lock(&shared);
        assert_eq!(analyzer.state(), LifecycleState::Analyzing);
        assert_eq!(analyzer.generation(), generation);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_during_acquisition_ends_probing() {
        let shared = shared();
        let start = tokio::time::Instant::now();
        let mut cancel = CancelToken::never();
        let mut calls = 0;
        let acquire = acquire_and_start(
            &shared,
            || {
                calls += 1;
                None::<MockStream>
            },
            policy(),
            &mut cancel,
        );
        let stopper = async {
            tokio::time::sleep(Duration::from_millis(700)).await;
            lock(&shared).stop();
        };
        let (r, ()) = tokio::join!(acquire, stopper);
        assert_eq!(r, Err(AcquireError::Superseded));
        // probes at 0 ms and 500 ms only
        assert_eq!(calls, 2);
        assert_eq!(start.elapsed(), Duration::from_millis(700));
    }

    #[tokio::test(start_paused = true)]
    async fn frame_loop_records_spaced_samples_until_cancelled() {
        let shared = shared();
        {
            let mut a = lock(&shared);
            a.start(MockStream::live(0.5)).unwrap();
            a.set_collecting_samples(true);
        }
        let (handle, token) = cancel_pair();
        let frame_loop = run_frame_loop(shared.clone(), Duration::from_millis(16), token);
        let session = async {
            tokio::time::sleep(Duration::from_secs(2)).await;
            handle.cancel();
        };
        let (frames, ()) = tokio::join!(frame_loop, session);

        assert!(frames >= 100, "frames = {frames}");
        let history = lock(&shared).history();
        assert!((8..=11).contains(&history.len()), "len = {}", history.len());
        for pair in history.windows(2) {
            assert!(pair[1].timestamp_ms - pair[0].timestamp_ms >= 200);
        }
        assert!(lock(&shared).report().is_ready());
    }

    #[tokio::test(start_paused = true)]
    async fn frame_loop_exits_when_stopped() {
        let shared = shared();
        lock(&shared).start(MockStream::live(0.5)).unwrap();

        let frame_loop = run_frame_loop(shared.clone(), Duration::from_millis(16), CancelToken::never());
        let stopper = async {
            tokio::time::sleep(Duration::from_millis(500)).await;
            lock(&shared).stop();
        };
        let (frames, ()) = tokio::join!(frame_loop, stopper);

        let processed = lock(&shared).frames_processed();
        assert_eq!(frames, processed);
        assert_eq!(lock(&shared).state(), LifecycleState::Stopped);
    }

    #[tokio::test]
    async fn frame_loop_without_session_returns_immediately() {
        let shared = shared();
        assert_eq!(run_frame_loop(shared, Duration::from_millis(16), CancelToken::never()).await, 0);
    }
}
