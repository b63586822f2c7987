//! Session lifecycle: device acquisition, the analyzer state machine and the
//! frame loop.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use voice_quality::audio::AudioCapture;
//! use voice_quality::config::AppConfig;
//! use voice_quality::engine::{
//!     acquire_and_start, cancel_pair, lock, new_shared_analyzer, run_frame_loop, RetryPolicy,
//!     VoiceAnalyzer,
//! };
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = AppConfig::default();
//! let shared = new_shared_analyzer(VoiceAnalyzer::from_config(&config));
//! let (cancel, mut token) = cancel_pair();
//!
//! let probe = || AudioCapture::new().and_then(|c| c.open()).ok();
//! acquire_and_start(&shared, probe, RetryPolicy::from(&config.device), &mut token).await?;
//!
//! lock(&shared).set_collecting_samples(true);
//! let frames = tokio::task::spawn_local(run_frame_loop(
//!     shared.clone(),
//!     config.device.frame_interval(),
//!     token,
//! ));
//! // ... later
//! cancel.cancel();
//! frames.await?;
//! lock(&shared).stop();
//! println!("{}", serde_json::to_string_pretty(&lock(&shared).report())?);
//! # Ok(())
//! # }
//! ```

pub mod analyzer;
pub mod runner;
pub mod state;

pub use analyzer::{validate_stream, StartError, VoiceAnalyzer};
pub use runner::{
    acquire_and_start, await_device_ready, cancel_pair, run_frame_loop, AcquireError, CancelHandle,
    CancelToken, DeviceWaitError, RetryPolicy,
};
pub use state::{lock, new_shared_analyzer, CollectionMode, GateState, LifecycleState, SharedAnalyzer};
