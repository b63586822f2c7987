//! Application entry point. Records one voice-quality session.
//!
//! # Startup sequence
//!
//! 1. Initialise logging.
//! 2. Load [`AppConfig`] from disk (returns default on first run).
//! 3. Create a current-thread [`tokio`] runtime and a `LocalSet` (cpal
//!    streams are not `Send` everywhere).
//! 4. Wait for the input device, then start the analyzer.
//! 5. Run the frame loop with the collection gate open for
//!    `session.duration_secs`, or until Ctrl-C.
//! 6. Stop, print the report JSON and write it to `session.report_path`
//!    (default: the per-session file under [`AppPaths::reports_dir`]).
//!
//! Usage: `voice-quality [SESSION_ID]`

use std::path::PathBuf;
use std::time::Duration;

use voice_quality::{
    analysis::{AnalysisReport, ReportSink},
    audio::{AudioCapture, DeviceStream},
    config::{AppConfig, AppPaths},
    engine::{
        acquire_and_start, cancel_pair, lock, new_shared_analyzer, run_frame_loop, RetryPolicy,
        SharedAnalyzer, VoiceAnalyzer,
    },
};

// ---------------------------------------------------------------------------
// JSON file sink
// ---------------------------------------------------------------------------

/// Writes each report as pretty-printed JSON to a fixed path.
struct JsonFileSink {
    path: PathBuf,
}

impl ReportSink for JsonFileSink {
    fn persist(&self, report: &AnalysisReport) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_string_pretty(report)?)?;
        log::info!("Report written to {}", self.path.display());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Device probe
// ---------------------------------------------------------------------------

/// Try once to open the configured input device.
fn probe_device(name: Option<&str>) -> Option<DeviceStream> {
    match AudioCapture::with_device(name).and_then(|capture| capture.open()) {
        Ok(stream) => Some(stream),
        Err(e) => {
            log::debug!("Input device not ready: {e}");
            None
        }
    }
}

// ---------------------------------------------------------------------------
// Live display
// ---------------------------------------------------------------------------

/// Log the rolling summary once per second while the session runs.
async fn log_live_summary(shared: SharedAnalyzer<DeviceStream>) {
    let mut ticker = tokio::time::interval(Duration::from_secs(1));
    loop {
        ticker.tick().await;
        let (summary, current) = {
            let analyzer = lock(&shared);
            (analyzer.live_summary(), analyzer.current_metrics())
        };
        log::info!(
            "live: volume {:.0}, pitch {:.0} Hz | {} samples, overall {}",
            current.volume,
            current.pitch_hz,
            summary.sample_count,
            summary.scores.overall_score
        );
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

async fn run_session(config: AppConfig, session_id: String) -> anyhow::Result<()> {
    let shared = new_shared_analyzer(VoiceAnalyzer::from_config(&config));

    // Ctrl-C cancels whichever phase is running.
    let (interrupt, mut interrupted) = cancel_pair();
    let signal = tokio::task::spawn_local(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::info!("Interrupt received, finishing session");
            interrupt.cancel();
        }
    });

    let device_name = config.device.input_device.clone();
    let policy = RetryPolicy::from(&config.device);
    log::info!(
        "Waiting for input device (up to {} s)",
        policy.budget().as_secs()
    );
    acquire_and_start(
        &shared,
        || probe_device(device_name.as_deref()),
        policy,
        &mut interrupted,
    )
    .await?;

    {
        let mut analyzer = lock(&shared);
        if analyzer.clear_for_session(&session_id) {
            log::debug!("History cleared for session {session_id}");
        }
        analyzer.set_collecting_samples(true);
    }

    let (stop_frames, frames_token) = cancel_pair();
    let frames = tokio::task::spawn_local(run_frame_loop(
        shared.clone(),
        config.device.frame_interval(),
        frames_token,
    ));
    let live = tokio::task::spawn_local(log_live_summary(shared.clone()));

    log::info!(
        "Recording session {session_id} for {} s (Ctrl-C to finish early)",
        config.session.duration_secs
    );
    tokio::select! {
        _ = tokio::time::sleep(Duration::from_secs(config.session.duration_secs)) => {}
        _ = interrupted.cancelled() => {}
    }

    lock(&shared).set_collecting_samples(false);
    stop_frames.cancel();
    let processed = frames.await?;
    live.abort();
    signal.abort();

    let outcome = {
        let mut analyzer = lock(&shared);
        analyzer.stop();
        analyzer.report()
    };
    log::info!("Session finished after {processed} frames");

    println!("{}", serde_json::to_string_pretty(&outcome)?);
    let Some(report) = outcome.report() else {
        log::warn!("Not enough speech for a report; speak louder or longer");
        return Ok(());
    };
    let sink = JsonFileSink {
        path: report_path(&config, &session_id),
    };
    sink.persist(report)
}

fn report_path(config: &AppConfig, session_id: &str) -> PathBuf {
    match &config.session.report_path {
        Some(path) => path.clone(),
        None => AppPaths::new().report_file(session_id),
    }
}

// ---------------------------------------------------------------------------
// main
// ---------------------------------------------------------------------------

fn main() -> anyhow::Result<()> {
    // 1. Logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("voice-quality starting up");

    // 2. Configuration
    let config = AppConfig::load().unwrap_or_else(|e| {
        log::warn!("Failed to load config ({e}); using defaults");
        AppConfig::default()
    });

    let session_id = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "default".to_string());

    // 3. Runtime
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let local = tokio::task::LocalSet::new();

    // 4–6. Session
    local.block_on(&rt, run_session(config, session_id))
}
