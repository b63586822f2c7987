//! Engine settings, their defaults and `settings.toml` persistence.
//!
//! One table per engine stage.  Every table is `#[serde(default)]`, so a
//! partial file only overrides the keys it names.

use std::io::ErrorKind;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use super::AppPaths;

// ---------------------------------------------------------------------------
// AnalyserConfig
// ---------------------------------------------------------------------------

/// Shape of the per-frame analysis buffers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyserConfig {
    /// Transform length in samples; also the time-domain buffer length.
    /// Rounded up to a power of two in `[32, 32768]`.
    pub fft_size: usize,
    /// Temporal smoothing of the spectrum (`0.0` = none, `1.0` = frozen).
    pub smoothing: f32,
    /// Spectrum level mapped to byte `0`.
    pub min_decibels: f32,
    /// Spectrum level mapped to byte `255`.
    pub max_decibels: f32,
}

impl Default for AnalyserConfig {
    fn default() -> Self {
        Self {
            fft_size: 2048,
            smoothing: 0.8,
            min_decibels: -90.0,
            max_decibels: -10.0,
        }
    }
}

impl AnalyserConfig {
    /// `fft_size` rounded to a supported power of two.
    pub fn effective_fft_size(&self) -> usize {
        self.fft_size.clamp(32, 32_768).next_power_of_two()
    }
}

// ---------------------------------------------------------------------------
// CollectorConfig
// ---------------------------------------------------------------------------

/// Gating and retention rules for the sample history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectorConfig {
    /// Maximum number of samples kept; the oldest are evicted first.
    pub history_capacity: usize,
    /// Minimum spacing between two history entries in milliseconds.
    pub min_interval_ms: u64,
    /// Frames at or below this volume are not speech: pitch, clarity and pace
    /// are skipped and nothing is appended.
    pub volume_gate: f32,
    /// Number of newest samples averaged for the live display.
    pub live_window: usize,
    /// Samples required before a report can be generated.
    pub min_report_samples: usize,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            history_capacity: 100,
            min_interval_ms: 200,
            volume_gate: 8.0,
            live_window: 50,
            min_report_samples: 5,
        }
    }
}

// ---------------------------------------------------------------------------
// DeviceConfig
// ---------------------------------------------------------------------------

/// Device acquisition and frame scheduling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Input device name, `None` for the system default.
    pub input_device: Option<String>,
    /// Delay between device readiness probes in milliseconds.
    pub poll_interval_ms: u64,
    /// Probes before giving up on the device.
    pub max_attempts: u32,
    /// Interval between analysis frames in milliseconds (~60 Hz).
    pub frame_interval_ms: u64,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            input_device: None,
            poll_interval_ms: 500,
            max_attempts: 60,
            frame_interval_ms: 16,
        }
    }
}

impl DeviceConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms.max(1))
    }
}

// ---------------------------------------------------------------------------
// SessionConfig
// ---------------------------------------------------------------------------

/// How long the command-line session records and where the report goes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Seconds to keep the collection gate open.
    pub duration_secs: u64,
    /// Where to write the report JSON.  `None` uses
    /// [`AppPaths::report_file`] for the session id.
    pub report_path: Option<std::path::PathBuf>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            duration_secs: 30,
            report_path: None,
        }
    }
}

// ---------------------------------------------------------------------------
// AppConfig
// ---------------------------------------------------------------------------

/// Everything in `settings.toml`.
///
/// ```rust,no_run
/// use voice_quality::config::AppConfig;
///
/// let mut config = AppConfig::load()?; // defaults on first run
/// config.session.duration_secs = 60;
/// config.save()?;
/// # Ok::<(), anyhow::Error>(())
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub analyser: AnalyserConfig,
    pub collector: CollectorConfig,
    pub device: DeviceConfig,
    pub session: SessionConfig,
}

impl AppConfig {
    /// Read the platform `settings.toml`.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    /// Read `path`; a missing file yields the defaults.  Values outside their
    /// usable range are clamped.
    pub fn load_from(path: &Path) -> Result<Self> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                log::debug!("config: {} not found, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(e).with_context(|| format!("reading {}", path.display()));
            }
        };
        let config: Self =
            toml::from_str(&text).with_context(|| format!("parsing {}", path.display()))?;
        Ok(config.sanitized())
    }

    /// Write the platform `settings.toml`.
    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::new().settings_file)
    }

    /// Write `path`, creating its directory first.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("creating {}", dir.display()))?;
        }
        std::fs::write(path, toml::to_string_pretty(self)?)
            .with_context(|| format!("writing {}", path.display()))
    }

    fn sanitized(mut self) -> Self {
        self.analyser.smoothing = self.analyser.smoothing.clamp(0.0, 1.0);
        if self.analyser.max_decibels <= self.analyser.min_decibels {
            log::warn!("config: empty decibel window, using defaults");
            let defaults = AnalyserConfig::default();
            self.analyser.min_decibels = defaults.min_decibels;
            self.analyser.max_decibels = defaults.max_decibels;
        }
        self.collector.history_capacity = self.collector.history_capacity.max(1);
        self.collector.live_window = self.collector.live_window.max(1);
        self.device.max_attempts = self.device.max_attempts.max(1);
        self
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
