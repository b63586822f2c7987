//! Current metrics plus a gated, deduplicated, capped sample history.
//!
//! Every frame replaces the *current* metrics.  A frame only becomes a
//! history entry when all three gates pass:
//!
//! 1. the collection gate is open ([`SampleCollector::set_collecting`]),
//! 2. its volume exceeds the meaningful-audio gate,
//! 3. at least `min_interval_ms` passed since the previous entry.
//!
//! The history is FIFO-capped: once full, the oldest entry is evicted.

use std::collections::VecDeque;

use serde::Serialize;

use crate::analysis::report::{generate_report, LiveSummary, ReportOutcome};
use crate::config::CollectorConfig;
use crate::features::FrameMetrics;

// ---------------------------------------------------------------------------
// MetricSample
// ---------------------------------------------------------------------------

/// One history entry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricSample {
    /// Fundamental frequency in Hz, `0` when undetected.
    pub pitch_hz: f32,
    pub volume: f32,
    pub clarity: f32,
    pub pace: f32,
    /// Milliseconds since the analyzer's epoch.
    pub timestamp_ms: u64,
}

impl MetricSample {
    pub fn new(metrics: FrameMetrics, timestamp_ms: u64) -> Self {
        Self {
            pitch_hz: metrics.pitch_hz,
            volume: metrics.volume,
            clarity: metrics.clarity,
            pace: metrics.pace,
            timestamp_ms,
        }
    }

    pub fn metrics(&self) -> FrameMetrics {
        FrameMetrics {
            pitch_hz: self.pitch_hz,
            volume: self.volume,
            clarity: self.clarity,
            pace: self.pace,
        }
    }
}

// ---------------------------------------------------------------------------
// Admission
// ---------------------------------------------------------------------------

/// What happened to a frame offered to the history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Appended,
    /// The collection gate is closed.
    GateClosed,
    /// Volume at or below the meaningful-audio gate.
    TooQuiet,
    /// Less than the minimum interval since the previous entry.
    TooSoon,
}

// ---------------------------------------------------------------------------
// SampleCollector
// ---------------------------------------------------------------------------

/// Sole owner and writer of the sample history.
#[derive(Debug)]
pub struct SampleCollector {
    config: CollectorConfig,
    current: FrameMetrics,
    history: VecDeque<MetricSample>,
    last_appended_ms: Option<u64>,
    collecting: bool,
    /// Session whose start already cleared the history.
    cleared_for: Option<String>,
}

impl SampleCollector {
    pub fn new(config: CollectorConfig) -> Self {
        let capacity = config.history_capacity.max(1);
        Self {
            config,
            current: FrameMetrics::default(),
            history: VecDeque::with_capacity(capacity),
            last_appended_ms: None,
            collecting: false,
            cleared_for: None,
        }
    }

    pub fn config(&self) -> &CollectorConfig {
        &self.config
    }

    /// Record one frame's metrics: always the current metrics, and the
    /// history when every gate passes.
    pub fn record(&mut self, metrics: FrameMetrics, timestamp_ms: u64) -> Admission {
        self.current = metrics;

        if !self.collecting {
            return Admission::GateClosed;
        }
        if !metrics.is_meaningful(self.config.volume_gate) {
            return Admission::TooQuiet;
        }
        if let Some(last) = self.last_appended_ms {
            if timestamp_ms.saturating_sub(last) < self.config.min_interval_ms
                || timestamp_ms < last
            {
                return Admission::TooSoon;
            }
        }

        if self.history.len() >= self.config.history_capacity.max(1) {
            self.history.pop_front();
        }
        self.history.push_back(MetricSample::new(metrics, timestamp_ms));
        self.last_appended_ms = Some(timestamp_ms);
        Admission::Appended
    }

    /// Open or close the collection gate.  Independent of whether a device is
    /// connected.
    pub fn set_collecting(&mut self, collecting: bool) {
        if self.collecting != collecting {
            log::debug!("collector: collection gate {}", if collecting { "open" } else { "closed" });
        }
        self.collecting = collecting;
    }

    pub fn is_collecting(&self) -> bool {
        self.collecting
    }

    /// Metrics of the most recent frame.
    pub fn current(&self) -> FrameMetrics {
        self.current
    }

    /// Reset the current metrics, e.g. when the session stops.
    pub fn reset_current(&mut self) {
        self.current = FrameMetrics::default();
    }

    /// Copy of the history, oldest first.
    pub fn snapshot(&self) -> Vec<MetricSample> {
        self.history.iter().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    /// Drop every history entry.  Idempotent.
    pub fn clear_history(&mut self) {
        if !self.history.is_empty() {
            log::debug!("collector: clearing {} samples", self.history.len());
        }
        self.history.clear();
        self.last_appended_ms = None;
    }

    /// Clear the history once per `session_id`.
    ///
    /// Returns `true` when this call cleared; repeated calls for the same
    /// session (reconnects, duplicated "connected" signals) are no-ops.
    pub fn clear_for_session(&mut self, session_id: &str) -> bool {
        if self.cleared_for.as_deref() == Some(session_id) {
            log::debug!("collector: session {session_id} already cleared");
            return false;
        }
        self.clear_history();
        self.cleared_for = Some(session_id.to_string());
        true
    }

    /// Report over the entire history.
    pub fn report(&self) -> ReportOutcome {
        generate_report(&self.snapshot(), self.config.min_report_samples)
    }

    /// Averages over the newest `live_window` entries.
    pub fn live_summary(&self) -> LiveSummary {
        LiveSummary::from_history(&self.snapshot(), self.config.live_window)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
