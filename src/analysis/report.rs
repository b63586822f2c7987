//! Composite quality report built from the sample history.
//!
//! ## Scoring
//!
//! Averages are taken over the **whole** history, then normalised to
//! integer scores in `0..=100`:
//!
//! | Score | From |
//! |-------|------|
//! | clarity | average clarity |
//! | volume | average volume |
//! | pace | average pace |
//! | tone | `(avg_pitch − 70) / 2.1`, i.e. 70–280 Hz onto 0–100; `0` without pitch |
//!
//! `overall = round(0.35·clarity + 0.25·volume + 0.25·pace + 0.15·tone)`.
//!
//! A report needs at least [`MIN_REPORT_SAMPLES`]; with fewer the outcome is
//! [`ReportOutcome::InsufficientData`], never an error.  Generation only
//! reads the samples, so repeated calls over the same history return equal
//! reports.

use serde::{Serialize, Serializer};

use crate::analysis::collector::MetricSample;
use crate::features::FrameMetrics;

/// Samples required for a report.
pub const MIN_REPORT_SAMPLES: usize = 5;
/// Nominal seconds represented by one history entry (the dedup interval).
pub const NOMINAL_SAMPLE_SECS: f32 = 0.2;

const CLARITY_WEIGHT: f32 = 0.35;
const VOLUME_WEIGHT: f32 = 0.25;
const PACE_WEIGHT: f32 = 0.25;
const TONE_WEIGHT: f32 = 0.15;

const TONE_BASE_HZ: f32 = 70.0;
const TONE_HZ_PER_POINT: f32 = 2.1;

// ---------------------------------------------------------------------------
// Assessment
// ---------------------------------------------------------------------------

/// Overall quality band.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Assessment {
    Excellent,
    Good,
    Fair,
    NeedsSignificantImprovement,
}

impl Assessment {
    /// Band for an overall score.
    ///
    /// ```
    /// use voice_quality::analysis::Assessment;
    ///
    /// assert_eq!(Assessment::from_score(80), Assessment::Excellent);
    /// assert_eq!(Assessment::from_score(65), Assessment::Good);
    /// assert_eq!(Assessment::from_score(50), Assessment::Fair);
    /// assert_eq!(Assessment::from_score(49), Assessment::NeedsSignificantImprovement);
    /// ```
    pub fn from_score(overall: u8) -> Self {
        match overall {
            80.. => Assessment::Excellent,
            65..=79 => Assessment::Good,
            50..=64 => Assessment::Fair,
            _ => Assessment::NeedsSignificantImprovement,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Assessment::Excellent => "Excellent",
            Assessment::Good => "Good",
            Assessment::Fair => "Fair",
            Assessment::NeedsSignificantImprovement => "Needs Significant Improvement",
        }
    }
}

impl Serialize for Assessment {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

// ---------------------------------------------------------------------------
// Scores
// ---------------------------------------------------------------------------

/// Normalised integer scores.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Scores {
    pub overall_score: u8,
    pub clarity_score: u8,
    pub volume_score: u8,
    pub tone_score: u8,
    pub pace_score: u8,
}

impl Scores {
    /// Normalise metric averages and combine them.
    pub fn from_averages(avg: &FrameMetrics) -> Self {
        let clarity = to_score(avg.clarity);
        let volume = to_score(avg.volume);
        let pace = to_score(avg.pace);
        let tone = if avg.pitch_hz > 0.0 {
            to_score((avg.pitch_hz - TONE_BASE_HZ) / TONE_HZ_PER_POINT)
        } else {
            0
        };
        Self {
            overall_score: overall(clarity, volume, pace, tone),
            clarity_score: clarity,
            volume_score: volume,
            tone_score: tone,
            pace_score: pace,
        }
    }
}

fn to_score(value: f32) -> u8 {
    if !value.is_finite() {
        return 0;
    }
    value.clamp(0.0, 100.0).round() as u8
}

/// Weighted combination of the four normalised scores.
pub fn overall(clarity: u8, volume: u8, pace: u8, tone: u8) -> u8 {
    let weighted = CLARITY_WEIGHT * clarity as f32
        + VOLUME_WEIGHT * volume as f32
        + PACE_WEIGHT * pace as f32
        + TONE_WEIGHT * tone as f32;
    to_score(weighted)
}

/// Arithmetic mean of each metric; all zero for an empty slice.
pub fn average(samples: &[MetricSample]) -> FrameMetrics {
    if samples.is_empty() {
        return FrameMetrics::default();
    }
    let n = samples.len() as f32;
    let mut sum = FrameMetrics::default();
    for s in samples {
        sum.pitch_hz += s.pitch_hz;
        sum.volume += s.volume;
        sum.clarity += s.clarity;
        sum.pace += s.pace;
    }
    FrameMetrics {
        pitch_hz: sum.pitch_hz / n,
        volume: sum.volume / n,
        clarity: sum.clarity / n,
        pace: sum.pace / n,
    }
}

// ---------------------------------------------------------------------------
// AnalysisReport
// ---------------------------------------------------------------------------

/// Explainable quality report.
///
/// Only [`generate_report`] builds one, and only from enough samples.
/// Serialises to the stable storage shape:
///
/// ```text
/// { overallScore, clarityScore, volumeScore, toneScore, paceScore,
///   avgPitch, avgVolume, avgClarity, avgPace,
///   assessment, strengths, recommendations, sampleCount, duration }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisReport {
    #[serde(flatten)]
    scores: Scores,
    #[serde(serialize_with = "one_decimal")]
    avg_pitch: f32,
    #[serde(serialize_with = "one_decimal")]
    avg_volume: f32,
    #[serde(serialize_with = "one_decimal")]
    avg_clarity: f32,
    #[serde(serialize_with = "one_decimal")]
    avg_pace: f32,
    assessment: Assessment,
    strengths: Vec<String>,
    recommendations: Vec<String>,
    sample_count: usize,
    #[serde(serialize_with = "one_decimal")]
    duration: f32,
}

fn one_decimal<S: Serializer>(value: &f32, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&format!("{value:.1}"))
}

impl AnalysisReport {
    pub fn scores(&self) -> Scores {
        self.scores
    }

    pub fn overall_score(&self) -> u8 {
        self.scores.overall_score
    }

    /// Raw metric averages the scores were derived from.
    pub fn averages(&self) -> FrameMetrics {
        FrameMetrics {
            pitch_hz: self.avg_pitch,
            volume: self.avg_volume,
            clarity: self.avg_clarity,
            pace: self.avg_pace,
        }
    }

    pub fn assessment(&self) -> Assessment {
        self.assessment
    }

    pub fn strengths(&self) -> &[String] {
        &self.strengths
    }

    pub fn recommendations(&self) -> &[String] {
        &self.recommendations
    }

    pub fn sample_count(&self) -> usize {
        self.sample_count
    }

    /// Nominal speaking time in seconds (`sample_count × 0.2`).
    pub fn duration_secs(&self) -> f32 {
        self.duration
    }

    /// The report as the storage JSON object.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

// ---------------------------------------------------------------------------
// ReportOutcome
// ---------------------------------------------------------------------------

/// Why no report could be produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InsufficientData {
    pub sample_count: usize,
    pub required: usize,
}

/// Result of asking for a report.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ReportOutcome {
    Ready(AnalysisReport),
    InsufficientData(InsufficientData),
}

impl ReportOutcome {
    pub fn is_ready(&self) -> bool {
        matches!(self, ReportOutcome::Ready(_))
    }

    pub fn report(&self) -> Option<&AnalysisReport> {
        match self {
            ReportOutcome::Ready(r) => Some(r),
            ReportOutcome::InsufficientData(_) => None,
        }
    }

    pub fn into_report(self) -> Option<AnalysisReport> {
        match self {
            ReportOutcome::Ready(r) => Some(r),
            ReportOutcome::InsufficientData(_) => None,
        }
    }
}

// ---------------------------------------------------------------------------
// generate_report
// ---------------------------------------------------------------------------

/// Build a report from `samples`, requiring at least `min_samples`
/// (never fewer than [`MIN_REPORT_SAMPLES`]).
pub fn generate_report(samples: &[MetricSample], min_samples: usize) -> ReportOutcome {
    let required = min_samples.max(MIN_REPORT_SAMPLES);
    if samples.len() < required {
        return ReportOutcome::InsufficientData(InsufficientData {
            sample_count: samples.len(),
            required,
        });
    }

    let avg = average(samples);
    let scores = Scores::from_averages(&avg);
    let (strengths, recommendations) = feedback(&scores);

    ReportOutcome::Ready(AnalysisReport {
        scores,
        avg_pitch: avg.pitch_hz,
        avg_volume: avg.volume,
        avg_clarity: avg.clarity,
        avg_pace: avg.pace,
        assessment: Assessment::from_score(scores.overall_score),
        strengths,
        recommendations,
        sample_count: samples.len(),
        duration: samples.len() as f32 * NOMINAL_SAMPLE_SECS,
    })
}

/// Rule-based strengths and recommendations per metric.
fn feedback(scores: &Scores) -> (Vec<String>, Vec<String>) {
    let mut strengths = Vec::new();
    let mut recommendations = Vec::new();

    if scores.clarity_score >= 80 {
        strengths.push("Clear, well-articulated speech".to_string());
    } else if scores.clarity_score < 60 {
        recommendations
            .push("Work on articulation: open the mouth more and finish word endings".to_string());
    }

    if scores.volume_score >= 60 {
        strengths.push("Confident, well-projected volume".to_string());
    } else if scores.volume_score < 50 {
        recommendations
            .push("Speak louder or move closer to the microphone".to_string());
    }

    match scores.pace_score {
        40..=70 => strengths.push("Steady, easy-to-follow speaking pace".to_string()),
        p if p < 30 => recommendations
            .push("Keep speech flowing: reduce long pauses and hesitations".to_string()),
        p if p > 80 => recommendations
            .push("Slow down and leave short pauses between ideas".to_string()),
        _ => {}
    }

    match scores.tone_score {
        30..=70 => strengths.push("Natural, well-pitched tone".to_string()),
        t if t < 20 => recommendations
            .push("Add warmth and variation to the voice; avoid a flat, low tone".to_string()),
        _ => {}
    }

    (strengths, recommendations)
}

// ---------------------------------------------------------------------------
// LiveSummary
// ---------------------------------------------------------------------------

/// Rolling view over the newest samples, for live display.
///
/// Reports always use the full history; this summary deliberately looks
/// only at the last `window` entries so the display reacts to the speaker's
/// current delivery.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveSummary {
    pub sample_count: usize,
    pub averages: FrameMetrics,
    pub scores: Scores,
}

impl LiveSummary {
    pub fn from_history(history: &[MetricSample], window: usize) -> Self {
        let start = history.len().saturating_sub(window);
        let recent = &history[start..];
        let averages = average(recent);
        Self {
            sample_count: recent.len(),
            averages,
            scores: Scores::from_averages(&averages),
        }
    }
}

// ---------------------------------------------------------------------------
// ReportSink
// ---------------------------------------------------------------------------

/// Caller-supplied persistence for finished reports.
///
/// Any `Fn(&AnalysisReport) -> anyhow::Result<()>` closure is a sink.
pub trait ReportSink {
    fn persist(&self, report: &AnalysisReport) -> anyhow::Result<()>;
}

impl<F> ReportSink for F
where
    F: Fn(&AnalysisReport) -> anyhow::Result<()>,
{
    fn persist(&self, report: &AnalysisReport) -> anyhow::Result<()> {
        self(report)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
