//! Sample history and reporting.
//!
//! ```text
//! FrameMetrics ──▶ SampleCollector ──┬─ current()       (every frame)
//!                  (gate, dedup, cap) ├─ snapshot()      (history, oldest first)
//!                                     ├─ live_summary()  (newest 50 samples)
//!                                     └─ report()        (whole history) ──▶ ReportOutcome
//! ```
//!
//! # Example
//!
//! ```rust
//! use voice_quality::analysis::{SampleCollector, ReportOutcome};
//! use voice_quality::config::CollectorConfig;
//! use voice_quality::features::FrameMetrics;
//!
//! let mut collector = SampleCollector::new(CollectorConfig::default());
//! collector.set_collecting(true);
//!
//! let speech = FrameMetrics { pitch_hz: 175.0, volume: 60.0, clarity: 80.0, pace: 50.0 };
//! for i in 0..5 {
//!     collector.record(speech, i * 200);
//! }
//!
//! let report = collector.report().into_report().unwrap();
//! assert_eq!(report.overall_score(), 63);
//! assert_eq!(report.assessment().label(), "Fair");
//! ```

pub mod collector;
pub mod report;

pub use collector::{Admission, MetricSample, SampleCollector};
pub use report::{
    generate_report, AnalysisReport, Assessment, InsufficientData, LiveSummary, ReportOutcome,
    ReportSink, Scores, MIN_REPORT_SAMPLES,
};
