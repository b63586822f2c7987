//! Configuration module for the voice-quality engine.
//!
//! Provides `AppConfig` (top-level settings), one sub-config per engine
//! stage, `AppPaths` for cross-platform directories, and TOML persistence via
//! `AppConfig::load` / `AppConfig::save`.

pub mod paths;
pub mod settings;

pub use paths::AppPaths;
pub use settings::{AnalyserConfig, AppConfig, CollectorConfig, DeviceConfig, SessionConfig};
