//! Real-time voice-quality analysis.
//!
//! A microphone stream is cut into analysis frames ([`audio`]), each frame
//! is reduced to pitch, volume, clarity and pace ([`features`]), gated
//! samples are kept in a bounded history and scored ([`analysis`]), and
//! [`engine`] ties the device lifecycle to a ~60 Hz frame loop.

pub mod analysis;
pub mod audio;
pub mod config;
pub mod engine;
pub mod features;
