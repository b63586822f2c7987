//! Lifecycle state machine and the collection-gate table.
//!
//! [`LifecycleState`] tracks the device session.  [`GateState`] pairs it
//! with the independent collection gate so callers can see at a glance what
//! the frame loop will do with the next frame.
//!
//! [`SharedAnalyzer`] is a type alias for `Arc<Mutex<VoiceAnalyzer<S>>>`:
//! the frame loop is the only writer, readers take short snapshots.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::analyzer::VoiceAnalyzer;

// ---------------------------------------------------------------------------
// LifecycleState
// ---------------------------------------------------------------------------

/// States of the analysis session.
///
/// ```text
/// Idle / Stopped ──acquire──▶ Acquiring ──start──▶ Analyzing
///                             Acquiring ──device timeout / cancel──▶ Idle
/// Idle / Stopped / Acquiring ──start──▶ Analyzing
/// any ──stop──▶ Stopped
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LifecycleState {
    /// Nothing started yet.
    #[default]
    Idle,
    /// Waiting for a usable device stream.
    Acquiring,
    /// A session is open and frames are being analysed.
    Analyzing,
    /// The session was stopped; history is kept.
    Stopped,
}

impl LifecycleState {
    /// `true` when a new session may be started from this state.
    ///
    /// ```
    /// use voice_quality::engine::LifecycleState;
    ///
    /// assert!(LifecycleState::Idle.can_start());
    /// assert!(LifecycleState::Acquiring.can_start());
    /// assert!(!LifecycleState::Analyzing.can_start());
    /// assert!(LifecycleState::Stopped.can_start());
    /// ```
    pub fn can_start(&self) -> bool {
        !matches!(self, LifecycleState::Analyzing)
    }

    pub fn label(&self) -> &'static str {
        match self {
            LifecycleState::Idle => "Idle",
            LifecycleState::Acquiring => "Acquiring",
            LifecycleState::Analyzing => "Analyzing",
            LifecycleState::Stopped => "Stopped",
        }
    }
}

// ---------------------------------------------------------------------------
// GateState
// ---------------------------------------------------------------------------

/// What the frame loop does with frames, per gate combination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionMode {
    /// No device, gate closed: nothing happens.
    Dormant,
    /// No device, gate open: collection resumes as soon as a session starts.
    Armed,
    /// Device connected, gate closed: current metrics only.
    Monitoring,
    /// Device connected, gate open: current metrics and history.
    Recording,
}

/// The two independent booleans that decide what a frame is used for.
///
/// | connected | collecting | mode |
/// |-----------|------------|------|
/// | no | no | [`Dormant`](CollectionMode::Dormant) |
/// | no | yes | [`Armed`](CollectionMode::Armed) |
/// | yes | no | [`Monitoring`](CollectionMode::Monitoring) |
/// | yes | yes | [`Recording`](CollectionMode::Recording) |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GateState {
    pub device_connected: bool,
    pub collecting: bool,
}

impl GateState {
    pub fn mode(&self) -> CollectionMode {
        match (self.device_connected, self.collecting) {
            (false, false) => CollectionMode::Dormant,
            (false, true) => CollectionMode::Armed,
            (true, false) => CollectionMode::Monitoring,
            (true, true) => CollectionMode::Recording,
        }
    }

    /// Frames update the current metrics.
    pub fn updates_current(&self) -> bool {
        self.device_connected
    }

    /// Frames may be appended to the history.
    pub fn appends_history(&self) -> bool {
        self.mode() == CollectionMode::Recording
    }
}

// ---------------------------------------------------------------------------
// SharedAnalyzer
// ---------------------------------------------------------------------------

/// Handle to a [`VoiceAnalyzer`] shared by the frame loop and its readers.
///
/// Lock with [`lock`] for a short critical section; never hold the guard
/// across `.await` points.
pub type SharedAnalyzer<S> = Arc<Mutex<VoiceAnalyzer<S>>>;

/// Wrap `analyzer` for sharing.
pub fn new_shared_analyzer<S>(analyzer: VoiceAnalyzer<S>) -> SharedAnalyzer<S> {
    Arc::new(Mutex::new(analyzer))
}

/// Lock the analyzer, recovering the data if a previous holder panicked.
pub fn lock<S>(shared: &SharedAnalyzer<S>) -> MutexGuard<'_, VoiceAnalyzer<S>> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_state_is_idle() {
        assert_eq!(LifecycleState::default(), LifecycleState::Idle);
    }

    #[test]
    fn labels() {
        assert_eq!(LifecycleState::Idle.label(), "Idle");
        assert_eq!(LifecycleState::Acquiring.label(), "Acquiring");
        assert_eq!(LifecycleState::Analyzing.label(), "Analyzing");
        assert_eq!(LifecycleState::Stopped.label(), "Stopped");
    }

    #[test]
    fn gate_table_covers_all_four_cells() {
        let cell = |device_connected, collecting| GateState {
            device_connected,
            collecting,
        };
        assert_eq!(cell(false, false).mode(), CollectionMode::Dormant);
        assert_eq!(cell(false, true).mode(), CollectionMode::Armed);
        assert_eq!(cell(true, false).mode(), CollectionMode::Monitoring);
        assert_eq!(cell(true, true).mode(), CollectionMode::Recording);
    }

    #[test]
    fn only_recording_appends_history() {
        for connected in [false, true] {
            for collecting in [false, true] {
                let g = GateState {
                    device_connected: connected,
                    collecting,
                };
                assert_eq!(g.appends_history(), connected && collecting);
                assert_eq!(g.updates_current(), connected);
            }
        }
    }
}
