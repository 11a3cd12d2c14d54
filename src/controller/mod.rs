//! Recording session controller.
//!
//! The top-level state machine that owns exactly one capture engine handle
//! at a time and sequences the background guard, the duration reconciler,
//! the recovery loop and the lifecycle observer. This is the only surface UI
//! code may call; every failure is communicated through state transitions
//! and the event channel, never by returning errors.

mod controller;
mod recovery;
mod session;

pub use controller::{ControllerDeps, RecordingController};

use crate::error::RecorderError;
use crate::store::Meeting;
use serde::Serialize;

/// Controller states. Exactly one session exists process-wide; a new one may
/// only be created from `Idle` or (after a reset) `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecorderState {
    Idle,
    Starting,
    Recording,
    Stopping,
    Failed,
}

/// Read-only projection of the session for UI consumption.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ControllerSnapshot {
    pub state: RecorderState,
    pub elapsed_millis: u64,
    pub paused: bool,
}

impl ControllerSnapshot {
    pub(crate) fn idle() -> Self {
        Self {
            state: RecorderState::Idle,
            elapsed_millis: 0,
            paused: false,
        }
    }
}

/// Terminal notifications delivered to the UI boundary.
#[derive(Debug)]
pub enum RecorderEvent {
    /// A meeting record was written for the finished session.
    SessionSaved(Meeting),
    /// The session ended with zero captured audio; no record was written.
    NothingCaptured,
    /// A failure that could not be recovered internally.
    Error(RecorderError),
}

/// Why a session is being finalized. Decides the persisted meeting status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FinalizeReason {
    /// Explicit user stop.
    UserStop,
    /// Recovery loop exhausted its restart attempt past the divergence
    /// threshold.
    Interrupted { dead_for_ms: u64 },
    /// The background execution grant was lost and could not be re-acquired.
    GuardLost,
}
