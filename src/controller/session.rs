use chrono::{DateTime, Utc};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::engine::EngineHandle;

/// The session context threaded through the controller's transitions.
///
/// Owned exclusively by the controller's inner state; created on `start()`,
/// destroyed when the state returns to `Idle`. Never outlives one capture
/// attempt. Timers (the poll and lifecycle tasks) live and die with it.
pub(crate) struct Session {
    pub id: String,
    pub started_at: DateTime<Utc>,
    pub clock: SessionClock,
    pub engine: Box<dyn EngineHandle>,

    /// Last reconciled duration; non-decreasing while recording.
    pub elapsed_ms: u64,
    /// Last nonzero engine-reported duration. The recovery loop compares
    /// wall clock against this to judge how long capture has been dead.
    pub last_engine_ms: u64,

    pub paused: bool,
    pub guard_active: bool,
    /// At most one recovery/finalize sequence may run; this flag is the
    /// mutual exclusion between user stop and auto-escalation.
    pub interruption_in_progress: bool,
    pub backgrounded: bool,

    pub poll_task: Option<JoinHandle<()>>,
    pub lifecycle_task: Option<JoinHandle<()>>,
}

impl Session {
    /// Abort any tasks still attached to the session. Called on every
    /// transition out of `Recording`; a leaked timer re-entering a torn-down
    /// session is the failure mode this exists to prevent.
    pub fn abort_tasks(&mut self) {
        if let Some(task) = self.poll_task.take() {
            task.abort();
        }
        if let Some(task) = self.lifecycle_task.take() {
            task.abort();
        }
    }
}

/// Wall-clock account of elapsed capture time, exclusive of pauses.
///
/// Continuously available where the engine's report is not; rebased whenever
/// the reconciler accepts the engine's account so the two stay aligned.
pub(crate) struct SessionClock {
    origin: Instant,
    paused_accum: Duration,
    pause_started: Option<Instant>,
}

impl SessionClock {
    pub fn start() -> Self {
        Self {
            origin: Instant::now(),
            paused_accum: Duration::ZERO,
            pause_started: None,
        }
    }

    pub fn wall_elapsed_ms(&self) -> u64 {
        let paused = match self.pause_started {
            Some(since) => self.paused_accum + since.elapsed(),
            None => self.paused_accum,
        };
        self.origin
            .elapsed()
            .saturating_sub(paused)
            .as_millis() as u64
    }

    pub fn pause(&mut self) {
        if self.pause_started.is_none() {
            self.pause_started = Some(Instant::now());
        }
    }

    pub fn resume(&mut self) {
        if let Some(since) = self.pause_started.take() {
            self.paused_accum += since.elapsed();
        }
    }

    /// Rebase the origin so the wall clock reads `engine_ms` right now.
    /// Only meaningful while actively recording (not paused).
    pub fn rebase_to(&mut self, engine_ms: u64) {
        self.origin = Instant::now() - Duration::from_millis(engine_ms) - self.paused_accum;
    }
}
