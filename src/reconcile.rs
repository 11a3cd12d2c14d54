//! Duration reconciliation policy.
//!
//! Two independent accounts of elapsed time exist while recording: the wall
//! clock (continuously available, drifts across pauses and restarts) and the
//! engine's reported duration (authoritative for what audio actually exists,
//! but intermittently stale, notably right after backgrounding or an engine
//! restart). These pure functions merge the two.

/// Result of reconciling the two duration sources while recording is live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiveDuration {
    /// Engine and wall clock agree within tolerance. The engine value is
    /// authoritative; the caller should rebase its wall-clock origin so
    /// future computations stay aligned.
    Aligned { authoritative_ms: u64 },

    /// The sources diverge (or the engine reports nothing). The wall clock
    /// drives live display; `possible_stop` flags divergence at or beyond
    /// tolerance for the recovery loop.
    Diverged { display_ms: u64, possible_stop: bool },
}

impl LiveDuration {
    /// The value a live UI should show for this reconciliation.
    pub fn display_ms(&self) -> u64 {
        match *self {
            LiveDuration::Aligned { authoritative_ms } => authoritative_ms,
            LiveDuration::Diverged { display_ms, .. } => display_ms,
        }
    }
}

/// Merge wall-clock and engine-reported elapsed time for live consumption.
///
/// `tolerance_ms` is policy, not a load-bearing constant (default 3000).
pub fn reconcile_live(wall_ms: u64, engine_ms: u64, tolerance_ms: u64) -> LiveDuration {
    let divergence = wall_ms.abs_diff(engine_ms);

    if engine_ms > 0 && divergence < tolerance_ms {
        LiveDuration::Aligned {
            authoritative_ms: engine_ms,
        }
    } else {
        LiveDuration::Diverged {
            display_ms: wall_ms,
            possible_stop: divergence >= tolerance_ms,
        }
    }
}

/// Final duration at stop time.
///
/// The engine's account reflects the codec's view of captured samples, so it
/// wins whenever it reports anything at all; the wall clock is only a
/// fallback for an engine that genuinely reports nothing.
pub fn reconcile_final(wall_ms: u64, engine_ms: u64) -> u64 {
    if engine_ms > 0 {
        engine_ms
    } else {
        wall_ms
    }
}
