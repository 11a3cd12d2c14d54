//! Interruption detector and recovery loop.
//!
//! A cancellable task tied 1:1 to the `Recording` state's lifetime. Each
//! tick polls engine status, reconciles the live duration, refreshes the
//! background guard's notification and classifies divergence. An unexpected
//! engine stop gets one in-place restart attempt; once the wall clock has
//! run ahead of the engine's last known account by more than the escalation
//! threshold, the loop forces a finalize with partial persistence instead of
//! silently losing audio.

use std::sync::Arc;
use tracing::{info, warn};

use super::controller::ControllerCore;
use super::{FinalizeReason, RecorderEvent, RecorderState};
use crate::engine::EngineStatus;
use crate::error::RecorderError;
use crate::reconcile::{reconcile_live, LiveDuration};

/// What a poll tick saw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TickAction {
    /// Engine active, or capture deliberately paused.
    Healthy,
    /// Engine inactive without a pause: unexpected stop. Carries how far the
    /// wall clock has run ahead of the engine's last known account.
    AttemptRestart { divergence_ms: u64 },
}

pub(crate) fn classify_tick(
    status: EngineStatus,
    paused: bool,
    wall_ms: u64,
    last_engine_ms: u64,
) -> TickAction {
    if status.is_active || paused {
        TickAction::Healthy
    } else {
        TickAction::AttemptRestart {
            divergence_ms: wall_ms.saturating_sub(last_engine_ms),
        }
    }
}

/// Whether a failed restart at this divergence forces termination. Capture
/// that has plausibly been dead past the threshold is not worth waiting on:
/// the OS may kill the process at any moment and take the audio with it.
pub(crate) fn should_escalate(divergence_ms: u64, threshold_ms: u64) -> bool {
    divergence_ms >= threshold_ms
}

pub(super) async fn run(core: Arc<ControllerCore>) {
    loop {
        let interval = {
            let inner = core.inner.lock().await;
            if inner.state != RecorderState::Recording {
                break;
            }
            match inner.session.as_ref() {
                Some(session) => core.deps.config.poll_interval(session.backgrounded),
                None => break,
            }
        };

        tokio::time::sleep(interval).await;

        let mut inner = core.inner.lock().await;
        if inner.state != RecorderState::Recording {
            break;
        }

        let tolerance = core.deps.config.divergence_tolerance_ms;
        let threshold = core.deps.config.escalation_threshold_ms;

        // Read status and reconcile under the state lock so the tick is
        // atomic with respect to user-initiated transitions.
        let (elapsed_ms, guard_active, action) = {
            let Some(session) = inner.session.as_mut() else {
                break;
            };

            if session.interruption_in_progress {
                // Another finalize sequence is running; this tick is a no-op.
                continue;
            }

            let status = match session.engine.status().await {
                Ok(status) => status,
                Err(e) => {
                    warn!("Engine status read failed: {}", e);
                    EngineStatus {
                        is_active: false,
                        reported_duration_ms: 0,
                    }
                }
            };

            let wall_ms = session.clock.wall_elapsed_ms();
            match reconcile_live(wall_ms, status.reported_duration_ms, tolerance) {
                LiveDuration::Aligned { authoritative_ms } => {
                    // A stale report from an inactive engine must not rebase
                    // the wall clock: the wall clock running ahead of the
                    // frozen engine account is exactly how dead capture time
                    // is measured.
                    if status.is_active {
                        session.clock.rebase_to(authoritative_ms);
                    }
                    session.elapsed_ms = session.elapsed_ms.max(authoritative_ms);
                }
                LiveDuration::Diverged {
                    display_ms,
                    possible_stop,
                } => {
                    session.elapsed_ms = session.elapsed_ms.max(display_ms);
                    if possible_stop {
                        warn!(
                            "Engine duration stale: wall={}ms engine={}ms",
                            wall_ms, status.reported_duration_ms
                        );
                    }
                }
            }

            if status.reported_duration_ms > 0 {
                session.last_engine_ms = status.reported_duration_ms;
            }

            (
                session.elapsed_ms,
                session.guard_active,
                classify_tick(status, session.paused, wall_ms, session.last_engine_ms),
            )
        };

        core.publish_locked(&inner);

        if guard_active {
            if let Err(e) = core.deps.guard.renew(elapsed_ms).await {
                warn!("Failed to renew background guard: {}", e);
            }
        }

        if let TickAction::AttemptRestart { divergence_ms } = action {
            warn!(
                "Unexpected engine stop detected ({}ms behind wall clock)",
                divergence_ms
            );

            let restarted = {
                let Some(session) = inner.session.as_mut() else {
                    break;
                };
                match session.engine.resume().await {
                    Ok(()) => {
                        let rebase_ms = session.last_engine_ms;
                        session.clock.rebase_to(rebase_ms);
                        true
                    }
                    Err(e) => {
                        warn!("In-place engine restart failed: {}", e);
                        false
                    }
                }
            };

            if restarted {
                info!("Engine restart succeeded; recovery was transparent");
            } else if should_escalate(divergence_ms, threshold) {
                if let Some(session) = inner.session.as_mut() {
                    session.interruption_in_progress = true;
                    // Detach our own handle so finalize does not abort the
                    // task that is running it.
                    session.poll_task.take();
                }
                core.emit(RecorderEvent::Error(RecorderError::InterruptionDetected {
                    dead_for_ms: divergence_ms,
                }));
                core.finalize_locked(
                    &mut inner,
                    FinalizeReason::Interrupted {
                        dead_for_ms: divergence_ms,
                    },
                )
                .await;
                break;
            }
            // Below the threshold: keep polling; divergence will grow until
            // either the engine comes back or escalation triggers.
        }
    }
}
