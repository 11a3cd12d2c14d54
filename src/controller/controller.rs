use anyhow::anyhow;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::{mpsc, watch, Mutex};
use tracing::{error, info, warn};

use super::recovery;
use super::session::{Session, SessionClock};
use super::{ControllerSnapshot, FinalizeReason, RecorderEvent, RecorderState};
use crate::config::RecorderConfig;
use crate::engine::{CaptureEngine, EngineHandle};
use crate::error::RecorderError;
use crate::guard::BackgroundGuard;
use crate::lifecycle::LifecycleState;
use crate::reconcile::reconcile_final;
use crate::storage::RecordingStorage;
use crate::store::{MeetingStatus, MeetingStore, NewMeeting};

/// Collaborators the controller sequences. All seams are trait objects so
/// the platform pieces (and the tests) can swap implementations.
pub struct ControllerDeps {
    pub engine: Arc<dyn CaptureEngine>,
    pub guard: Arc<dyn BackgroundGuard>,
    pub store: Arc<dyn MeetingStore>,
    pub storage: Arc<RecordingStorage>,
    pub config: RecorderConfig,
}

pub(super) struct Inner {
    pub state: RecorderState,
    /// A `stop()` arrived while resources were still being acquired; the
    /// start commit releases them instead of entering `Recording`.
    pub start_cancelled: bool,
    pub session: Option<Session>,
}

pub(super) struct ControllerCore {
    pub deps: ControllerDeps,
    pub inner: Mutex<Inner>,
    pub snapshot_tx: watch::Sender<ControllerSnapshot>,
    pub events_tx: mpsc::UnboundedSender<RecorderEvent>,
    pub lifecycle: watch::Receiver<LifecycleState>,
}

/// The only public surface UI code may call.
///
/// None of the methods returns an error or panics: failures land in the
/// `Failed` state (start-time) or a partial-save finalize (mid-session) and
/// are reported through the event channel.
pub struct RecordingController {
    core: Arc<ControllerCore>,
}

impl RecordingController {
    pub fn new(
        deps: ControllerDeps,
        lifecycle: watch::Receiver<LifecycleState>,
    ) -> (Self, mpsc::UnboundedReceiver<RecorderEvent>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (snapshot_tx, _) = watch::channel(ControllerSnapshot::idle());

        let core = Arc::new(ControllerCore {
            deps,
            inner: Mutex::new(Inner {
                state: RecorderState::Idle,
                start_cancelled: false,
                session: None,
            }),
            snapshot_tx,
            events_tx,
            lifecycle,
        });

        (Self { core }, events_rx)
    }

    /// Observe `{state, elapsed_millis, paused}` as it changes.
    pub fn subscribe(&self) -> watch::Receiver<ControllerSnapshot> {
        self.core.snapshot_tx.subscribe()
    }

    pub fn snapshot(&self) -> ControllerSnapshot {
        *self.core.snapshot_tx.borrow()
    }

    /// Begin a new capture session.
    ///
    /// Returns true once a session is recording (including the no-op case
    /// where one already was). Returns false when rejected (`Starting` or
    /// `Stopping` in flight) or when acquisition failed; failures also
    /// transition to `Failed` and emit an error event.
    pub async fn start(&self) -> bool {
        let core = &self.core;

        {
            let mut inner = core.inner.lock().await;
            match inner.state {
                RecorderState::Starting | RecorderState::Stopping => {
                    warn!("Cannot start: controller is {:?}", inner.state);
                    return false;
                }
                RecorderState::Recording => {
                    info!("Already recording");
                    return true;
                }
                RecorderState::Failed => {
                    info!("Resetting failed session before starting");
                    core.force_release_locked(&mut inner).await;
                }
                RecorderState::Idle => {}
            }
            inner.state = RecorderState::Starting;
            inner.start_cancelled = false;
            core.publish_locked(&inner);
        }

        // Acquire resources outside the state lock so a concurrent start()
        // observes `Starting` and is rejected rather than queued behind us;
        // two queued starts would mean two engine handles.
        let acquired = core.acquire_session().await;

        let mut inner = core.inner.lock().await;
        match acquired {
            Err(err) => {
                // Release whatever was partially acquired; the guard release
                // is idempotent even if acquisition never got that far.
                if let Err(e) = core.deps.guard.release().await {
                    warn!("Guard release after failed start: {}", e);
                }

                if inner.start_cancelled {
                    // A stop() arrived mid-acquisition; the caller asked for
                    // Idle, not a Failed state to dig out of.
                    info!("Start cancelled during failed acquisition: {}", err);
                    inner.state = RecorderState::Idle;
                    inner.start_cancelled = false;
                    core.publish_locked(&inner);
                    return false;
                }

                error!("Failed to start recording: {}", err);
                inner.state = RecorderState::Failed;
                core.publish_locked(&inner);
                core.emit(RecorderEvent::Error(err));
                false
            }
            Ok((started_at, mut engine)) => {
                if inner.start_cancelled || inner.state != RecorderState::Starting {
                    info!("Start cancelled mid-acquisition; releasing resources");
                    match engine.stop().await {
                        Ok(temp) => {
                            let _ = core.deps.storage.delete(&temp).await;
                        }
                        Err(e) => warn!("Engine release after cancelled start: {}", e),
                    }
                    if let Err(e) = core.deps.guard.release().await {
                        warn!("Guard release after cancelled start: {}", e);
                    }
                    inner.state = RecorderState::Idle;
                    inner.start_cancelled = false;
                    core.publish_locked(&inner);
                    return false;
                }

                let backgrounded =
                    matches!(*core.lifecycle.borrow(), LifecycleState::Background);

                inner.session = Some(Session {
                    id: uuid::Uuid::new_v4().to_string(),
                    started_at,
                    clock: SessionClock::start(),
                    engine,
                    elapsed_ms: 0,
                    last_engine_ms: 0,
                    paused: false,
                    guard_active: true,
                    interruption_in_progress: false,
                    backgrounded,
                    poll_task: None,
                    lifecycle_task: None,
                });
                inner.state = RecorderState::Recording;
                core.publish_locked(&inner);

                // Both tasks are owned by the session and die with it.
                let poll_task = tokio::spawn(recovery::run(Arc::clone(core)));
                let lifecycle_task =
                    tokio::spawn(run_lifecycle(Arc::clone(core), core.lifecycle.clone()));
                if let Some(session) = inner.session.as_mut() {
                    session.poll_task = Some(poll_task);
                    session.lifecycle_task = Some(lifecycle_task);
                }

                info!("Recording session started");
                true
            }
        }
    }

    /// Suspend capture without ending the session.
    pub async fn pause(&self) {
        let mut inner = self.core.inner.lock().await;
        if inner.state != RecorderState::Recording {
            return;
        }
        let Some(session) = inner.session.as_mut() else {
            return;
        };
        if session.paused || session.interruption_in_progress {
            return;
        }

        let paused = match session.engine.pause().await {
            Ok(()) => {
                session.paused = true;
                session.clock.pause();
                true
            }
            Err(e) => {
                warn!("Failed to pause engine: {}", e);
                false
            }
        };

        if paused {
            info!("Recording paused");
            self.core.publish_locked(&inner);
        }
    }

    /// Resume a paused capture, rebasing the wall clock past the gap.
    pub async fn resume(&self) {
        let mut inner = self.core.inner.lock().await;
        if inner.state != RecorderState::Recording {
            return;
        }
        let Some(session) = inner.session.as_mut() else {
            return;
        };
        if !session.paused || session.interruption_in_progress {
            return;
        }

        let resumed = match session.engine.resume().await {
            Ok(()) => {
                session.paused = false;
                session.clock.resume();
                true
            }
            Err(e) => {
                warn!("Failed to resume engine: {}", e);
                false
            }
        };

        if resumed {
            info!("Recording resumed");
            self.core.publish_locked(&inner);
        }
    }

    /// End the session, persisting whatever was captured.
    pub async fn stop(&self) {
        let core = &self.core;
        let mut inner = core.inner.lock().await;

        match inner.state {
            RecorderState::Stopping => {
                warn!("Already stopping");
            }
            RecorderState::Starting => {
                info!("Stop requested while starting; cancelling start");
                inner.start_cancelled = true;
            }
            RecorderState::Recording => {
                let already_finalizing = inner
                    .session
                    .as_ref()
                    .map(|s| s.interruption_in_progress)
                    .unwrap_or(false);
                if already_finalizing {
                    info!("Finalize already in progress");
                    return;
                }
                if let Some(session) = inner.session.as_mut() {
                    session.interruption_in_progress = true;
                }
                core.finalize_locked(&mut inner, FinalizeReason::UserStop).await;
            }
            RecorderState::Idle | RecorderState::Failed => {
                // Nothing to persist; just make sure no resource lingers.
                core.force_release_locked(&mut inner).await;
            }
        }
    }

    /// Force-release all resources and return to `Idle`, regardless of the
    /// prior failure cause. Captured audio (if any) is discarded.
    pub async fn reset(&self) {
        let mut inner = self.core.inner.lock().await;
        info!("Resetting recording controller");
        self.core.force_release_locked(&mut inner).await;
    }
}

impl ControllerCore {
    pub(super) fn emit(&self, event: RecorderEvent) {
        // Best-effort: the UI boundary may have gone away.
        let _ = self.events_tx.send(event);
    }

    pub(super) fn publish_locked(&self, inner: &Inner) {
        let snapshot = match inner.session.as_ref() {
            Some(session) => ControllerSnapshot {
                state: inner.state,
                elapsed_millis: session.elapsed_ms,
                paused: session.paused,
            },
            None => ControllerSnapshot {
                state: inner.state,
                elapsed_millis: 0,
                paused: false,
            },
        };
        self.snapshot_tx.send_replace(snapshot);
    }

    /// Permission, then guard, then engine. Engine creation is retried
    /// with fixed backoff; a capture device may be transiently held by
    /// another process.
    async fn acquire_session(
        &self,
    ) -> Result<(DateTime<Utc>, Box<dyn EngineHandle>), RecorderError> {
        match self.deps.engine.request_permission().await {
            Ok(true) => {}
            Ok(false) => return Err(RecorderError::PermissionDenied),
            Err(e) => {
                warn!("Permission check failed: {}", e);
                return Err(RecorderError::PermissionDenied);
            }
        }

        let started_at = Utc::now();
        match self.deps.guard.acquire(started_at).await {
            Ok(true) => {}
            Ok(false) => return Err(RecorderError::BackgroundGuardUnavailable),
            Err(e) => {
                warn!("Guard acquisition failed: {}", e);
                return Err(RecorderError::BackgroundGuardUnavailable);
            }
        }

        let attempts = self.deps.config.engine_create_attempts.max(1);
        let mut last_err = None;

        for attempt in 1..=attempts {
            match self.deps.engine.create().await {
                Ok(mut engine) => {
                    return match engine.start().await {
                        Ok(()) => Ok((started_at, engine)),
                        Err(e) => Err(RecorderError::EngineStartFailed(e)),
                    };
                }
                Err(e) => {
                    warn!(
                        "Engine create attempt {}/{} failed: {}",
                        attempt, attempts, e
                    );
                    last_err = Some(e);
                    if attempt < attempts {
                        tokio::time::sleep(self.deps.config.engine_create_backoff()).await;
                    }
                }
            }
        }

        Err(RecorderError::EngineCreateFailed {
            attempts,
            cause: last_err.unwrap_or_else(|| anyhow!("engine create failed")),
        })
    }

    /// The single funnel every exit path goes through. Caller must have set
    /// `interruption_in_progress` on the session.
    pub(super) async fn finalize_locked(&self, inner: &mut Inner, reason: FinalizeReason) {
        inner.state = RecorderState::Stopping;
        self.publish_locked(inner);

        let Some(mut session) = inner.session.take() else {
            inner.state = RecorderState::Idle;
            self.publish_locked(inner);
            return;
        };

        session.abort_tasks();

        if let Err(e) = self.deps.guard.release().await {
            warn!("Failed to release background guard: {}", e);
        }
        session.guard_active = false;

        // The engine's account wins at the moment of truth; read it before
        // tearing the handle down.
        let engine_ms = match session.engine.status().await {
            Ok(status) if status.reported_duration_ms > 0 => status.reported_duration_ms,
            _ => session.last_engine_ms,
        };
        let wall_ms = session.clock.wall_elapsed_ms();

        let temp_uri = match session.engine.stop().await {
            Ok(path) => Some(path),
            Err(e) => {
                error!("Engine stop failed during finalize: {}", e);
                None
            }
        };

        let final_ms = reconcile_final(wall_ms, engine_ms);
        info!(
            "Finalizing session {} ({:?}): {}ms captured",
            session.id, reason, final_ms
        );

        if final_ms == 0 {
            if let Some(uri) = temp_uri {
                let _ = self.deps.storage.delete(&uri).await;
            }
            self.emit(RecorderEvent::NothingCaptured);
            inner.state = RecorderState::Idle;
            self.publish_locked(inner);
            return;
        }

        let Some(temp_uri) = temp_uri else {
            self.emit(RecorderEvent::Error(RecorderError::ArtifactRelocationFailed(
                anyhow!("capture engine produced no artifact"),
            )));
            inner.state = RecorderState::Idle;
            self.publish_locked(inner);
            return;
        };

        let permanent = match self.deps.storage.relocate(&temp_uri, &session.id).await {
            Ok(path) => path,
            Err(e) => {
                error!("Artifact relocation failed: {}", e);
                // Never write a record referencing a missing file.
                self.emit(RecorderEvent::Error(RecorderError::ArtifactRelocationFailed(e)));
                inner.state = RecorderState::Idle;
                self.publish_locked(inner);
                return;
            }
        };

        let (status, error_message) = match reason {
            FinalizeReason::UserStop => (MeetingStatus::Recorded, None),
            FinalizeReason::Interrupted { dead_for_ms } => (
                MeetingStatus::RecordedPartial,
                Some(format!(
                    "Recording interrupted; capture was unresponsive for {}ms before forced save",
                    dead_for_ms
                )),
            ),
            FinalizeReason::GuardLost => (
                MeetingStatus::RecordedPartial,
                Some(
                    "Background execution grant lost; audio saved up to the point of failure"
                        .to_string(),
                ),
            ),
        };

        let new = NewMeeting {
            title: format!("Meeting {}", session.started_at.format("%Y-%m-%d %H:%M")),
            duration_sec: final_ms / 1000,
            local_audio_uri: permanent.display().to_string(),
            status,
            error_message,
        };

        match self.deps.store.create(new).await {
            Ok(meeting) => {
                info!("Meeting record written: {} ({:?})", meeting.id, meeting.status);
                self.emit(RecorderEvent::SessionSaved(meeting));
            }
            Err(e) => {
                error!("Failed to write meeting record: {}", e);
                self.emit(RecorderEvent::Error(RecorderError::StoreFailed(e)));
            }
        }

        inner.state = RecorderState::Idle;
        self.publish_locked(inner);
    }

    /// Tear everything down without persisting. Used by `reset()` and by
    /// `stop()` outside a live session.
    pub(super) async fn force_release_locked(&self, inner: &mut Inner) {
        if let Some(mut session) = inner.session.take() {
            session.abort_tasks();
            match session.engine.stop().await {
                Ok(temp) => {
                    let _ = self.deps.storage.delete(&temp).await;
                }
                Err(e) => warn!("Engine release failed during reset: {}", e),
            }
        }

        if let Err(e) = self.deps.guard.release().await {
            warn!("Guard release failed during reset: {}", e);
        }

        inner.state = RecorderState::Idle;
        inner.start_cancelled = false;
        self.publish_locked(inner);
    }
}

/// Watches process lifecycle transitions while a session is live. Each
/// background transition re-verifies the execution guard: continuing to
/// claim the session is healthy while the OS may kill it at any moment
/// would silently lose data.
async fn run_lifecycle(
    core: Arc<ControllerCore>,
    mut rx: watch::Receiver<LifecycleState>,
) {
    loop {
        if rx.changed().await.is_err() {
            break;
        }
        let state = *rx.borrow_and_update();

        let mut inner = core.inner.lock().await;
        if inner.state != RecorderState::Recording {
            break;
        }

        let (started_at, finalizing) = {
            let Some(session) = inner.session.as_mut() else {
                break;
            };
            session.backgrounded = matches!(state, LifecycleState::Background);
            (session.started_at, session.interruption_in_progress)
        };

        if !matches!(state, LifecycleState::Background) {
            continue;
        }

        info!("App backgrounded; re-verifying background guard");

        if core.deps.guard.is_active() {
            continue;
        }

        if matches!(core.deps.guard.acquire(started_at).await, Ok(true)) {
            info!("Background guard re-acquired");
            if let Some(session) = inner.session.as_mut() {
                session.guard_active = true;
            }
            continue;
        }

        if finalizing {
            break;
        }

        warn!("Background guard lost and could not be re-acquired; forcing partial save");
        if let Some(session) = inner.session.as_mut() {
            session.interruption_in_progress = true;
            // Detach our own handle so finalize does not abort the task
            // running it.
            session.lifecycle_task.take();
        }
        core.emit(RecorderEvent::Error(RecorderError::GuardLost));
        core.finalize_locked(&mut inner, FinalizeReason::GuardLost).await;
        break;
    }
}
