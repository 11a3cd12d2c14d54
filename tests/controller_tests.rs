// Integration tests for the recording session controller
//
// All timing runs on tokio's paused test clock, so poll ticks, divergence
// growth and escalation deadlines are exact rather than approximate.

mod common;

use botmr_recorder::{
    BackgroundGuard, MeetingStatus, MeetingStore, RecorderError, RecorderEvent, RecorderState,
};
use common::EngineBehavior;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tokio::time::sleep;

#[tokio::test(start_paused = true)]
async fn test_happy_path_start_pause_resume_stop() {
    let mut h = common::build(EngineBehavior::Healthy);

    assert!(h.controller.start().await);
    assert_eq!(h.controller.snapshot().state, RecorderState::Recording);
    assert!(h.guard.is_active());

    // Two poll ticks land at 2000 and 4000.
    sleep(Duration::from_millis(4100)).await;
    let snapshot = h.controller.snapshot();
    assert_eq!(snapshot.elapsed_millis, 4000);
    assert!(!snapshot.paused);

    h.controller.pause().await;
    assert!(h.controller.snapshot().paused);

    // Paused time must not count toward the session duration.
    sleep(Duration::from_millis(2000)).await;
    h.controller.resume().await;
    assert!(!h.controller.snapshot().paused);

    sleep(Duration::from_millis(1900)).await;
    h.controller.stop().await;

    assert_eq!(h.controller.snapshot().state, RecorderState::Idle);
    assert!(!h.guard.is_active());

    let meetings = h.store.list().await.unwrap();
    assert_eq!(meetings.len(), 1, "exactly one record per session");
    let meeting = &meetings[0];
    assert_eq!(meeting.status, MeetingStatus::Recorded);
    assert_eq!(meeting.duration_sec, 6, "4.1s + 1.9s active, pause excluded");
    assert!(meeting.title.starts_with("Meeting "));
    assert!(meeting.error_message.is_none());
    assert!(
        std::path::Path::new(&meeting.local_audio_uri).exists(),
        "record must reference an existing artifact"
    );

    assert!(matches!(
        h.events.try_recv(),
        Ok(RecorderEvent::SessionSaved(_))
    ));
}

#[tokio::test(start_paused = true)]
async fn test_start_while_recording_is_a_no_op() {
    let mut h = common::build(EngineBehavior::Healthy);

    assert!(h.controller.start().await);
    sleep(Duration::from_millis(1000)).await;

    // Second start succeeds trivially without creating a second session.
    assert!(h.controller.start().await);
    assert_eq!(h.engine.create_calls.load(Ordering::SeqCst), 1);

    sleep(Duration::from_millis(1000)).await;
    h.controller.stop().await;

    assert_eq!(h.store.list().await.unwrap().len(), 1);
    assert!(matches!(
        h.events.try_recv(),
        Ok(RecorderEvent::SessionSaved(_))
    ));
}

#[tokio::test(start_paused = true)]
async fn test_start_while_starting_is_rejected() {
    let h = common::build_with_create_delay(
        EngineBehavior::Healthy,
        Duration::from_millis(500),
    );

    let (first, second) = tokio::join!(h.controller.start(), async {
        // Land inside the first call's resource acquisition.
        sleep(Duration::from_millis(100)).await;
        h.controller.start().await
    });

    assert!(first);
    assert!(!second, "start during STARTING must be rejected");
    assert_eq!(h.controller.snapshot().state, RecorderState::Recording);
    assert_eq!(h.engine.create_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_stop_during_starting_cancels_the_start() {
    let mut h = common::build_with_create_delay(
        EngineBehavior::Healthy,
        Duration::from_millis(1000),
    );

    let (started, _) = tokio::join!(h.controller.start(), async {
        sleep(Duration::from_millis(200)).await;
        h.controller.stop().await;
    });

    assert!(!started, "cancelled start must not report success");
    assert_eq!(h.controller.snapshot().state, RecorderState::Idle);
    assert!(!h.guard.is_active());
    assert_eq!(h.capture_files(), 0, "acquired artifact must be cleaned up");
    assert!(h.store.list().await.unwrap().is_empty());
    assert!(h.events.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn test_engine_create_is_retried_with_backoff() {
    let h = common::build(EngineBehavior::Healthy);
    h.engine.create_failures.store(2, Ordering::SeqCst);

    assert!(h.controller.start().await);
    assert_eq!(h.engine.create_calls.load(Ordering::SeqCst), 3);
    assert_eq!(h.controller.snapshot().state, RecorderState::Recording);
}

#[tokio::test(start_paused = true)]
async fn test_engine_create_exhaustion_fails_the_start() {
    let mut h = common::build(EngineBehavior::Healthy);
    h.engine.create_failures.store(10, Ordering::SeqCst);

    assert!(!h.controller.start().await);
    assert_eq!(h.engine.create_calls.load(Ordering::SeqCst), 3);
    assert_eq!(h.controller.snapshot().state, RecorderState::Failed);
    assert!(!h.guard.is_active(), "guard must not leak on failed start");
    assert!(matches!(
        h.events.try_recv(),
        Ok(RecorderEvent::Error(RecorderError::EngineCreateFailed { attempts: 3, .. }))
    ));
}

#[tokio::test(start_paused = true)]
async fn test_permission_denied_fails_the_start() {
    let mut h = common::build(EngineBehavior::Healthy);
    h.engine.deny_permission.store(true, Ordering::SeqCst);

    assert!(!h.controller.start().await);
    assert_eq!(h.controller.snapshot().state, RecorderState::Failed);
    assert_eq!(
        h.guard.acquires.load(Ordering::SeqCst),
        0,
        "guard must not be touched before permission is granted"
    );
    assert!(matches!(
        h.events.try_recv(),
        Ok(RecorderEvent::Error(RecorderError::PermissionDenied))
    ));

    // A later start from FAILED auto-resets and proceeds.
    h.engine.deny_permission.store(false, Ordering::SeqCst);
    assert!(h.controller.start().await);
    assert_eq!(h.controller.snapshot().state, RecorderState::Recording);
}

#[tokio::test(start_paused = true)]
async fn test_guard_denied_fails_the_start() {
    let mut h = common::build(EngineBehavior::Healthy);
    h.guard.deny_acquire.store(true, Ordering::SeqCst);

    assert!(!h.controller.start().await);
    assert_eq!(h.controller.snapshot().state, RecorderState::Failed);
    assert!(matches!(
        h.events.try_recv(),
        Ok(RecorderEvent::Error(RecorderError::BackgroundGuardUnavailable))
    ));
}

#[tokio::test(start_paused = true)]
async fn test_zero_duration_stop_writes_no_record() {
    let mut h = common::build(EngineBehavior::Healthy);

    assert!(h.controller.start().await);
    h.controller.stop().await;

    assert_eq!(h.controller.snapshot().state, RecorderState::Idle);
    assert!(h.store.list().await.unwrap().is_empty());
    assert_eq!(h.capture_files(), 0, "empty artifact must be deleted");
    assert!(matches!(
        h.events.try_recv(),
        Ok(RecorderEvent::NothingCaptured)
    ));
}

#[tokio::test(start_paused = true)]
async fn test_transient_engine_glitch_recovers_without_partial_record() {
    // The status feed goes dark at 3000ms while capture internally
    // continues; the 4000ms poll tick restarts it in place.
    let mut h = common::build(EngineBehavior::StatusGlitchAt { at_ms: 3000 });

    assert!(h.controller.start().await);
    sleep(Duration::from_millis(8050)).await;
    h.controller.stop().await;

    let meetings = h.store.list().await.unwrap();
    assert_eq!(meetings.len(), 1);
    let meeting = &meetings[0];
    assert_eq!(
        meeting.status,
        MeetingStatus::Recorded,
        "transparent recovery must not mark the session partial"
    );
    assert_eq!(meeting.duration_sec, 8);
    assert!(meeting.error_message.is_none());

    assert!(matches!(
        h.events.try_recv(),
        Ok(RecorderEvent::SessionSaved(_))
    ));
}

#[tokio::test(start_paused = true)]
async fn test_dead_engine_escalates_to_partial_save() {
    // Capture dies at 2500ms. Poll ticks at 4000 and 6000 see divergence
    // below the 5000ms threshold; the 8000ms tick crosses it and forces a
    // finalize with partial persistence.
    let mut h = common::build(EngineBehavior::DiesAt { at_ms: 2500 });

    assert!(h.controller.start().await);
    sleep(Duration::from_millis(8100)).await;

    assert_eq!(h.controller.snapshot().state, RecorderState::Idle);
    assert!(!h.guard.is_active());

    let meetings = h.store.list().await.unwrap();
    assert_eq!(meetings.len(), 1, "exactly one partial record");
    let meeting = &meetings[0];
    assert_eq!(meeting.status, MeetingStatus::RecordedPartial);
    assert_eq!(meeting.duration_sec, 2, "audio up to the failure point");
    let message = meeting.error_message.as_deref().unwrap_or("");
    assert!(
        message.contains("interrupted"),
        "partial record must carry a diagnostic message, got: {}",
        message
    );

    // Diagnostic first, then the partial save itself.
    assert!(matches!(
        h.events.try_recv(),
        Ok(RecorderEvent::Error(RecorderError::InterruptionDetected { dead_for_ms: 5500 }))
    ));
    assert!(matches!(
        h.events.try_recv(),
        Ok(RecorderEvent::SessionSaved(_))
    ));

    // The recovery loop must be gone: no further records, no state churn.
    sleep(Duration::from_millis(4000)).await;
    assert_eq!(h.store.list().await.unwrap().len(), 1);
    assert_eq!(h.controller.snapshot().state, RecorderState::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_backgrounding_reacquires_a_lost_guard() {
    let mut h = common::build(EngineBehavior::Healthy);

    assert!(h.controller.start().await);
    sleep(Duration::from_millis(2050)).await;

    // The OS silently dropped the grant; backgrounding must notice and
    // re-acquire before trusting the session any further.
    h.guard.revoke();
    h.lifecycle
        .transition(botmr_recorder::LifecycleState::Background);
    sleep(Duration::from_millis(50)).await;

    assert_eq!(h.guard.acquires.load(Ordering::SeqCst), 2);
    assert!(h.guard.is_active());
    assert_eq!(h.controller.snapshot().state, RecorderState::Recording);

    sleep(Duration::from_millis(7900)).await;
    h.controller.stop().await;

    let meetings = h.store.list().await.unwrap();
    assert_eq!(meetings.len(), 1);
    assert_eq!(meetings[0].status, MeetingStatus::Recorded);
    assert_eq!(meetings[0].duration_sec, 10);
    assert!(matches!(
        h.events.try_recv(),
        Ok(RecorderEvent::SessionSaved(_))
    ));
}

#[tokio::test(start_paused = true)]
async fn test_unrecoverable_guard_loss_forces_partial_save() {
    let mut h = common::build(EngineBehavior::Healthy);

    assert!(h.controller.start().await);
    sleep(Duration::from_millis(3050)).await;

    h.guard.revoke();
    h.guard.deny_acquire.store(true, Ordering::SeqCst);
    h.lifecycle
        .transition(botmr_recorder::LifecycleState::Background);
    sleep(Duration::from_millis(100)).await;

    assert_eq!(h.controller.snapshot().state, RecorderState::Idle);

    let meetings = h.store.list().await.unwrap();
    assert_eq!(meetings.len(), 1);
    let meeting = &meetings[0];
    assert_eq!(meeting.status, MeetingStatus::RecordedPartial);
    assert_eq!(meeting.duration_sec, 3);
    assert!(meeting
        .error_message
        .as_deref()
        .unwrap_or("")
        .contains("Background execution"));
    assert!(matches!(
        h.events.try_recv(),
        Ok(RecorderEvent::Error(RecorderError::GuardLost))
    ));
    assert!(matches!(
        h.events.try_recv(),
        Ok(RecorderEvent::SessionSaved(_))
    ));
}

#[tokio::test(start_paused = true)]
async fn test_stop_during_failing_start_lands_idle_not_failed() {
    let mut h = common::build(EngineBehavior::Healthy);
    h.engine.create_failures.store(10, Ordering::SeqCst);

    // The stop() lands between create retries; when acquisition finally
    // gives up, the controller must honor the requested Idle rather than
    // parking in Failed.
    let (started, _) = tokio::join!(h.controller.start(), async {
        sleep(Duration::from_millis(200)).await;
        h.controller.stop().await;
    });

    assert!(!started);
    assert_eq!(h.controller.snapshot().state, RecorderState::Idle);
    assert!(!h.guard.is_active());
    assert!(
        h.events.try_recv().is_err(),
        "a cancelled start surfaces no error"
    );
}

#[tokio::test(start_paused = true)]
async fn test_relocation_failure_surfaces_error_without_a_record() {
    let mut h = common::build(EngineBehavior::Healthy);

    // Occupy the recordings root with a plain file so relocation cannot
    // create the directory.
    std::fs::write(h.temp.path().join("recordings"), b"in the way").unwrap();

    assert!(h.controller.start().await);
    sleep(Duration::from_millis(3000)).await;
    h.controller.stop().await;

    assert_eq!(h.controller.snapshot().state, RecorderState::Idle);
    assert!(!h.guard.is_active());
    assert!(
        h.store.list().await.unwrap().is_empty(),
        "no record may reference an artifact that was never relocated"
    );
    assert!(matches!(
        h.events.try_recv(),
        Ok(RecorderEvent::Error(RecorderError::ArtifactRelocationFailed(_)))
    ));
}

#[tokio::test(start_paused = true)]
async fn test_reset_discards_a_live_session() {
    let mut h = common::build(EngineBehavior::Healthy);

    assert!(h.controller.start().await);
    sleep(Duration::from_millis(1000)).await;
    h.controller.reset().await;

    assert_eq!(h.controller.snapshot().state, RecorderState::Idle);
    assert!(!h.guard.is_active());
    assert!(h.store.list().await.unwrap().is_empty(), "reset never persists");
    assert_eq!(h.capture_files(), 0);
    assert!(h.events.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn test_stop_when_idle_is_harmless() {
    let mut h = common::build(EngineBehavior::Healthy);

    h.controller.stop().await;

    assert_eq!(h.controller.snapshot().state, RecorderState::Idle);
    assert!(h.store.list().await.unwrap().is_empty());
    assert!(h.events.try_recv().is_err());
}
