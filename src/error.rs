use thiserror::Error;

/// Failure taxonomy for the recording session controller.
///
/// The controller never returns these from its public surface; they are
/// delivered through the event channel alongside a transition to `Failed`
/// (for start-time failures) or a partial-save finalize (for mid-session
/// failures).
#[derive(Debug, Error)]
pub enum RecorderError {
    /// The user declined the capture permission. Fatal to `start()`.
    #[error("capture permission denied")]
    PermissionDenied,

    /// Engine creation failed after all retry attempts.
    #[error("capture engine creation failed after {attempts} attempts: {cause}")]
    EngineCreateFailed { attempts: u32, cause: anyhow::Error },

    /// Engine was created but refused to begin capturing.
    #[error("capture engine failed to start: {0}")]
    EngineStartFailed(anyhow::Error),

    /// The background execution grant could not be acquired at session start.
    /// Capture must not begin without it: the OS would terminate the process
    /// silently once backgrounded.
    #[error("background execution guard unavailable")]
    BackgroundGuardUnavailable,

    /// The background execution grant was lost mid-session and could not be
    /// re-acquired. Handled identically to an unrecoverable interruption.
    #[error("background execution guard lost mid-session")]
    GuardLost,

    /// Capture stopped unexpectedly and an in-place restart did not bring it
    /// back before the divergence threshold.
    #[error("capture interrupted; engine unresponsive for {dead_for_ms}ms")]
    InterruptionDetected { dead_for_ms: u64 },

    /// The captured artifact could not be moved to durable storage. The
    /// meeting store is left untouched so no record references a missing file.
    #[error("failed to relocate captured audio: {0}")]
    ArtifactRelocationFailed(anyhow::Error),

    /// The meeting store rejected the record write.
    #[error("failed to write meeting record: {0}")]
    StoreFailed(anyhow::Error),
}
