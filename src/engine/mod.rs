//! Capture engine adapter.
//!
//! Wraps the platform audio-capture primitive behind a uniform contract.
//! The adapter knows nothing about sessions: the controller owns exactly one
//! handle at a time and drives it through the `EngineHandle` trait.

mod wav;

pub use wav::WavCaptureEngine;

use anyhow::Result;
use std::path::PathBuf;

/// Audio sample data (16-bit PCM, interleaved).
#[derive(Debug, Clone)]
pub struct AudioFrame {
    /// Raw audio samples (i16 PCM, interleaved)
    pub samples: Vec<i16>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of channels
    pub channels: u16,
    /// Timestamp in milliseconds since capture started
    pub timestamp_ms: u64,
}

/// A point-in-time report from the capture engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineStatus {
    /// Whether the engine believes it is actively capturing.
    pub is_active: bool,
    /// The engine's own account of captured duration. May be stale or zero
    /// immediately after a restart or while backgrounded.
    pub reported_duration_ms: u64,
}

/// Factory seam for the platform capture primitive.
///
/// `create()` may fail transiently (the capture device can be held by
/// another process); retry policy belongs to the caller.
#[async_trait::async_trait]
pub trait CaptureEngine: Send + Sync {
    /// Ask the platform for capture permission. `Ok(false)` means the user
    /// declined.
    async fn request_permission(&self) -> Result<bool>;

    /// Create a new capture handle. At most one handle may be live at a time.
    async fn create(&self) -> Result<Box<dyn EngineHandle>>;
}

/// An exclusive handle to one in-progress capture.
#[async_trait::async_trait]
pub trait EngineHandle: Send {
    /// Begin capturing.
    async fn start(&mut self) -> Result<()>;

    /// Suspend capture without releasing the handle.
    async fn pause(&mut self) -> Result<()>;

    /// Resume a suspended (or silently stopped) capture on the same handle.
    async fn resume(&mut self) -> Result<()>;

    /// Finalize the capture and release the handle. Returns the URI of the
    /// temporary artifact holding whatever audio was captured.
    async fn stop(&mut self) -> Result<PathBuf>;

    /// Poll the engine's view of the capture.
    async fn status(&self) -> Result<EngineStatus>;
}
