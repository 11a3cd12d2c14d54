//! Background execution guard.
//!
//! Holds the OS-granted lease that keeps the process alive while capturing
//! with the app out of the foreground. On platforms that require it the
//! lease is realized as a persistent, user-visible notification with
//! foreground-service semantics; elsewhere the guard is a no-op.

mod notification;

pub use notification::{ForegroundServiceGuard, NotificationPoster};

use anyhow::Result;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};

/// The single owner of the background-execution lease.
///
/// Idempotent by contract: `acquire` while active returns true without
/// re-displaying anything, `release` while inactive is a no-op.
#[async_trait::async_trait]
pub trait BackgroundGuard: Send + Sync {
    /// Acquire the lease. `Ok(false)` means the OS denied it, which is fatal
    /// to starting a session on platforms that require the lease.
    async fn acquire(&self, started_at: DateTime<Utc>) -> Result<bool>;

    /// Refresh the user-visible side of the lease with the current elapsed
    /// capture time.
    async fn renew(&self, elapsed_ms: u64) -> Result<()>;

    /// Release the lease.
    async fn release(&self) -> Result<()>;

    /// Whether the lease is currently held.
    fn is_active(&self) -> bool;
}

/// Guard for platforms with no background-execution requirement.
pub struct NoopGuard {
    active: AtomicBool,
}

impl NoopGuard {
    pub fn new() -> Self {
        Self {
            active: AtomicBool::new(false),
        }
    }
}

impl Default for NoopGuard {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl BackgroundGuard for NoopGuard {
    async fn acquire(&self, _started_at: DateTime<Utc>) -> Result<bool> {
        self.active.store(true, Ordering::SeqCst);
        Ok(true)
    }

    async fn renew(&self, _elapsed_ms: u64) -> Result<()> {
        Ok(())
    }

    async fn release(&self) -> Result<()> {
        self.active.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}
