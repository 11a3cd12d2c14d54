use anyhow::Result;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{info, warn};

use super::BackgroundGuard;

const NOTIFICATION_ID: &str = "recording-status";
const NOTIFICATION_TITLE: &str = "BotMR is recording audio";

/// Platform seam for the persistent notification that carries the
/// foreground-execution grant.
#[async_trait::async_trait]
pub trait NotificationPoster: Send + Sync {
    /// Display or update the ongoing notification. Posting with
    /// foreground-service semantics is what holds the execution grant.
    async fn post(&self, id: &str, title: &str, body: &str) -> Result<()>;

    /// Remove the notification, releasing the grant.
    async fn cancel(&self, id: &str) -> Result<()>;
}

/// Background guard backed by a persistent notification.
///
/// Single-purpose and stateful: the `active` flag is the only record of
/// whether the grant is held, and the controller is its only owner.
pub struct ForegroundServiceGuard<P: NotificationPoster> {
    poster: P,
    active: AtomicBool,
}

impl<P: NotificationPoster> ForegroundServiceGuard<P> {
    pub fn new(poster: P) -> Self {
        Self {
            poster,
            active: AtomicBool::new(false),
        }
    }

    fn body(elapsed_ms: u64) -> String {
        let total_secs = elapsed_ms / 1000;
        let minutes = total_secs / 60;
        let seconds = total_secs % 60;
        format!("Tap to return — {}:{:02}", minutes, seconds)
    }
}

#[async_trait::async_trait]
impl<P: NotificationPoster> BackgroundGuard for ForegroundServiceGuard<P> {
    async fn acquire(&self, started_at: DateTime<Utc>) -> Result<bool> {
        if self.active.load(Ordering::SeqCst) {
            // Already held; do not re-display.
            return Ok(true);
        }

        let elapsed_ms = (Utc::now() - started_at).num_milliseconds().max(0) as u64;

        match self
            .poster
            .post(NOTIFICATION_ID, NOTIFICATION_TITLE, &Self::body(elapsed_ms))
            .await
        {
            Ok(()) => {
                self.active.store(true, Ordering::SeqCst);
                info!("Background execution guard acquired");
                Ok(true)
            }
            Err(e) => {
                warn!("Background execution guard denied: {}", e);
                Ok(false)
            }
        }
    }

    async fn renew(&self, elapsed_ms: u64) -> Result<()> {
        if !self.active.load(Ordering::SeqCst) {
            return Ok(());
        }

        self.poster
            .post(NOTIFICATION_ID, NOTIFICATION_TITLE, &Self::body(elapsed_ms))
            .await
    }

    async fn release(&self) -> Result<()> {
        if !self.active.load(Ordering::SeqCst) {
            return Ok(());
        }

        self.active.store(false, Ordering::SeqCst);

        if let Err(e) = self.poster.cancel(NOTIFICATION_ID).await {
            // The grant is considered released either way; the notification
            // will be cleaned up when the process exits.
            warn!("Failed to cancel guard notification: {}", e);
        } else {
            info!("Background execution guard released");
        }

        Ok(())
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}
