//! App lifecycle observer.
//!
//! Publishes foreground/background transitions of the host process. The
//! controller subscribes only while a session is live; the feed drives both
//! the recovery loop's poll cadence and the background-guard re-check.

use tokio::sync::watch;

/// Process visibility states as reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// App is in the foreground and interactive.
    Active,
    /// App is visible but not receiving input (transitioning).
    Inactive,
    /// App is fully backgrounded; the OS may reclaim it at any time.
    Background,
}

/// Broadcast source for lifecycle transitions.
pub struct AppLifecycle {
    tx: watch::Sender<LifecycleState>,
}

impl AppLifecycle {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(LifecycleState::Active);
        Self { tx }
    }

    /// Feed a platform transition into the observer.
    pub fn transition(&self, state: LifecycleState) {
        self.tx.send_replace(state);
    }

    pub fn subscribe(&self) -> watch::Receiver<LifecycleState> {
        self.tx.subscribe()
    }

    pub fn current(&self) -> LifecycleState {
        *self.tx.borrow()
    }
}

impl Default for AppLifecycle {
    fn default() -> Self {
        Self::new()
    }
}
