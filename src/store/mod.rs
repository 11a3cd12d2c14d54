//! Meeting record store.
//!
//! External persistence boundary for session metadata. The controller is a
//! writer, not an owner: it creates exactly one record per exit path that
//! produced audio, and downstream processing (transcription, summaries)
//! advances the record's status later.

mod json;
mod memory;

pub use json::JsonMeetingStore;
pub use memory::MemoryMeetingStore;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Terminal and pipeline states of a meeting record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeetingStatus {
    /// Complete capture from an explicit user stop.
    Recorded,
    /// Interrupted capture; audio up to the failure point was kept.
    RecordedPartial,
    Processing,
    Completed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Meeting {
    pub id: String,
    pub title: String,
    pub duration_sec: u64,
    pub status: MeetingStatus,
    pub local_audio_uri: String,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for `MeetingStore::create`. The id and timestamps are generated at
/// save time.
#[derive(Debug, Clone)]
pub struct NewMeeting {
    pub title: String,
    pub duration_sec: u64,
    pub local_audio_uri: String,
    pub status: MeetingStatus,
    pub error_message: Option<String>,
}

/// Partial update for `MeetingStore::update`. Unset fields are left as-is.
#[derive(Debug, Clone, Default)]
pub struct MeetingPatch {
    pub title: Option<String>,
    pub duration_sec: Option<u64>,
    pub status: Option<MeetingStatus>,
    pub local_audio_uri: Option<String>,
    pub error_message: Option<String>,
}

#[async_trait::async_trait]
pub trait MeetingStore: Send + Sync {
    async fn create(&self, new: NewMeeting) -> Result<Meeting>;

    /// Apply a partial update. Returns `None` when no record matches.
    async fn update(&self, id: &str, patch: MeetingPatch) -> Result<Option<Meeting>>;

    async fn get(&self, id: &str) -> Result<Option<Meeting>>;

    /// All meetings, newest first.
    async fn list(&self) -> Result<Vec<Meeting>>;

    async fn delete(&self, id: &str) -> Result<bool>;
}

impl Meeting {
    pub(crate) fn from_new(new: NewMeeting) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            title: new.title,
            duration_sec: new.duration_sec,
            status: new.status,
            local_audio_uri: new.local_audio_uri,
            error_message: new.error_message,
            created_at: now,
            updated_at: now,
        }
    }

    pub(crate) fn apply(&mut self, patch: MeetingPatch) {
        if let Some(title) = patch.title {
            self.title = title;
        }
        if let Some(duration_sec) = patch.duration_sec {
            self.duration_sec = duration_sec;
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(uri) = patch.local_audio_uri {
            self.local_audio_uri = uri;
        }
        if let Some(message) = patch.error_message {
            self.error_message = Some(message);
        }
        self.updated_at = Utc::now();
    }
}
