use anyhow::{Context, Result};
use std::path::PathBuf;
use tokio::sync::RwLock;
use tracing::info;

use super::{Meeting, MeetingPatch, MeetingStore, NewMeeting};

/// Meeting store persisted as a single JSON file.
///
/// The full record list is rewritten on every mutation; meeting metadata is
/// small and the write keeps the on-disk copy consistent with memory.
pub struct JsonMeetingStore {
    path: PathBuf,
    meetings: RwLock<Vec<Meeting>>,
}

impl JsonMeetingStore {
    /// Open the store, loading any existing records.
    pub fn open(path: PathBuf) -> Result<Self> {
        let meetings: Vec<Meeting> = if path.exists() {
            let data = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read meeting store: {:?}", path))?;
            serde_json::from_str(&data)
                .with_context(|| format!("failed to parse meeting store: {:?}", path))?
        } else {
            Vec::new()
        };

        info!("Meeting store opened: {:?} ({} records)", path, meetings.len());

        Ok(Self {
            path,
            meetings: RwLock::new(meetings),
        })
    }

    fn persist(&self, meetings: &[Meeting]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create store directory: {:?}", parent))?;
            }
        }

        let data = serde_json::to_string_pretty(meetings)?;
        std::fs::write(&self.path, data)
            .with_context(|| format!("failed to write meeting store: {:?}", self.path))?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl MeetingStore for JsonMeetingStore {
    async fn create(&self, new: NewMeeting) -> Result<Meeting> {
        let meeting = Meeting::from_new(new);
        let mut meetings = self.meetings.write().await;
        meetings.insert(0, meeting.clone());
        self.persist(&meetings)?;
        Ok(meeting)
    }

    async fn update(&self, id: &str, patch: MeetingPatch) -> Result<Option<Meeting>> {
        let mut meetings = self.meetings.write().await;
        let updated = match meetings.iter_mut().find(|m| m.id == id) {
            Some(meeting) => {
                meeting.apply(patch);
                Some(meeting.clone())
            }
            None => None,
        };

        if updated.is_some() {
            self.persist(&meetings)?;
        }

        Ok(updated)
    }

    async fn get(&self, id: &str) -> Result<Option<Meeting>> {
        let meetings = self.meetings.read().await;
        Ok(meetings.iter().find(|m| m.id == id).cloned())
    }

    async fn list(&self) -> Result<Vec<Meeting>> {
        let meetings = self.meetings.read().await;
        Ok(meetings.clone())
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let mut meetings = self.meetings.write().await;
        let before = meetings.len();
        meetings.retain(|m| m.id != id);
        let removed = meetings.len() < before;

        if removed {
            self.persist(&meetings)?;
        }

        Ok(removed)
    }
}
