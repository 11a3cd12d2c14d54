use anyhow::Result;
use tokio::sync::RwLock;

use super::{Meeting, MeetingPatch, MeetingStore, NewMeeting};

/// In-memory meeting store for tests and demos.
#[derive(Default)]
pub struct MemoryMeetingStore {
    meetings: RwLock<Vec<Meeting>>,
}

impl MemoryMeetingStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl MeetingStore for MemoryMeetingStore {
    async fn create(&self, new: NewMeeting) -> Result<Meeting> {
        let meeting = Meeting::from_new(new);
        let mut meetings = self.meetings.write().await;
        meetings.insert(0, meeting.clone());
        Ok(meeting)
    }

    async fn update(&self, id: &str, patch: MeetingPatch) -> Result<Option<Meeting>> {
        let mut meetings = self.meetings.write().await;
        match meetings.iter_mut().find(|m| m.id == id) {
            Some(meeting) => {
                meeting.apply(patch);
                Ok(Some(meeting.clone()))
            }
            None => Ok(None),
        }
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
        Ok(meetings.len() < before)
    }
}
