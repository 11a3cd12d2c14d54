use crate::controller::RecordingController;
use crate::store::MeetingStore;
use std::sync::Arc;

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub controller: Arc<RecordingController>,
    pub store: Arc<dyn MeetingStore>,
}

impl AppState {
    pub fn new(controller: Arc<RecordingController>, store: Arc<dyn MeetingStore>) -> Self {
        Self { controller, store }
    }
}
