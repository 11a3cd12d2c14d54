pub mod config;
pub mod controller;
pub mod engine;
pub mod error;
pub mod guard;
pub mod http;
pub mod lifecycle;
pub mod reconcile;
pub mod storage;
pub mod store;

pub use config::Config;
pub use controller::{
    ControllerDeps, ControllerSnapshot, RecorderEvent, RecorderState, RecordingController,
};
pub use engine::{AudioFrame, CaptureEngine, EngineHandle, EngineStatus, WavCaptureEngine};
pub use error::RecorderError;
pub use guard::{BackgroundGuard, ForegroundServiceGuard, NoopGuard, NotificationPoster};
pub use http::{create_router, AppState};
pub use lifecycle::{AppLifecycle, LifecycleState};
pub use storage::RecordingStorage;
pub use store::{
    JsonMeetingStore, Meeting, MeetingPatch, MeetingStatus, MeetingStore, MemoryMeetingStore,
    NewMeeting,
};
