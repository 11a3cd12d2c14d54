//! HTTP API server for external control (the recorder UI)
//!
//! This module provides a REST API over the recording controller and the
//! meeting store:
//! - POST /recorder/start - Start a recording session
//! - POST /recorder/pause - Pause capture
//! - POST /recorder/resume - Resume capture
//! - POST /recorder/stop - Stop and persist the session
//! - POST /recorder/reset - Force-release all resources
//! - GET /recorder/status - Current controller snapshot
//! - GET /meetings - List meeting records, newest first
//! - GET /meetings/:id - Fetch one meeting record
//! - PATCH /meetings/:id - Rename a meeting
//! - DELETE /meetings/:id - Delete a meeting record
//! - GET /health - Health check

mod handlers;
mod routes;
mod state;

pub use routes::create_router;
pub use state::AppState;
