use super::state::AppState;
use crate::controller::ControllerSnapshot;
use crate::store::MeetingPatch;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct RecorderResponse {
    pub accepted: bool,
    #[serde(flatten)]
    pub snapshot: ControllerSnapshot,
}

#[derive(Debug, Deserialize)]
pub struct RenameMeetingRequest {
    pub title: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /recorder/start
/// Start a recording session
pub async fn start_recording(State(state): State<AppState>) -> impl IntoResponse {
    info!("HTTP start requested");

    let accepted = state.controller.start().await;
    let snapshot = state.controller.snapshot();

    let status = if accepted {
        StatusCode::OK
    } else {
        // Rejected (start/stop in flight) or acquisition failed; the
        // snapshot tells the caller which.
        StatusCode::CONFLICT
    };

    (status, Json(RecorderResponse { accepted, snapshot }))
}

/// POST /recorder/pause
pub async fn pause_recording(State(state): State<AppState>) -> impl IntoResponse {
    state.controller.pause().await;
    Json(state.controller.snapshot())
}

/// POST /recorder/resume
pub async fn resume_recording(State(state): State<AppState>) -> impl IntoResponse {
    state.controller.resume().await;
    Json(state.controller.snapshot())
}

/// POST /recorder/stop
/// Stop and persist the current session
pub async fn stop_recording(State(state): State<AppState>) -> impl IntoResponse {
    info!("HTTP stop requested");
    state.controller.stop().await;
    Json(state.controller.snapshot())
}

/// POST /recorder/reset
/// Force-release all recording resources
pub async fn reset_recorder(State(state): State<AppState>) -> impl IntoResponse {
    info!("HTTP reset requested");
    state.controller.reset().await;
    Json(state.controller.snapshot())
}

/// GET /recorder/status
pub async fn get_recorder_status(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.controller.snapshot())
}

/// GET /meetings
/// List meeting records, newest first
pub async fn list_meetings(State(state): State<AppState>) -> impl IntoResponse {
    match state.store.list().await {
        Ok(meetings) => (StatusCode::OK, Json(meetings)).into_response(),
        Err(e) => {
            error!("Failed to list meetings: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: format!("Failed to list meetings: {}", e),
                }),
            )
                .into_response()
        }
    }
}

/// GET /meetings/:meeting_id
pub async fn get_meeting(
    State(state): State<AppState>,
    Path(meeting_id): Path<String>,
) -> impl IntoResponse {
    match state.store.get(&meeting_id).await {
        Ok(Some(meeting)) => (StatusCode::OK, Json(meeting)).into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: format!("Meeting {} not found", meeting_id),
            }),
        )
            .into_response(),
        Err(e) => {
            error!("Failed to fetch meeting {}: {}", meeting_id, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: format!("Failed to fetch meeting: {}", e),
                }),
            )
                .into_response()
        }
    }
}

/// PATCH /meetings/:meeting_id
/// Rename a meeting
pub async fn rename_meeting(
    State(state): State<AppState>,
    Path(meeting_id): Path<String>,
    Json(req): Json<RenameMeetingRequest>,
) -> impl IntoResponse {
    let patch = MeetingPatch {
        title: Some(req.title),
        ..Default::default()
    };

    match state.store.update(&meeting_id, patch).await {
        Ok(Some(meeting)) => {
            info!("Meeting {} renamed", meeting_id);
            (StatusCode::OK, Json(meeting)).into_response()
        }
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: format!("Meeting {} not found", meeting_id),
            }),
        )
            .into_response(),
        Err(e) => {
            error!("Failed to update meeting {}: {}", meeting_id, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: format!("Failed to update meeting: {}", e),
                }),
            )
                .into_response()
        }
    }
}

/// DELETE /meetings/:meeting_id
pub async fn delete_meeting(
    State(state): State<AppState>,
    Path(meeting_id): Path<String>,
) -> impl IntoResponse {
    match state.store.delete(&meeting_id).await {
        Ok(true) => {
            info!("Meeting {} deleted", meeting_id);
            StatusCode::NO_CONTENT.into_response()
        }
        Ok(false) => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: format!("Meeting {} not found", meeting_id),
            }),
        )
            .into_response(),
        Err(e) => {
            error!("Failed to delete meeting {}: {}", meeting_id, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: format!("Failed to delete meeting: {}", e),
                }),
            )
                .into_response()
        }
    }
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
