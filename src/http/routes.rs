use super::handlers;
use super::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Create the HTTP router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Recorder control
        .route("/recorder/start", post(handlers::start_recording))
        .route("/recorder/pause", post(handlers::pause_recording))
        .route("/recorder/resume", post(handlers::resume_recording))
        .route("/recorder/stop", post(handlers::stop_recording))
        .route("/recorder/reset", post(handlers::reset_recorder))
        .route("/recorder/status", get(handlers::get_recorder_status))
        // Meeting records
        .route("/meetings", get(handlers::list_meetings))
        .route(
            "/meetings/:meeting_id",
            get(handlers::get_meeting)
                .patch(handlers::rename_meeting)
                .delete(handlers::delete_meeting),
        )
        // The UI is served from a different origin in development
        .layer(CorsLayer::permissive())
        // Add tracing middleware for request logging
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
