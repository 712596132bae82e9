use super::handlers;
use super::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

/// Create the HTTP router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Recording control
        .route("/recordings", post(handlers::start_recording))
        .route(
            "/recordings/:route_id",
            get(handlers::recording_status).delete(handlers::abandon_recording),
        )
        .route(
            "/recordings/:route_id/positions",
            post(handlers::push_position),
        )
        .route("/recordings/:route_id/pause", post(handlers::pause_recording))
        .route(
            "/recordings/:route_id/resume",
            post(handlers::resume_recording),
        )
        .route("/recordings/:route_id/stops", post(handlers::add_stop))
        .route(
            "/recordings/:route_id/finish",
            post(handlers::finish_recording),
        )
        // Stored routes
        .route("/routes", get(handlers::list_routes))
        .route(
            "/routes/:route_id",
            get(handlers::get_route).delete(handlers::delete_route),
        )
        .route("/routes/:route_id/points", get(handlers::list_points))
        .route("/routes/:route_id/stops", get(handlers::list_stops))
        // Playback
        .route(
            "/routes/:route_id/playback",
            post(handlers::open_playback)
                .get(handlers::playback_status)
                .delete(handlers::close_playback),
        )
        .route("/routes/:route_id/playback/play", post(handlers::play))
        .route(
            "/routes/:route_id/playback/pause",
            post(handlers::pause_playback),
        )
        .route("/routes/:route_id/playback/seek", post(handlers::seek))
        .route("/routes/:route_id/playback/speed", post(handlers::set_speed))
        .route(
            "/routes/:route_id/playback/jump",
            post(handlers::jump_to_stop),
        )
        // Add tracing middleware for request logging
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
