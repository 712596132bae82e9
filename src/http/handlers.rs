use super::state::{AppState, LiveRecording};
use crate::error::{RouteError, SensorError};
use crate::geo::LatLng;
use crate::playback::{PlaybackEngine, PlaybackSession, PlaybackSpeed, PlaybackTelemetry};
use crate::recording::{RecordingController, RecordingTelemetry, StopDraft};
use crate::sensor::{ChannelSensor, PositionUpdate};
use crate::store::{Route, RoutePoint, Stop};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ListRoutesQuery {
    pub owner: String,
}

#[derive(Debug, Deserialize)]
pub struct StartRecordingRequest {
    pub owner: String,

    /// Optional route title (defaults to "Route YYYY-MM-DD")
    pub title: Option<String>,
}

/// Either a fix or a sensor error reported by the client device
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum PositionRequest {
    Fix { latitude: f64, longitude: f64 },
    Error { error: SensorError },
}

#[derive(Debug, Deserialize)]
pub struct SeekRequest {
    pub index: usize,
}

#[derive(Debug, Deserialize)]
pub struct SpeedRequest {
    pub multiplier: u32,
}

#[derive(Debug, Deserialize)]
pub struct JumpRequest {
    pub stop: usize,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl IntoResponse for RouteError {
    fn into_response(self) -> Response {
        let status = match &self {
            RouteError::NotFound(_) => StatusCode::NOT_FOUND,
            RouteError::InvalidState(_) => StatusCode::CONFLICT,
            RouteError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            RouteError::Persistence(_) => StatusCode::SERVICE_UNAVAILABLE,
            RouteError::Sensor(_) => StatusCode::BAD_GATEWAY,
        };

        if self.is_recoverable() {
            warn!("Request failed, safe to retry: {}", self);
        } else if status.is_server_error() {
            error!("Request failed: {}", self);
        }

        (
            status,
            Json(ErrorResponse {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}

type ApiResult<T> = Result<Json<T>, RouteError>;

async fn live_recording(state: &AppState, route_id: Uuid) -> Result<LiveRecording, RouteError> {
    state
        .recordings
        .read()
        .await
        .get(&route_id)
        .cloned()
        .ok_or_else(|| RouteError::not_found(format!("no active recording for route {}", route_id)))
}

// ============================================================================
// Stored routes
// ============================================================================

/// GET /routes?owner=
pub async fn list_routes(
    State(state): State<AppState>,
    Query(query): Query<ListRoutesQuery>,
) -> ApiResult<Vec<Route>> {
    Ok(Json(state.store.list_routes(&query.owner).await?))
}

/// GET /routes/:route_id
pub async fn get_route(
    State(state): State<AppState>,
    Path(route_id): Path<Uuid>,
) -> ApiResult<Route> {
    Ok(Json(state.store.get_route(route_id).await?))
}

/// DELETE /routes/:route_id
/// Delete a route with its points, stops and media
pub async fn delete_route(
    State(state): State<AppState>,
    Path(route_id): Path<Uuid>,
) -> Result<StatusCode, RouteError> {
    if state.recordings.read().await.contains_key(&route_id) {
        return Err(RouteError::invalid_state(format!(
            "route {} is still being recorded",
            route_id
        )));
    }

    let playback = state.playbacks.write().await.remove(&route_id);
    if let Some(handle) = playback {
        handle.close().await;
    }

    state.store.delete_route(route_id).await?;
    info!("Deleted route {}", route_id);

    Ok(StatusCode::NO_CONTENT)
}

/// GET /routes/:route_id/points
pub async fn list_points(
    State(state): State<AppState>,
    Path(route_id): Path<Uuid>,
) -> ApiResult<Vec<RoutePoint>> {
    Ok(Json(state.store.list_points(route_id).await?))
}

/// GET /routes/:route_id/stops
pub async fn list_stops(
    State(state): State<AppState>,
    Path(route_id): Path<Uuid>,
) -> ApiResult<Vec<Stop>> {
    Ok(Json(state.store.list_stops(route_id).await?))
}

// ============================================================================
// Recording
// ============================================================================

/// POST /recordings
/// Start a new recording fed through /recordings/:route_id/positions
pub async fn start_recording(
    State(state): State<AppState>,
    Json(req): Json<StartRecordingRequest>,
) -> ApiResult<Route> {
    if req.owner.trim().is_empty() {
        return Err(RouteError::InvalidInput("owner is required".to_string()));
    }

    let controller = Arc::new(RecordingController::new(
        state.recording_config.clone(),
        Arc::clone(&state.store),
    ));
    let (sensor, feed) = ChannelSensor::new(state.recording_config.sensor_buffer);

    let route = controller.start(&req.owner, req.title, Box::new(sensor)).await?;

    state
        .recordings
        .write()
        .await
        .insert(route.id, LiveRecording { controller, feed });

    info!("Recording started for route {}", route.id);
    Ok(Json(route))
}

/// POST /recordings/:route_id/positions
pub async fn push_position(
    State(state): State<AppState>,
    Path(route_id): Path<Uuid>,
    Json(req): Json<PositionRequest>,
) -> Result<StatusCode, RouteError> {
    let live = live_recording(&state, route_id).await?;

    let update = match req {
        PositionRequest::Fix {
            latitude,
            longitude,
        } => PositionUpdate::Fix(LatLng::new(latitude, longitude)),
        PositionRequest::Error { error } => PositionUpdate::Error(error),
    };
    live.feed.push(update).await?;

    Ok(StatusCode::ACCEPTED)
}

/// GET /recordings/:route_id
pub async fn recording_status(
    State(state): State<AppState>,
    Path(route_id): Path<Uuid>,
) -> ApiResult<RecordingTelemetry> {
    let live = live_recording(&state, route_id).await?;
    Ok(Json(live.controller.snapshot().await))
}

/// POST /recordings/:route_id/pause
pub async fn pause_recording(
    State(state): State<AppState>,
    Path(route_id): Path<Uuid>,
) -> ApiResult<RecordingTelemetry> {
    let live = live_recording(&state, route_id).await?;
    live.controller.pause().await?;
    Ok(Json(live.controller.snapshot().await))
}

/// POST /recordings/:route_id/resume
pub async fn resume_recording(
    State(state): State<AppState>,
    Path(route_id): Path<Uuid>,
) -> ApiResult<RecordingTelemetry> {
    let live = live_recording(&state, route_id).await?;
    live.controller.resume().await?;
    Ok(Json(live.controller.snapshot().await))
}

/// POST /recordings/:route_id/stops
pub async fn add_stop(
    State(state): State<AppState>,
    Path(route_id): Path<Uuid>,
    Json(draft): Json<StopDraft>,
) -> ApiResult<Stop> {
    let live = live_recording(&state, route_id).await?;
    Ok(Json(live.controller.add_stop(draft).await?))
}

/// POST /recordings/:route_id/finish
pub async fn finish_recording(
    State(state): State<AppState>,
    Path(route_id): Path<Uuid>,
) -> ApiResult<Route> {
    let live = live_recording(&state, route_id).await?;
    let route = live.controller.finish().await?;

    state.recordings.write().await.remove(&route_id);

    info!("Recording finished for route {}", route_id);
    Ok(Json(route))
}

/// DELETE /recordings/:route_id
/// Abandon a recording without completing it
pub async fn abandon_recording(
    State(state): State<AppState>,
    Path(route_id): Path<Uuid>,
) -> Result<StatusCode, RouteError> {
    let live = state
        .recordings
        .write()
        .await
        .remove(&route_id)
        .ok_or_else(|| RouteError::not_found(format!("no active recording for route {}", route_id)))?;

    warn!("Abandoning recording for route {}", route_id);
    live.controller.teardown().await;

    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Playback
// ============================================================================

/// POST /routes/:route_id/playback
/// Open a playback session (or return the one already open)
pub async fn open_playback(
    State(state): State<AppState>,
    Path(route_id): Path<Uuid>,
) -> ApiResult<PlaybackTelemetry> {
    let mut playbacks = state.playbacks.write().await;
    if let Some(handle) = playbacks.get(&route_id) {
        return Ok(Json(handle.telemetry()));
    }

    let engine =
        PlaybackEngine::load(state.store.as_ref(), route_id, state.playback_config.clone()).await?;
    let handle = PlaybackSession::spawn(engine);
    let telemetry = handle.telemetry();
    playbacks.insert(route_id, handle);

    Ok(Json(telemetry))
}

/// DELETE /routes/:route_id/playback
pub async fn close_playback(
    State(state): State<AppState>,
    Path(route_id): Path<Uuid>,
) -> Result<StatusCode, RouteError> {
    let handle = state
        .playbacks
        .write()
        .await
        .remove(&route_id)
        .ok_or_else(|| RouteError::not_found(format!("no playback open for route {}", route_id)))?;

    handle.close().await;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /routes/:route_id/playback
pub async fn playback_status(
    State(state): State<AppState>,
    Path(route_id): Path<Uuid>,
) -> ApiResult<PlaybackTelemetry> {
    with_playback(&state, route_id, PlaybackAction::Status).await
}

/// POST /routes/:route_id/playback/play
pub async fn play(
    State(state): State<AppState>,
    Path(route_id): Path<Uuid>,
) -> ApiResult<PlaybackTelemetry> {
    with_playback(&state, route_id, PlaybackAction::Play).await
}

/// POST /routes/:route_id/playback/pause
pub async fn pause_playback(
    State(state): State<AppState>,
    Path(route_id): Path<Uuid>,
) -> ApiResult<PlaybackTelemetry> {
    with_playback(&state, route_id, PlaybackAction::Pause).await
}

/// POST /routes/:route_id/playback/seek
pub async fn seek(
    State(state): State<AppState>,
    Path(route_id): Path<Uuid>,
    Json(req): Json<SeekRequest>,
) -> ApiResult<PlaybackTelemetry> {
    with_playback(&state, route_id, PlaybackAction::Seek(req.index)).await
}

/// POST /routes/:route_id/playback/speed
pub async fn set_speed(
    State(state): State<AppState>,
    Path(route_id): Path<Uuid>,
    Json(req): Json<SpeedRequest>,
) -> ApiResult<PlaybackTelemetry> {
    let speed = PlaybackSpeed::try_from(req.multiplier)?;
    with_playback(&state, route_id, PlaybackAction::Speed(speed)).await
}

/// POST /routes/:route_id/playback/jump
pub async fn jump_to_stop(
    State(state): State<AppState>,
    Path(route_id): Path<Uuid>,
    Json(req): Json<JumpRequest>,
) -> ApiResult<PlaybackTelemetry> {
    with_playback(&state, route_id, PlaybackAction::Jump(req.stop)).await
}

enum PlaybackAction {
    Status,
    Play,
    Pause,
    Seek(usize),
    Speed(PlaybackSpeed),
    Jump(usize),
}

async fn with_playback(
    state: &AppState,
    route_id: Uuid,
    action: PlaybackAction,
) -> ApiResult<PlaybackTelemetry> {
    let playbacks = state.playbacks.read().await;
    let handle = playbacks
        .get(&route_id)
        .ok_or_else(|| RouteError::not_found(format!("no playback open for route {}", route_id)))?;

    let telemetry = match action {
        PlaybackAction::Status => handle.snapshot().await?,
        PlaybackAction::Play => handle.play().await?,
        PlaybackAction::Pause => handle.pause().await?,
        PlaybackAction::Seek(index) => handle.seek(index).await?,
        PlaybackAction::Speed(speed) => handle.set_speed(speed).await?,
        PlaybackAction::Jump(ordinal) => handle.jump_to_stop(ordinal).await?,
    };

    Ok(Json(telemetry))
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
