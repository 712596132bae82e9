use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use super::telemetry::{RecordingState, RecordingTelemetry, StopDraft};
use crate::error::{Result, RouteError, SensorError};
use crate::geo::{distance, LatLng};
use crate::sensor::{PositionSensor, PositionUpdate};
use crate::store::{NewStop, Route, RouteStatus, RouteStore, RouteUpdate, Stop};

/// Requests sent from the controller handle to the session task
pub(super) enum Command {
    Pause(oneshot::Sender<Result<()>>),
    Resume(oneshot::Sender<Result<()>>),
    AddStop(StopDraft, oneshot::Sender<Result<Stop>>),
    Finish(oneshot::Sender<Result<Route>>),
    Snapshot(oneshot::Sender<RecordingTelemetry>),
}

/// Single task owning one live recording session
///
/// Sensor updates, controller commands and the duration ticker are all
/// consumed here, so point sequence numbers follow arrival order without
/// any shared mutable state.
pub(super) struct SessionWorker {
    store: Arc<dyn RouteStore>,
    sensor: Box<dyn PositionSensor>,
    route: Route,
    state: RecordingState,
    started: Instant,
    ticker_interval: Duration,

    next_sequence: u32,
    last_accepted: Option<LatLng>,
    last_position: Option<LatLng>,
    total_distance: f64,
    duration_secs: u64,
    stop_count: usize,

    last_error: Option<String>,
    failed_writes: u64,
    sensor_errors: u64,

    telemetry: Arc<watch::Sender<RecordingTelemetry>>,
}

impl SessionWorker {
    pub(super) fn new(
        store: Arc<dyn RouteStore>,
        sensor: Box<dyn PositionSensor>,
        route: Route,
        started: Instant,
        ticker_interval: Duration,
        telemetry: Arc<watch::Sender<RecordingTelemetry>>,
    ) -> Self {
        Self {
            store,
            sensor,
            route,
            state: RecordingState::Recording,
            started,
            ticker_interval,
            next_sequence: 0,
            last_accepted: None,
            last_position: None,
            total_distance: 0.0,
            duration_secs: 0,
            stop_count: 0,
            last_error: None,
            failed_writes: 0,
            sensor_errors: 0,
            telemetry,
        }
    }

    pub(super) async fn run(
        mut self,
        updates: mpsc::Receiver<PositionUpdate>,
        mut commands: mpsc::Receiver<Command>,
    ) {
        info!("Recording task started for route {}", self.route.id);

        let mut updates = Some(updates);
        let mut ticker =
            tokio::time::interval_at(self.started + self.ticker_interval, self.ticker_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        self.publish();

        loop {
            tokio::select! {
                // Updates first: a fix queued before a command is applied before it
                biased;

                update = next_update(&mut updates) => match update {
                    Some(update) => self.on_update(update).await,
                    None => {
                        warn!("Position subscription for route {} closed", self.route.id);
                        self.last_error = Some("position subscription closed".to_string());
                        updates = None;
                    }
                },

                command = commands.recv() => match command {
                    Some(command) => {
                        if self.on_command(command).await {
                            break;
                        }
                    }
                    None => {
                        info!(
                            "Recording controller for route {} dropped, tearing down",
                            self.route.id
                        );
                        self.stop_sensor().await;
                        break;
                    }
                },

                _ = ticker.tick() => self.on_tick(),
            }

            self.publish();
        }

        self.publish();
        info!("Recording task stopped for route {}", self.route.id);
    }

    /// Returns true once the session has completed
    async fn on_command(&mut self, command: Command) -> bool {
        match command {
            Command::Pause(reply) => {
                let _ = reply.send(self.set_paused(true).await);
            }
            Command::Resume(reply) => {
                let _ = reply.send(self.set_paused(false).await);
            }
            Command::AddStop(draft, reply) => {
                let _ = reply.send(self.add_stop(draft).await);
            }
            Command::Snapshot(reply) => {
                self.on_tick();
                let _ = reply.send(self.snapshot());
            }
            Command::Finish(reply) => {
                let result = self.finish().await;
                let finished = result.is_ok();
                let _ = reply.send(result);
                return finished;
            }
        }
        false
    }

    async fn on_update(&mut self, update: PositionUpdate) {
        match update {
            PositionUpdate::Fix(position) if !position.is_valid() => {
                self.on_sensor_error(SensorError::InvalidFix);
            }
            PositionUpdate::Fix(position) => {
                self.last_position = Some(position);
                if self.state == RecordingState::Recording {
                    self.append_point(position).await;
                }
            }
            PositionUpdate::Error(e) => self.on_sensor_error(e),
        }
    }

    fn on_sensor_error(&mut self, e: SensorError) {
        self.sensor_errors += 1;
        warn!("GPS error on route {}: {}", self.route.id, e);
        self.last_error = Some(format!("GPS error: {}", e));
    }

    async fn append_point(&mut self, position: LatLng) {
        let sequence = self.next_sequence;

        match self
            .store
            .append_point(self.route.id, position, sequence, Utc::now())
            .await
        {
            Ok(_) => {
                if let Some(prev) = self.last_accepted {
                    self.total_distance += distance(prev, position);
                }
                self.last_accepted = Some(position);
                self.next_sequence += 1;
                debug!(
                    "Route {} point {} at ({:.6}, {:.6})",
                    self.route.id, sequence, position.lat, position.lng
                );
            }
            Err(e) => {
                // sample is skipped; the sequence number is reused by the next one
                self.failed_writes += 1;
                error!("Failed to save point {} for route {}: {}", sequence, self.route.id, e);
                self.last_error = Some(format!("Failed to save point: {}", e));
            }
        }
    }

    async fn set_paused(&mut self, paused: bool) -> Result<()> {
        let (from, to, status) = if paused {
            (RecordingState::Recording, RecordingState::Paused, RouteStatus::Paused)
        } else {
            (RecordingState::Paused, RecordingState::Recording, RouteStatus::Recording)
        };

        if self.state != from {
            return Err(RouteError::invalid_state(format!(
                "cannot move to {:?} while {:?}",
                to, self.state
            )));
        }

        // the stored status gates point appends, so it must change first
        match self
            .store
            .update_route_status(self.route.id, RouteUpdate::status(status))
            .await
        {
            Ok(route) => {
                self.route = route;
                self.state = to;
                info!("Route {} -> {:?}", self.route.id, to);
                Ok(())
            }
            Err(e) => {
                self.failed_writes += 1;
                error!("Failed to persist {:?} for route {}: {}", status, self.route.id, e);
                self.last_error = Some(format!("Failed to update route status: {}", e));
                Err(e)
            }
        }
    }

    async fn add_stop(&mut self, draft: StopDraft) -> Result<Stop> {
        let place_name = draft.place_name.trim();
        if place_name.is_empty() {
            return Err(RouteError::InvalidInput("stop needs a place name".to_string()));
        }
        if let Some(rating) = draft.rating {
            if !(1..=5).contains(&rating) {
                return Err(RouteError::InvalidInput(format!(
                    "rating must be between 1 and 5, got {}",
                    rating
                )));
            }
        }

        let position = self
            .last_position
            .ok_or_else(|| RouteError::invalid_state("no live position available yet"))?;

        let stop = NewStop {
            position,
            place_name: place_name.to_string(),
            notes: draft.notes,
            rating: draft.rating,
            sequence: self.next_sequence,
        };

        match self.store.create_stop(self.route.id, stop).await {
            Ok(stop) => {
                self.stop_count += 1;
                info!(
                    "Added stop '{}' to route {} at sequence {}",
                    stop.place_name, self.route.id, stop.sequence
                );
                Ok(stop)
            }
            Err(e) => {
                self.failed_writes += 1;
                error!("Failed to save stop for route {}: {}", self.route.id, e);
                self.last_error = Some(format!("Failed to save stop: {}", e));
                Err(e)
            }
        }
    }

    /// Persist the final totals, then cancel the sensor
    ///
    /// On a failed write the session keeps running so finish can be retried.
    async fn finish(&mut self) -> Result<Route> {
        self.on_tick();

        let update = RouteUpdate::completed(Utc::now(), self.total_distance, self.duration_secs);
        match self.store.update_route_status(self.route.id, update).await {
            Ok(route) => {
                self.stop_sensor().await;
                self.state = RecordingState::Completed;
                self.route = route.clone();
                info!(
                    "Route {} completed: {} points, {:.1}m, {}s",
                    route.id, self.next_sequence, route.total_distance, route.total_duration
                );
                Ok(route)
            }
            Err(e) => {
                self.failed_writes += 1;
                error!("Failed to complete route {}: {}", self.route.id, e);
                self.last_error = Some(format!("Failed to finish recording: {}", e));
                Err(e)
            }
        }
    }

    async fn stop_sensor(&mut self) {
        if let Err(e) = self.sensor.stop().await {
            error!("Failed to stop {} sensor: {}", self.sensor.name(), e);
        }
    }

    /// Elapsed time is recomputed from the start instant, never accumulated
    fn on_tick(&mut self) {
        if self.state.is_active() {
            self.duration_secs = self.started.elapsed().as_secs();
        }
    }

    fn snapshot(&self) -> RecordingTelemetry {
        RecordingTelemetry {
            route_id: Some(self.route.id),
            state: self.state,
            total_distance: self.total_distance,
            duration_secs: self.duration_secs,
            point_count: self.next_sequence,
            stop_count: self.stop_count,
            last_position: self.last_position,
            last_error: self.last_error.clone(),
            failed_writes: self.failed_writes,
            sensor_errors: self.sensor_errors,
        }
    }

    fn publish(&self) {
        self.telemetry.send_replace(self.snapshot());
    }
}

async fn next_update(
    updates: &mut Option<mpsc::Receiver<PositionUpdate>>,
) -> Option<PositionUpdate> {
    match updates {
        Some(rx) => rx.recv().await,
        None => futures::future::pending().await,
    }
}
