use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

use crate::error::{Result, RouteError};
use crate::geo::LatLng;
use crate::playback::{ActiveStopPolicy, PlaybackConfig, PlaybackSpeed, PlaybackState, StopMapping};
use crate::store::{Route, RoutePoint, RouteStore, Stop};

/// Result of one scheduler tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Not playing; nothing changed
    Idle,
    /// Cursor moved to the given index
    Advanced(usize),
    /// Cursor reached the last index and playback stopped
    Finished(usize),
}

/// Highlighted stop as seen by the presentation layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveStop {
    pub ordinal: usize,
    pub stop_id: Uuid,
    pub place_name: String,
    pub point_index: usize,
}

/// Derived playback view
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackTelemetry {
    pub route_id: Uuid,
    pub index: usize,
    pub total: usize,
    pub progress_percent: f64,
    pub playing: bool,
    pub speed: PlaybackSpeed,
    pub position: Option<LatLng>,
    pub active_stop: Option<ActiveStop>,
}

/// Replay cursor over a completed route
///
/// Purely synchronous: the cursor only moves through the transport methods
/// and `tick`, so a fixed sequence of calls always visits the same states.
/// `PlaybackSession` supplies the timer.
pub struct PlaybackEngine {
    route: Route,
    points: Vec<RoutePoint>,
    stops: Vec<Stop>,
    /// point index for each stop ordinal
    stop_indices: Vec<usize>,
    config: PlaybackConfig,
    state: PlaybackState,
    speed: PlaybackSpeed,
    cursor: usize,
    active_stop: Option<usize>,
}

impl PlaybackEngine {
    pub fn new(
        route: Route,
        mut points: Vec<RoutePoint>,
        mut stops: Vec<Stop>,
        config: PlaybackConfig,
    ) -> Result<Self> {
        if !route.is_completed() {
            return Err(RouteError::invalid_state(format!(
                "route {} is {:?}, only completed routes can be replayed",
                route.id, route.status
            )));
        }

        points.sort_by_key(|p| p.sequence);
        stops.sort_by_key(|s| s.sequence);

        let stop_indices = (0..stops.len())
            .map(|ordinal| map_stop(config.stop_mapping, ordinal, &stops, points.len()))
            .collect();

        let mut engine = Self {
            route,
            points,
            stops,
            stop_indices,
            config,
            state: PlaybackState::Paused,
            speed: PlaybackSpeed::X1,
            cursor: 0,
            active_stop: None,
        };
        engine.refresh_active_stop();
        Ok(engine)
    }

    /// Fetch a route with its points and stops from the store
    pub async fn load(
        store: &dyn RouteStore,
        route_id: Uuid,
        config: PlaybackConfig,
    ) -> Result<Self> {
        let route = store.get_route(route_id).await?;
        let points = store.list_points(route_id).await?;
        let stops = store.list_stops(route_id).await?;

        debug!(
            "Loaded route {} for playback: {} points, {} stops",
            route_id,
            points.len(),
            stops.len()
        );

        Self::new(route, points, stops, config)
    }

    pub fn route(&self) -> &Route {
        &self.route
    }

    pub fn points(&self) -> &[RoutePoint] {
        &self.points
    }

    pub fn stops(&self) -> &[Stop] {
        &self.stops
    }

    /// Path handed to the rendering surface
    pub fn path(&self) -> Vec<LatLng> {
        self.points.iter().map(RoutePoint::position).collect()
    }

    /// Get total number of points
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Get current cursor index
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state == PlaybackState::Playing
    }

    pub fn speed(&self) -> PlaybackSpeed {
        self.speed
    }

    /// Delay between ticks at the current speed
    pub fn tick_interval(&self) -> Duration {
        self.config.base_interval / self.speed.multiplier()
    }

    /// `cursor / (N - 1)`, 0 when there are fewer than two points
    pub fn progress(&self) -> f64 {
        match self.last_index() {
            Some(last) if last > 0 => self.cursor as f64 / last as f64,
            _ => 0.0,
        }
    }

    pub fn current_point(&self) -> Option<&RoutePoint> {
        self.points.get(self.cursor)
    }

    pub fn active_stop(&self) -> Option<&Stop> {
        self.active_stop.and_then(|ordinal| self.stops.get(ordinal))
    }

    /// Point index a stop ordinal maps to
    pub fn stop_index(&self, ordinal: usize) -> Option<usize> {
        self.stop_indices.get(ordinal).copied()
    }

    /// Start or resume; returns false when already at the last index
    pub fn play(&mut self) -> bool {
        match self.last_index() {
            Some(last) if self.cursor < last => {
                self.state = PlaybackState::Playing;
                true
            }
            _ => false,
        }
    }

    /// Pause without moving the cursor
    pub fn pause(&mut self) {
        self.state = PlaybackState::Paused;
    }

    /// Move to `index`, clamped to the point range; pauses playback
    pub fn seek(&mut self, index: usize) -> usize {
        self.state = PlaybackState::Paused;
        self.cursor = index.min(self.last_index().unwrap_or(0));
        self.refresh_active_stop();
        self.cursor
    }

    /// Takes effect from the next tick
    pub fn set_speed(&mut self, speed: PlaybackSpeed) {
        self.speed = speed;
    }

    /// Pause and seek to the point index of the `ordinal`-th stop
    pub fn jump_to_stop(&mut self, ordinal: usize) -> Result<usize> {
        if self.points.is_empty() {
            return Err(RouteError::invalid_state(format!(
                "route {} has no points",
                self.route.id
            )));
        }

        let index = self.stop_index(ordinal).ok_or_else(|| {
            RouteError::not_found(format!(
                "stop {} (route {} has {} stops)",
                ordinal,
                self.route.id,
                self.stops.len()
            ))
        })?;

        Ok(self.seek(index))
    }

    /// Advance the cursor by one point while playing
    ///
    /// Reaching the last index stops playback; that is the only way a tick
    /// ends it.
    pub fn tick(&mut self) -> TickOutcome {
        if self.state != PlaybackState::Playing {
            return TickOutcome::Idle;
        }

        let Some(last) = self.last_index() else {
            self.state = PlaybackState::Paused;
            return TickOutcome::Idle;
        };

        if self.cursor < last {
            self.cursor += 1;
            self.refresh_active_stop();
        }

        if self.cursor >= last {
            self.state = PlaybackState::Paused;
            TickOutcome::Finished(self.cursor)
        } else {
            TickOutcome::Advanced(self.cursor)
        }
    }

    pub fn telemetry(&self) -> PlaybackTelemetry {
        PlaybackTelemetry {
            route_id: self.route.id,
            index: self.cursor,
            total: self.points.len(),
            progress_percent: self.progress() * 100.0,
            playing: self.is_playing(),
            speed: self.speed,
            position: self.current_point().map(RoutePoint::position),
            active_stop: self.active_stop.and_then(|ordinal| {
                self.stops.get(ordinal).map(|stop| ActiveStop {
                    ordinal,
                    stop_id: stop.id,
                    place_name: stop.place_name.clone(),
                    point_index: self.stop_indices[ordinal],
                })
            }),
        }
    }

    fn last_index(&self) -> Option<usize> {
        self.points.len().checked_sub(1)
    }

    /// First stop (in creation order) whose index lies inside the window
    fn refresh_active_stop(&mut self) {
        if self.points.is_empty() {
            return;
        }

        let window = self.config.stop_window;
        let found = self
            .stop_indices
            .iter()
            .position(|&index| self.cursor.abs_diff(index) < window);

        match (found, self.config.active_stop_policy) {
            (Some(ordinal), _) => self.active_stop = Some(ordinal),
            (None, ActiveStopPolicy::Clear) => self.active_stop = None,
            (None, ActiveStopPolicy::Sticky) => {}
        }
    }
}

fn map_stop(mapping: StopMapping, ordinal: usize, stops: &[Stop], point_count: usize) -> usize {
    let last = point_count.saturating_sub(1);
    match mapping {
        // integer form of floor(ordinal / denom * last)
        StopMapping::Proportional => {
            let denom = stops.len().saturating_sub(1).max(1);
            ordinal * last / denom
        }
        StopMapping::Recorded => (stops[ordinal].sequence as usize).min(last),
    }
}
