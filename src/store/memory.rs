use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use super::models::{
    NewMedia, NewStop, Route, RoutePoint, RouteStatus, RouteUpdate, Stop, StopMedia,
};
use super::RouteStore;
use crate::error::{Result, RouteError};
use crate::geo::LatLng;

#[derive(Default)]
struct Tables {
    routes: HashMap<Uuid, Route>,
    /// route_id -> points in sequence order
    points: HashMap<Uuid, Vec<RoutePoint>>,
    /// route_id -> stops in creation order
    stops: HashMap<Uuid, Vec<Stop>>,
    /// stop_id -> media in order_index order
    media: HashMap<Uuid, Vec<StopMedia>>,
    /// stop_id -> route_id
    stop_owner: HashMap<Uuid, Uuid>,
}

impl Tables {
    fn route(&self, route_id: Uuid) -> Result<&Route> {
        self.routes
            .get(&route_id)
            .ok_or_else(|| RouteError::not_found(format!("route {}", route_id)))
    }

    fn route_mut(&mut self, route_id: Uuid) -> Result<&mut Route> {
        self.routes
            .get_mut(&route_id)
            .ok_or_else(|| RouteError::not_found(format!("route {}", route_id)))
    }

    fn stop_route(&self, stop_id: Uuid) -> Result<Uuid> {
        self.stop_owner
            .get(&stop_id)
            .copied()
            .ok_or_else(|| RouteError::not_found(format!("stop {}", stop_id)))
    }
}

/// In-process store backed by hash maps
///
/// Enforces the adapter invariants itself: points are only accepted for a
/// route in the Recording state and only with the next gapless sequence
/// number, and a Completed route is immutable.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl RouteStore for MemoryStore {
    async fn create_route(
        &self,
        owner: &str,
        title: &str,
        started_at: DateTime<Utc>,
    ) -> Result<Route> {
        let route = Route {
            id: Uuid::new_v4(),
            owner: owner.to_string(),
            title: title.to_string(),
            description: String::new(),
            status: RouteStatus::Recording,
            started_at,
            finished_at: None,
            total_distance: 0.0,
            total_duration: 0,
        };

        let mut tables = self.tables.write().await;
        tables.routes.insert(route.id, route.clone());
        tables.points.insert(route.id, Vec::new());
        tables.stops.insert(route.id, Vec::new());

        info!("Created route {} for {}", route.id, owner);
        Ok(route)
    }

    async fn get_route(&self, route_id: Uuid) -> Result<Route> {
        let tables = self.tables.read().await;
        tables.route(route_id).cloned()
    }

    async fn list_routes(&self, owner: &str) -> Result<Vec<Route>> {
        let tables = self.tables.read().await;
        let mut routes: Vec<Route> = tables
            .routes
            .values()
            .filter(|r| r.owner == owner)
            .cloned()
            .collect();
        routes.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        Ok(routes)
    }

    async fn update_route_status(&self, route_id: Uuid, update: RouteUpdate) -> Result<Route> {
        let mut tables = self.tables.write().await;
        let route = tables.route_mut(route_id)?;

        if !route.status.can_transition_to(update.status) {
            return Err(RouteError::invalid_state(format!(
                "route {} cannot move from {:?} to {:?}",
                route_id, route.status, update.status
            )));
        }

        route.status = update.status;
        if let Some(finished_at) = update.finished_at {
            route.finished_at = Some(finished_at);
        }
        if let Some(total_distance) = update.total_distance {
            route.total_distance = total_distance;
        }
        if let Some(total_duration) = update.total_duration {
            route.total_duration = total_duration;
        }

        debug!("Route {} status -> {:?}", route_id, route.status);
        Ok(route.clone())
    }

    async fn delete_route(&self, route_id: Uuid) -> Result<()> {
        let mut tables = self.tables.write().await;
        tables.route(route_id)?;

        tables.routes.remove(&route_id);
        tables.points.remove(&route_id);
        let stops = tables.stops.remove(&route_id).unwrap_or_default();
        for stop in &stops {
            tables.media.remove(&stop.id);
            tables.stop_owner.remove(&stop.id);
        }

        info!("Deleted route {} ({} stops)", route_id, stops.len());
        Ok(())
    }

    async fn append_point(
        &self,
        route_id: Uuid,
        position: LatLng,
        sequence: u32,
        recorded_at: DateTime<Utc>,
    ) -> Result<RoutePoint> {
        let mut tables = self.tables.write().await;

        let status = tables.route(route_id)?.status;
        if status != RouteStatus::Recording {
            return Err(RouteError::invalid_state(format!(
                "route {} is {:?}, points can only be appended while recording",
                route_id, status
            )));
        }

        let points = tables.points.entry(route_id).or_default();
        let expected = points.len() as u32;
        if sequence != expected {
            return Err(RouteError::invalid_state(format!(
                "route {} expects sequence {}, got {}",
                route_id, expected, sequence
            )));
        }

        let point = RoutePoint {
            id: Uuid::new_v4(),
            route_id,
            latitude: position.lat,
            longitude: position.lng,
            sequence,
            recorded_at,
        };
        points.push(point.clone());
        Ok(point)
    }

    async fn list_points(&self, route_id: Uuid) -> Result<Vec<RoutePoint>> {
        let tables = self.tables.read().await;
        tables.route(route_id)?;
        Ok(tables.points.get(&route_id).cloned().unwrap_or_default())
    }

    async fn create_stop(&self, route_id: Uuid, stop: NewStop) -> Result<Stop> {
        let mut tables = self.tables.write().await;

        if tables.route(route_id)?.is_completed() {
            return Err(RouteError::invalid_state(format!(
                "route {} is completed, stops can no longer be added",
                route_id
            )));
        }

        let stop = Stop {
            id: Uuid::new_v4(),
            route_id,
            latitude: stop.position.lat,
            longitude: stop.position.lng,
            place_name: stop.place_name,
            notes: stop.notes,
            rating: stop.rating,
            sequence: stop.sequence,
            created_at: Utc::now(),
        };

        tables.stop_owner.insert(stop.id, route_id);
        tables.stops.entry(route_id).or_default().push(stop.clone());
        Ok(stop)
    }

    async fn list_stops(&self, route_id: Uuid) -> Result<Vec<Stop>> {
        let tables = self.tables.read().await;
        tables.route(route_id)?;

        let mut stops = tables.stops.get(&route_id).cloned().unwrap_or_default();
        // stable: stops sharing a sequence keep creation order
        stops.sort_by_key(|s| s.sequence);
        Ok(stops)
    }

    async fn delete_stop(&self, stop_id: Uuid) -> Result<()> {
        let mut tables = self.tables.write().await;
        let route_id = tables.stop_route(stop_id)?;

        if let Some(stops) = tables.stops.get_mut(&route_id) {
            stops.retain(|s| s.id != stop_id);
        }
        tables.media.remove(&stop_id);
        tables.stop_owner.remove(&stop_id);
        Ok(())
    }

    async fn attach_media(&self, stop_id: Uuid, media: NewMedia) -> Result<StopMedia> {
        let mut tables = self.tables.write().await;
        let route_id = tables.stop_route(stop_id)?;

        let entries = tables.media.entry(stop_id).or_default();
        let media = StopMedia {
            id: Uuid::new_v4(),
            stop_id,
            route_id,
            url: media.url,
            kind: media.kind,
            caption: media.caption,
            order_index: entries.len() as u32,
            created_at: Utc::now(),
        };
        entries.push(media.clone());
        Ok(media)
    }

    async fn list_media(&self, stop_id: Uuid) -> Result<Vec<StopMedia>> {
        let tables = self.tables.read().await;
        tables.stop_route(stop_id)?;
        Ok(tables.media.get(&stop_id).cloned().unwrap_or_default())
    }
}
