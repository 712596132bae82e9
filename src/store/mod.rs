//! Point store adapter
//!
//! Append-only persistence of a route's ordered position samples and its
//! stops. The backing store is external; this module defines the contract
//! the recorder and playback rely on, plus an in-process implementation.

mod memory;
mod models;

pub use memory::MemoryStore;
pub use models::{
    MediaKind, NewMedia, NewStop, Route, RoutePoint, RouteStatus, RouteUpdate, Stop, StopMedia,
};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::Result;
use crate::geo::LatLng;

/// Persistence contract for routes, points, stops and stop media
///
/// Implementations report transport failures as `RouteError::Persistence`
/// and missing records as `RouteError::NotFound`.
#[async_trait::async_trait]
pub trait RouteStore: Send + Sync {
    /// Create a route in the Recording state
    async fn create_route(
        &self,
        owner: &str,
        title: &str,
        started_at: DateTime<Utc>,
    ) -> Result<Route>;

    async fn get_route(&self, route_id: Uuid) -> Result<Route>;

    /// Routes belonging to `owner`, newest first
    async fn list_routes(&self, owner: &str) -> Result<Vec<Route>>;

    async fn update_route_status(&self, route_id: Uuid, update: RouteUpdate) -> Result<Route>;

    /// Delete a route together with its points, stops and media
    async fn delete_route(&self, route_id: Uuid) -> Result<()>;

    async fn append_point(
        &self,
        route_id: Uuid,
        position: LatLng,
        sequence: u32,
        recorded_at: DateTime<Utc>,
    ) -> Result<RoutePoint>;

    /// Points ascending by sequence
    async fn list_points(&self, route_id: Uuid) -> Result<Vec<RoutePoint>>;

    async fn create_stop(&self, route_id: Uuid, stop: NewStop) -> Result<Stop>;

    /// Stops ascending by sequence, creation order within a sequence
    async fn list_stops(&self, route_id: Uuid) -> Result<Vec<Stop>>;

    /// Delete a stop and its media
    async fn delete_stop(&self, stop_id: Uuid) -> Result<()>;

    async fn attach_media(&self, stop_id: Uuid, media: NewMedia) -> Result<StopMedia>;

    async fn list_media(&self, stop_id: Uuid) -> Result<Vec<StopMedia>>;
}
