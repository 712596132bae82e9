use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::geo::LatLng;

/// Lifecycle status of a route
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteStatus {
    Recording,
    Paused,
    Completed,
}

impl RouteStatus {
    /// Recording and Paused may oscillate; Completed is terminal.
    pub fn can_transition_to(self, next: RouteStatus) -> bool {
        match (self, next) {
            (RouteStatus::Completed, _) => false,
            (RouteStatus::Recording, RouteStatus::Paused)
            | (RouteStatus::Paused, RouteStatus::Recording)
            | (_, RouteStatus::Completed) => true,
            (current, next) => current == next,
        }
    }
}

/// One recording session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub id: Uuid,
    pub owner: String,
    pub title: String,
    pub description: String,
    pub status: RouteStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,

    /// Only authoritative once `status` is Completed
    pub total_distance: f64,

    /// Seconds; only authoritative once `status` is Completed
    pub total_duration: u64,
}

impl Route {
    pub fn is_completed(&self) -> bool {
        self.status == RouteStatus::Completed
    }

    /// Title used when the caller does not provide one
    pub fn default_title(started_at: DateTime<Utc>) -> String {
        format!("Route {}", started_at.format("%Y-%m-%d"))
    }
}

/// Status change plus the fields that travel with it
#[derive(Debug, Clone, PartialEq)]
pub struct RouteUpdate {
    pub status: RouteStatus,
    pub finished_at: Option<DateTime<Utc>>,
    pub total_distance: Option<f64>,
    pub total_duration: Option<u64>,
}

impl RouteUpdate {
    pub fn status(status: RouteStatus) -> Self {
        Self {
            status,
            finished_at: None,
            total_distance: None,
            total_duration: None,
        }
    }

    pub fn completed(finished_at: DateTime<Utc>, total_distance: f64, total_duration: u64) -> Self {
        Self {
            status: RouteStatus::Completed,
            finished_at: Some(finished_at),
            total_distance: Some(total_distance),
            total_duration: Some(total_duration),
        }
    }
}

/// One position sample in a route's ordered path
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutePoint {
    pub id: Uuid,
    pub route_id: Uuid,
    pub latitude: f64,
    pub longitude: f64,

    /// 0-based, gapless, assigned in append order
    pub sequence: u32,
    pub recorded_at: DateTime<Utc>,
}

impl RoutePoint {
    pub fn position(&self) -> LatLng {
        LatLng::new(self.latitude, self.longitude)
    }
}

/// A user annotation bound to a moment in a route
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stop {
    pub id: Uuid,
    pub route_id: Uuid,
    pub latitude: f64,
    pub longitude: f64,
    pub place_name: String,
    pub notes: String,

    /// 1 to 5 stars
    pub rating: Option<u8>,

    /// Number of points recorded when the stop was created
    pub sequence: u32,
    pub created_at: DateTime<Utc>,
}

impl Stop {
    pub fn position(&self) -> LatLng {
        LatLng::new(self.latitude, self.longitude)
    }
}

/// Fields supplied when creating a stop
#[derive(Debug, Clone, PartialEq)]
pub struct NewStop {
    pub position: LatLng,
    pub place_name: String,
    pub notes: String,
    pub rating: Option<u8>,
    pub sequence: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Image,
    Video,
}

/// Reference to an uploaded file owned by a stop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StopMedia {
    pub id: Uuid,
    pub stop_id: Uuid,
    pub route_id: Uuid,
    pub url: String,
    pub kind: MediaKind,
    pub caption: Option<String>,
    pub order_index: u32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewMedia {
    pub url: String,
    pub kind: MediaKind,
    pub caption: Option<String>,
}
