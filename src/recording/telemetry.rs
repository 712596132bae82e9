use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::geo::{format_distance, format_duration, LatLng};

/// Recording controller state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordingState {
    Idle,
    Recording,
    Paused,
    Completed,
}

impl RecordingState {
    /// Recording or Paused
    pub fn is_active(self) -> bool {
        matches!(self, RecordingState::Recording | RecordingState::Paused)
    }
}

/// Live view of a recording session
///
/// While the session is active these running accumulators, not the stored
/// route totals, are the source of truth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordingTelemetry {
    pub route_id: Option<Uuid>,
    pub state: RecordingState,

    /// Meters
    pub total_distance: f64,
    pub duration_secs: u64,
    pub point_count: u32,
    pub stop_count: usize,

    /// Most recent valid fix, including fixes received while paused
    pub last_position: Option<LatLng>,

    /// Most recent sensor or persistence warning
    pub last_error: Option<String>,
    pub failed_writes: u64,
    pub sensor_errors: u64,
}

impl RecordingTelemetry {
    pub fn idle() -> Self {
        Self {
            route_id: None,
            state: RecordingState::Idle,
            total_distance: 0.0,
            duration_secs: 0,
            point_count: 0,
            stop_count: 0,
            last_position: None,
            last_error: None,
            failed_writes: 0,
            sensor_errors: 0,
        }
    }

    pub fn distance_label(&self) -> String {
        format_distance(self.total_distance)
    }

    pub fn duration_label(&self) -> String {
        format_duration(self.duration_secs)
    }
}

impl Default for RecordingTelemetry {
    fn default() -> Self {
        Self::idle()
    }
}

/// User input for a stop; position and sequence come from the live session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StopDraft {
    pub place_name: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub rating: Option<u8>,
}

impl StopDraft {
    pub fn new(place_name: impl Into<String>) -> Self {
        Self {
            place_name: place_name.into(),
            notes: String::new(),
            rating: None,
        }
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = notes.into();
        self
    }

    pub fn with_rating(mut self, rating: u8) -> Self {
        self.rating = Some(rating);
        self
    }
}
