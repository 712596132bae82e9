//! Error taxonomy shared by the recorder, the store adapter and playback.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Recoverable conditions reported by the position-sensing service.
///
/// None of these tear down a subscription; the recorder keeps listening
/// for the next successful fix.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorError {
    #[error("position request timed out")]
    Timeout,

    #[error("location permission denied")]
    PermissionDenied,

    #[error("position unavailable")]
    Unavailable,

    /// The sensor produced a fix with non-finite or out-of-range coordinates
    #[error("sensor produced an invalid fix")]
    InvalidFix,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RouteError {
    #[error("sensor error: {0}")]
    Sensor(#[from] SensorError),

    /// Transport or store failure for a single operation
    #[error("persistence error: {0}")]
    Persistence(String),

    /// Operation is illegal in the current state machine state
    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl RouteError {
    pub fn invalid_state(msg: impl Into<String>) -> Self {
        RouteError::InvalidState(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        RouteError::NotFound(msg.into())
    }

    pub fn persistence(msg: impl Into<String>) -> Self {
        RouteError::Persistence(msg.into())
    }

    /// Whether the recorder may absorb this error and keep the session alive
    pub fn is_recoverable(&self) -> bool {
        matches!(self, RouteError::Sensor(_) | RouteError::Persistence(_))
    }
}

pub type Result<T> = std::result::Result<T, RouteError>;
