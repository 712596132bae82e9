pub mod engine;
pub mod session;

pub use engine::{PlaybackEngine, PlaybackTelemetry, TickOutcome};
pub use session::{PlaybackHandle, PlaybackSession};

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::RouteError;

/// Playback state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackState {
    Paused,
    Playing,
}

/// Discrete replay speeds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum PlaybackSpeed {
    X1,
    X2,
    X5,
}

impl PlaybackSpeed {
    pub const ALL: [PlaybackSpeed; 3] = [PlaybackSpeed::X1, PlaybackSpeed::X2, PlaybackSpeed::X5];

    pub fn multiplier(self) -> u32 {
        match self {
            PlaybackSpeed::X1 => 1,
            PlaybackSpeed::X2 => 2,
            PlaybackSpeed::X5 => 5,
        }
    }
}

impl TryFrom<u32> for PlaybackSpeed {
    type Error = RouteError;

    fn try_from(multiplier: u32) -> Result<Self, Self::Error> {
        match multiplier {
            1 => Ok(PlaybackSpeed::X1),
            2 => Ok(PlaybackSpeed::X2),
            5 => Ok(PlaybackSpeed::X5),
            other => Err(RouteError::InvalidInput(format!(
                "unsupported speed {}x, expected 1, 2 or 5",
                other
            ))),
        }
    }
}

impl From<PlaybackSpeed> for u32 {
    fn from(speed: PlaybackSpeed) -> Self {
        speed.multiplier()
    }
}

/// How a stop is placed on the point timeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopMapping {
    /// `floor(ordinal / max(stops - 1, 1) * (points - 1))`
    Proportional,
    /// The stop's own sequence number, clamped to the last point
    Recorded,
}

/// What happens to the highlighted stop when the cursor leaves every window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActiveStopPolicy {
    Clear,
    Sticky,
}

/// Playback configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaybackConfig {
    /// Tick interval at 1x; divided by the speed multiplier
    pub base_interval: Duration,
    /// A stop is active while `|cursor - stop index| < stop_window`
    pub stop_window: usize,
    pub stop_mapping: StopMapping,
    pub active_stop_policy: ActiveStopPolicy,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            base_interval: Duration::from_millis(100),
            stop_window: 10,
            stop_mapping: StopMapping::Proportional,
            active_stop_policy: ActiveStopPolicy::Clear,
        }
    }
}
