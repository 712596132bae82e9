use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::mpsc;

use super::{ChannelSensor, ScriptedSensor, SensorFeed};
use crate::error::{Result, SensorError};
use crate::geo::LatLng;

/// One item delivered by a position subscription
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionUpdate {
    Fix(LatLng),
    Error(SensorError),
}

/// Configuration for a position sensor
#[derive(Debug, Clone)]
pub struct SensorConfig {
    /// Capacity of the update channel handed to the consumer
    pub buffer: usize,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self { buffer: 64 }
    }
}

/// Position-sensing backend trait
///
/// Implementations:
/// - `ChannelSensor`: fed from outside through a `SensorFeed` (HTTP clients, tests)
/// - `ScriptedSensor`: replays a fixed list of updates on a timer (simulation, tests)
#[async_trait::async_trait]
pub trait PositionSensor: Send + Sync {
    /// Open the subscription
    ///
    /// Returns a channel receiver that yields fixes and recoverable errors
    async fn start(&mut self) -> Result<mpsc::Receiver<PositionUpdate>>;

    /// Cancel the subscription; no further updates are produced afterwards
    async fn stop(&mut self) -> Result<()>;

    /// Check if the subscription is open
    fn is_active(&self) -> bool;

    /// Get sensor name for logging
    fn name(&self) -> &str;
}

/// Sensor source type
#[derive(Debug, Clone)]
pub enum SensorSource {
    /// Externally fed sensor
    Channel,
    /// Replay of a fixed script, one update per interval
    Scripted {
        updates: Vec<PositionUpdate>,
        interval: Duration,
    },
}

/// Position sensor factory
pub struct SensorFactory;

impl SensorFactory {
    /// Create a sensor; the feed is returned for externally fed sources
    pub fn create(
        source: SensorSource,
        config: SensorConfig,
    ) -> (Box<dyn PositionSensor>, Option<SensorFeed>) {
        match source {
            SensorSource::Channel => {
                let (sensor, feed) = ChannelSensor::new(config.buffer);
                (Box::new(sensor), Some(feed))
            }
            SensorSource::Scripted { updates, interval } => {
                let sensor = ScriptedSensor::new(updates, interval).with_buffer(config.buffer);
                (Box::new(sensor), None)
            }
        }
    }
}
