use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::sensor::SensorConfig;

/// Configuration for a recording controller
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordingConfig {
    /// Period of the duration ticker
    /// Default: 1 second
    pub ticker_interval: Duration,

    /// Capacity of the sensor -> controller channel
    pub sensor_buffer: usize,

    /// Capacity of the command channel into the session task
    pub command_buffer: usize,
}

impl RecordingConfig {
    pub fn sensor_config(&self) -> SensorConfig {
        SensorConfig {
            buffer: self.sensor_buffer,
        }
    }
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            ticker_interval: Duration::from_secs(1), // 1 Hz
            sensor_buffer: 64,
            command_buffer: 16,
        }
    }
}
