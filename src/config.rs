use anyhow::{Context, Result};
use serde::Deserialize;
use std::time::Duration;

use crate::playback::{ActiveStopPolicy, PlaybackConfig, StopMapping};
use crate::recording::RecordingConfig;

#[derive(Debug, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    #[serde(default)]
    pub recording: RecordingSection,
    #[serde(default)]
    pub playback: PlaybackSection,
}

#[derive(Debug, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
}

#[derive(Debug, Deserialize)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct RecordingSection {
    pub ticker_interval_ms: u64,
    pub sensor_buffer: usize,
    pub command_buffer: usize,
}

impl Default for RecordingSection {
    fn default() -> Self {
        let defaults = RecordingConfig::default();
        Self {
            ticker_interval_ms: defaults.ticker_interval.as_millis() as u64,
            sensor_buffer: defaults.sensor_buffer,
            command_buffer: defaults.command_buffer,
        }
    }
}

impl From<&RecordingSection> for RecordingConfig {
    fn from(section: &RecordingSection) -> Self {
        Self {
            ticker_interval: Duration::from_millis(section.ticker_interval_ms.max(1)),
            sensor_buffer: section.sensor_buffer,
            command_buffer: section.command_buffer,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct PlaybackSection {
    pub base_interval_ms: u64,
    pub stop_window: usize,
    pub stop_mapping: StopMapping,
    pub active_stop_policy: ActiveStopPolicy,
}

impl Default for PlaybackSection {
    fn default() -> Self {
        let defaults = PlaybackConfig::default();
        Self {
            base_interval_ms: defaults.base_interval.as_millis() as u64,
            stop_window: defaults.stop_window,
            stop_mapping: defaults.stop_mapping,
            active_stop_policy: defaults.active_stop_policy,
        }
    }
}

impl From<&PlaybackSection> for PlaybackConfig {
    fn from(section: &PlaybackSection) -> Self {
        Self {
            base_interval: Duration::from_millis(section.base_interval_ms.max(1)),
            stop_window: section.stop_window,
            stop_mapping: section.stop_mapping,
            active_stop_policy: section.active_stop_policy,
        }
    }
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .build()
            .with_context(|| format!("Failed to read config {}", path))?;

        Ok(settings.try_deserialize()?)
    }

    pub fn recording_config(&self) -> RecordingConfig {
        RecordingConfig::from(&self.recording)
    }

    pub fn playback_config(&self) -> PlaybackConfig {
        PlaybackConfig::from(&self.playback)
    }
}
