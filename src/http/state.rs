use crate::playback::{PlaybackConfig, PlaybackHandle};
use crate::recording::{RecordingConfig, RecordingController};
use crate::sensor::SensorFeed;
use crate::store::{MemoryStore, RouteStore};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// A live recording and the feed that supplies its positions
#[derive(Clone)]
pub struct LiveRecording {
    pub controller: Arc<RecordingController>,
    pub feed: SensorFeed,
}

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn RouteStore>,
    pub recording_config: RecordingConfig,
    pub playback_config: PlaybackConfig,

    /// Active recordings (route_id → recording)
    pub recordings: Arc<RwLock<HashMap<Uuid, LiveRecording>>>,

    /// Open playback sessions (route_id → handle)
    pub playbacks: Arc<RwLock<HashMap<Uuid, PlaybackHandle>>>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn RouteStore>,
        recording_config: RecordingConfig,
        playback_config: PlaybackConfig,
    ) -> Self {
        Self {
            store,
            recording_config,
            playback_config,
            recordings: Arc::new(RwLock::new(HashMap::new())),
            playbacks: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(
            Arc::new(MemoryStore::new()),
            RecordingConfig::default(),
            PlaybackConfig::default(),
        )
    }
}
