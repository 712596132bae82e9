pub mod config;
pub mod error;
pub mod geo;
pub mod http;
pub mod playback;
pub mod recording;
pub mod sensor;
pub mod store;

pub use config::Config;
pub use error::{Result, RouteError, SensorError};
pub use geo::{distance, format_distance, format_duration, total_distance, LatLng};
pub use http::{create_router, AppState};
pub use playback::{
    ActiveStopPolicy, PlaybackConfig, PlaybackEngine, PlaybackHandle, PlaybackSession,
    PlaybackSpeed, PlaybackState, PlaybackTelemetry, StopMapping, TickOutcome,
};
pub use recording::{
    RecordingConfig, RecordingController, RecordingState, RecordingTelemetry, StopDraft,
};
pub use sensor::{
    ChannelSensor, PositionSensor, PositionUpdate, ScriptedSensor, SensorConfig, SensorFactory,
    SensorFeed, SensorSource,
};
pub use store::{
    MediaKind, MemoryStore, NewMedia, NewStop, Route, RoutePoint, RouteStatus, RouteStore,
    RouteUpdate, Stop, StopMedia,
};
