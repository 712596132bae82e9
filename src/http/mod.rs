//! HTTP API for the presentation layer
//!
//! Recording transport:
//! - POST /recordings - Start a recording
//! - POST /recordings/:id/positions - Feed a position fix or sensor error
//! - POST /recordings/:id/{pause,resume,finish,stops}
//! - GET /recordings/:id - Live telemetry
//!
//! Stored routes and playback:
//! - GET /routes?owner= , GET/DELETE /routes/:id, GET /routes/:id/{points,stops}
//! - POST/GET/DELETE /routes/:id/playback
//! - POST /routes/:id/playback/{play,pause,seek,speed,jump}

mod handlers;
mod routes;
mod state;

pub use routes::create_router;
pub use state::{AppState, LiveRecording};
