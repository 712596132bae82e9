//! Route recording
//!
//! This module provides the `RecordingController` that manages:
//! - The Idle -> Recording <-> Paused -> Completed state machine
//! - Accepting position fixes into the ordered point sequence
//! - Live distance and duration accumulation
//! - Stops annotated at the last known position

mod config;
mod controller;
mod telemetry;
mod worker;

pub use config::RecordingConfig;
pub use controller::RecordingController;
pub use telemetry::{RecordingState, RecordingTelemetry, StopDraft};
