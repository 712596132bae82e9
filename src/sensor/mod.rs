//! Position-sensing service
//!
//! A sensor is started once and hands back a bounded channel of
//! `PositionUpdate`s. Errors travel down the same channel as fixes so the
//! consumer sees them in arrival order and the subscription stays open.

mod backend;
mod channel;
mod scripted;

pub use backend::{PositionSensor, PositionUpdate, SensorConfig, SensorFactory, SensorSource};
pub use channel::{ChannelSensor, SensorFeed};
pub use scripted::ScriptedSensor;
