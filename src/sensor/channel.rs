use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;

use super::backend::{PositionSensor, PositionUpdate};
use crate::error::{Result, RouteError, SensorError};
use crate::geo::LatLng;

/// Sensor whose updates are pushed in from outside through a `SensorFeed`
pub struct ChannelSensor {
    rx: Option<mpsc::Receiver<PositionUpdate>>,
    active: Arc<AtomicBool>,
}

impl ChannelSensor {
    pub fn new(buffer: usize) -> (Self, SensorFeed) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        let active = Arc::new(AtomicBool::new(false));

        let sensor = Self {
            rx: Some(rx),
            active: Arc::clone(&active),
        };
        let feed = SensorFeed { tx, active };

        (sensor, feed)
    }
}

#[async_trait::async_trait]
impl PositionSensor for ChannelSensor {
    async fn start(&mut self) -> Result<mpsc::Receiver<PositionUpdate>> {
        let rx = self
            .rx
            .take()
            .ok_or_else(|| RouteError::invalid_state("channel sensor already started"))?;

        self.active.store(true, Ordering::SeqCst);
        info!("Channel sensor started");
        Ok(rx)
    }

    async fn stop(&mut self) -> Result<()> {
        self.active.store(false, Ordering::SeqCst);
        info!("Channel sensor stopped");
        Ok(())
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    fn name(&self) -> &str {
        "channel"
    }
}

/// Producer side of a `ChannelSensor`
#[derive(Clone)]
pub struct SensorFeed {
    tx: mpsc::Sender<PositionUpdate>,
    active: Arc<AtomicBool>,
}

impl SensorFeed {
    pub async fn push(&self, update: PositionUpdate) -> Result<()> {
        if !self.active.load(Ordering::SeqCst) {
            return Err(RouteError::invalid_state("sensor subscription is not active"));
        }

        self.tx
            .send(update)
            .await
            .map_err(|_| RouteError::invalid_state("sensor subscription closed"))
    }

    pub async fn push_fix(&self, position: LatLng) -> Result<()> {
        self.push(PositionUpdate::Fix(position)).await
    }

    pub async fn push_error(&self, error: SensorError) -> Result<()> {
        self.push(PositionUpdate::Error(error)).await
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst) && !self.tx.is_closed()
    }
}
