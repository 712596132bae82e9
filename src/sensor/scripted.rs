use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::backend::{PositionSensor, PositionUpdate};
use crate::error::{Result, RouteError};

/// Replays a fixed list of updates, one per `interval`
///
/// The first update is sent one interval after `start`. Once the script is
/// exhausted the channel stays open and silent, like a sensor that has
/// stopped moving.
pub struct ScriptedSensor {
    updates: Vec<PositionUpdate>,
    interval: Duration,
    buffer: usize,
    task: Option<JoinHandle<()>>,
}

impl ScriptedSensor {
    pub fn new(updates: Vec<PositionUpdate>, interval: Duration) -> Self {
        Self {
            updates,
            interval,
            buffer: 64,
            task: None,
        }
    }

    pub fn with_buffer(mut self, buffer: usize) -> Self {
        self.buffer = buffer.max(1);
        self
    }
}

#[async_trait::async_trait]
impl PositionSensor for ScriptedSensor {
    async fn start(&mut self) -> Result<mpsc::Receiver<PositionUpdate>> {
        if self.task.is_some() {
            return Err(RouteError::invalid_state("scripted sensor already started"));
        }

        let (tx, rx) = mpsc::channel(self.buffer);
        let updates = std::mem::take(&mut self.updates);
        let interval = self.interval;

        info!("Scripted sensor started ({} updates)", updates.len());

        let task = tokio::spawn(async move {
            for update in updates {
                tokio::time::sleep(interval).await;
                if tx.send(update).await.is_err() {
                    debug!("Scripted sensor consumer went away");
                    return;
                }
            }
            // hold the channel open until cancelled
            tx.closed().await;
        });

        self.task = Some(task);
        Ok(rx)
    }

    async fn stop(&mut self) -> Result<()> {
        if let Some(task) = self.task.take() {
            task.abort();
            info!("Scripted sensor stopped");
        }
        Ok(())
    }

    fn is_active(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

impl Drop for ScriptedSensor {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
