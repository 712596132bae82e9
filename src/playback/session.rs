use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info};

use super::engine::{PlaybackEngine, PlaybackTelemetry, TickOutcome};
use super::PlaybackSpeed;
use crate::error::{Result, RouteError};

enum PlaybackCommand {
    Play,
    Pause,
    Seek(usize),
    SetSpeed(PlaybackSpeed),
    JumpToStop(usize),
    Snapshot,
}

type Request = (PlaybackCommand, oneshot::Sender<Result<PlaybackTelemetry>>);

/// Cooperative tick loop driving a `PlaybackEngine`
///
/// The loop sleeps until the next tick deadline only while playing; pause,
/// reaching the last point and dropping the handle all cancel the pending
/// tick.
pub struct PlaybackSession;

impl PlaybackSession {
    pub fn spawn(engine: PlaybackEngine) -> PlaybackHandle {
        let (commands, command_rx) = mpsc::channel(16);
        let (telemetry_tx, telemetry_rx) = watch::channel(engine.telemetry());

        let task = tokio::spawn(Self::run(engine, command_rx, telemetry_tx));

        PlaybackHandle {
            commands,
            telemetry: telemetry_rx,
            task,
        }
    }

    async fn run(
        mut engine: PlaybackEngine,
        mut commands: mpsc::Receiver<Request>,
        telemetry: watch::Sender<PlaybackTelemetry>,
    ) {
        let route_id = engine.route().id;
        info!("Playback started for route {} ({} points)", route_id, engine.len());

        let mut next_tick: Option<Instant> = None;

        loop {
            tokio::select! {
                request = commands.recv() => {
                    let Some((command, reply)) = request else {
                        break;
                    };

                    let was_playing = engine.is_playing();
                    let result = Self::apply(&mut engine, command);

                    next_tick = match (was_playing, engine.is_playing()) {
                        (_, false) => None,
                        (false, true) => Some(Instant::now() + engine.tick_interval()),
                        // speed changes apply from the tick after the pending one
                        (true, true) => next_tick,
                    };

                    let _ = reply.send(result.map(|_| engine.telemetry()));
                }

                _ = tokio::time::sleep_until(next_tick.unwrap_or_else(Instant::now)), if next_tick.is_some() => {
                    next_tick = match engine.tick() {
                        TickOutcome::Advanced(_) => Some(Instant::now() + engine.tick_interval()),
                        TickOutcome::Finished(index) => {
                            debug!("Playback of route {} reached point {}", route_id, index);
                            None
                        }
                        TickOutcome::Idle => None,
                    };
                }
            }

            telemetry.send_replace(engine.telemetry());
        }

        info!("Playback closed for route {}", route_id);
    }

    fn apply(engine: &mut PlaybackEngine, command: PlaybackCommand) -> Result<()> {
        match command {
            PlaybackCommand::Play => {
                engine.play();
            }
            PlaybackCommand::Pause => engine.pause(),
            PlaybackCommand::Seek(index) => {
                engine.seek(index);
            }
            PlaybackCommand::SetSpeed(speed) => engine.set_speed(speed),
            PlaybackCommand::JumpToStop(ordinal) => {
                engine.jump_to_stop(ordinal)?;
            }
            PlaybackCommand::Snapshot => {}
        }
        Ok(())
    }
}

/// Transport controls for a running playback session
///
/// Dropping the handle stops the tick loop.
pub struct PlaybackHandle {
    commands: mpsc::Sender<Request>,
    telemetry: watch::Receiver<PlaybackTelemetry>,
    task: JoinHandle<()>,
}

impl PlaybackHandle {
    pub async fn play(&self) -> Result<PlaybackTelemetry> {
        self.request(PlaybackCommand::Play).await
    }

    pub async fn pause(&self) -> Result<PlaybackTelemetry> {
        self.request(PlaybackCommand::Pause).await
    }

    pub async fn seek(&self, index: usize) -> Result<PlaybackTelemetry> {
        self.request(PlaybackCommand::Seek(index)).await
    }

    pub async fn set_speed(&self, speed: PlaybackSpeed) -> Result<PlaybackTelemetry> {
        self.request(PlaybackCommand::SetSpeed(speed)).await
    }

    pub async fn jump_to_stop(&self, ordinal: usize) -> Result<PlaybackTelemetry> {
        self.request(PlaybackCommand::JumpToStop(ordinal)).await
    }

    /// Telemetry after every previously sent command has been applied
    pub async fn snapshot(&self) -> Result<PlaybackTelemetry> {
        self.request(PlaybackCommand::Snapshot).await
    }

    /// Last published telemetry
    pub fn telemetry(&self) -> PlaybackTelemetry {
        self.telemetry.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<PlaybackTelemetry> {
        self.telemetry.clone()
    }

    /// Stop the tick loop and wait for the task to exit
    pub async fn close(self) {
        drop(self.commands);
        if let Err(e) = self.task.await {
            error!("Playback task panicked: {}", e);
        }
    }

    async fn request(&self, command: PlaybackCommand) -> Result<PlaybackTelemetry> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send((command, reply))
            .await
            .map_err(|_| RouteError::invalid_state("playback session is closed"))?;

        response
            .await
            .map_err(|_| RouteError::invalid_state("playback session closed before replying"))?
    }
}
