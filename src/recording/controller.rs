use chrono::Utc;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use super::config::RecordingConfig;
use super::telemetry::{RecordingState, RecordingTelemetry, StopDraft};
use super::worker::{Command, SessionWorker};
use crate::error::{Result, RouteError};
use crate::sensor::PositionSensor;
use crate::store::{Route, RouteStore, Stop};

enum Slot {
    Idle,
    Active(ActiveSession),
    Completed(Route),
}

struct ActiveSession {
    route: Route,
    commands: mpsc::Sender<Command>,
    task: JoinHandle<()>,
}

/// Owns one recording session from start to finish
///
/// Each controller is an independent instance: the live state lives in a
/// task spawned by `start`, and commands reach it over a channel. Dropping
/// the controller closes that channel, which cancels the position
/// subscription and the duration ticker.
pub struct RecordingController {
    config: RecordingConfig,
    store: Arc<dyn RouteStore>,
    slot: Mutex<Slot>,
    telemetry_tx: Arc<watch::Sender<RecordingTelemetry>>,
    telemetry_rx: watch::Receiver<RecordingTelemetry>,
}

impl RecordingController {
    pub fn new(config: RecordingConfig, store: Arc<dyn RouteStore>) -> Self {
        let (telemetry_tx, telemetry_rx) = watch::channel(RecordingTelemetry::idle());

        Self {
            config,
            store,
            slot: Mutex::new(Slot::Idle),
            telemetry_tx: Arc::new(telemetry_tx),
            telemetry_rx,
        }
    }

    /// Idle -> Recording
    ///
    /// Opens the sensor subscription, creates the route and spawns the
    /// session task.
    pub async fn start(
        &self,
        owner: &str,
        title: Option<String>,
        mut sensor: Box<dyn PositionSensor>,
    ) -> Result<Route> {
        let mut slot = self.slot.lock().await;
        match &*slot {
            Slot::Idle => {}
            Slot::Active(session) => {
                return Err(RouteError::invalid_state(format!(
                    "route {} is already recording",
                    session.route.id
                )))
            }
            Slot::Completed(route) => {
                return Err(RouteError::invalid_state(format!(
                    "route {} is completed",
                    route.id
                )))
            }
        }

        let updates = sensor.start().await?;

        let started_at = Utc::now();
        let title = title
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| Route::default_title(started_at));

        let route = match self.store.create_route(owner, &title, started_at).await {
            Ok(route) => route,
            Err(e) => {
                error!("Failed to create route for {}: {}", owner, e);
                if let Err(e) = sensor.stop().await {
                    error!("Failed to stop {} sensor: {}", sensor.name(), e);
                }
                return Err(e);
            }
        };

        info!(
            "Starting recording of route {} ('{}') with {} sensor",
            route.id,
            route.title,
            sensor.name()
        );

        let (commands, command_rx) = mpsc::channel(self.config.command_buffer.max(1));
        let worker = SessionWorker::new(
            Arc::clone(&self.store),
            sensor,
            route.clone(),
            tokio::time::Instant::now(),
            self.config.ticker_interval,
            Arc::clone(&self.telemetry_tx),
        );
        let task = tokio::spawn(worker.run(updates, command_rx));

        *slot = Slot::Active(ActiveSession {
            route: route.clone(),
            commands,
            task,
        });

        Ok(route)
    }

    /// Recording -> Paused
    ///
    /// A failed status write leaves the session recording; retry the call.
    pub async fn pause(&self) -> Result<()> {
        self.request(Command::Pause).await?
    }

    /// Paused -> Recording
    pub async fn resume(&self) -> Result<()> {
        self.request(Command::Resume).await?
    }

    /// Annotate the last known live position
    pub async fn add_stop(&self, draft: StopDraft) -> Result<Stop> {
        self.request(|reply| Command::AddStop(draft, reply)).await?
    }

    /// Recording or Paused -> Completed
    ///
    /// Returns the route with its final status and totals. If the final
    /// write fails the session stays active and `finish` may be retried.
    pub async fn finish(&self) -> Result<Route> {
        let mut slot = self.slot.lock().await;
        let session = match &*slot {
            Slot::Active(session) => session,
            Slot::Idle => return Err(RouteError::invalid_state("no recording in progress")),
            Slot::Completed(route) => {
                return Err(RouteError::invalid_state(format!(
                    "route {} is already completed",
                    route.id
                )))
            }
        };

        let route = Self::send(session, Command::Finish).await??;

        if let Slot::Active(session) = std::mem::replace(&mut *slot, Slot::Completed(route.clone()))
        {
            if let Err(e) = session.task.await {
                error!("Recording task panicked: {}", e);
            }
        }

        Ok(route)
    }

    /// Abandon the active session without completing the route
    ///
    /// The subscription and ticker are cancelled; the stored route keeps
    /// whatever status it last had. The controller returns to Idle.
    pub async fn teardown(&self) {
        let mut slot = self.slot.lock().await;
        if !matches!(&*slot, Slot::Active(_)) {
            return;
        }

        if let Slot::Active(session) = std::mem::replace(&mut *slot, Slot::Idle) {
            warn!("Tearing down recording of route {}", session.route.id);
            drop(session.commands);
            if let Err(e) = session.task.await {
                error!("Recording task panicked: {}", e);
            }
        }

        self.telemetry_tx.send_replace(RecordingTelemetry::idle());
    }

    /// Current state of the controller
    pub async fn state(&self) -> RecordingState {
        match &*self.slot.lock().await {
            Slot::Idle => RecordingState::Idle,
            Slot::Active(_) => self.telemetry_rx.borrow().state,
            Slot::Completed(_) => RecordingState::Completed,
        }
    }

    /// Route of the active or completed session
    pub async fn route(&self) -> Option<Route> {
        match &*self.slot.lock().await {
            Slot::Idle => None,
            Slot::Active(session) => Some(session.route.clone()),
            Slot::Completed(route) => Some(route.clone()),
        }
    }

    /// Telemetry that reflects every update queued before this call
    pub async fn snapshot(&self) -> RecordingTelemetry {
        match self.request(Command::Snapshot).await {
            Ok(telemetry) => telemetry,
            Err(_) => self.telemetry(),
        }
    }

    /// Last published telemetry
    pub fn telemetry(&self) -> RecordingTelemetry {
        self.telemetry_rx.borrow().clone()
    }

    /// Telemetry stream for the presentation layer
    pub fn subscribe(&self) -> watch::Receiver<RecordingTelemetry> {
        self.telemetry_rx.clone()
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T> {
        let slot = self.slot.lock().await;
        match &*slot {
            Slot::Active(session) => Self::send(session, make).await,
            Slot::Idle => Err(RouteError::invalid_state("no recording in progress")),
            Slot::Completed(route) => Err(RouteError::invalid_state(format!(
                "route {} is completed",
                route.id
            ))),
        }
    }

    async fn send<T>(
        session: &ActiveSession,
        make: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T> {
        let (reply, response) = oneshot::channel();
        session
            .commands
            .send(make(reply))
            .await
            .map_err(|_| RouteError::invalid_state("recording task is not running"))?;

        response
            .await
            .map_err(|_| RouteError::invalid_state("recording task stopped before replying"))
    }
}
