use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use route_replay::{
    format_distance, format_duration, AppState, Config, LatLng, MemoryStore, PlaybackEngine,
    PlaybackSession, PlaybackSpeed, PositionUpdate, RecordingController, RouteStore,
    SensorFactory, SensorSource, StopDraft,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[derive(Parser)]
#[command(name = "route-replay", about = "Record GPS routes and replay them")]
struct Cli {
    /// Config file (without extension)
    #[arg(long, default_value = "config/route-replay")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP API
    Serve,

    /// Record a synthetic walk, then replay it
    Simulate {
        /// Number of position fixes to record
        #[arg(long, default_value_t = 40)]
        points: usize,

        /// Milliseconds between simulated fixes
        #[arg(long, default_value_t = 50)]
        interval_ms: u64,

        /// Replay speed multiplier (1, 2 or 5)
        #[arg(long, default_value_t = 5)]
        speed: u32,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let cfg = Config::load(&cli.config)?;
    info!("Loaded config: {}", cfg.service.name);

    match cli.command {
        Command::Serve => serve(cfg).await,
        Command::Simulate {
            points,
            interval_ms,
            speed,
        } => simulate(cfg, points, Duration::from_millis(interval_ms), speed).await,
    }
}

async fn serve(cfg: Config) -> Result<()> {
    let state = AppState::new(
        Arc::new(MemoryStore::new()),
        cfg.recording_config(),
        cfg.playback_config(),
    );
    let app = route_replay::create_router(state);

    let addr = format!("{}:{}", cfg.service.http.bind, cfg.service.http.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("HTTP server listening on {}", addr);
    axum::serve(listener, app).await.context("HTTP server failed")?;

    Ok(())
}

async fn simulate(cfg: Config, points: usize, interval: Duration, speed: u32) -> Result<()> {
    let speed = PlaybackSpeed::try_from(speed)?;
    let store: Arc<dyn RouteStore> = Arc::new(MemoryStore::new());

    // ~11 m steps heading north-east from the origin
    let origin = LatLng::new(40.7128, -74.0060);
    let updates: Vec<PositionUpdate> = (0..points)
        .map(|i| {
            let step = i as f64 * 0.0001;
            PositionUpdate::Fix(LatLng::new(origin.lat + step, origin.lng + step))
        })
        .collect();

    let recording = cfg.recording_config();
    let (sensor, _) = SensorFactory::create(
        SensorSource::Scripted { updates, interval },
        recording.sensor_config(),
    );

    let controller = RecordingController::new(recording, Arc::clone(&store));
    let route = controller.start("simulator", None, sensor).await?;
    info!("Recording simulated route {}", route.id);

    tokio::time::sleep(interval * (points as u32 / 2 + 1)).await;
    let live = controller.snapshot().await;
    info!(
        "{} points so far: {} in {}",
        live.point_count,
        live.distance_label(),
        live.duration_label()
    );

    let stop = controller
        .add_stop(StopDraft::new("Halfway").with_notes("simulated stop").with_rating(4))
        .await?;
    info!("Added stop '{}' at sequence {}", stop.place_name, stop.sequence);

    tokio::time::sleep(interval * (points as u32 / 2 + 1)).await;
    let route = controller.finish().await?;
    info!(
        "Recorded {} in {}",
        format_distance(route.total_distance),
        format_duration(route.total_duration)
    );

    let engine = PlaybackEngine::load(store.as_ref(), route.id, cfg.playback_config()).await?;
    let handle = PlaybackSession::spawn(engine);
    handle.set_speed(speed).await?;
    handle.play().await?;

    let mut telemetry = handle.subscribe();
    loop {
        let t = telemetry.borrow_and_update().clone();
        info!(
            "{:>3.0}% {}/{} {}",
            t.progress_percent,
            t.index,
            t.total,
            t.active_stop
                .as_ref()
                .map(|s| format!("at {}", s.place_name))
                .unwrap_or_default()
        );
        if !t.playing || telemetry.changed().await.is_err() {
            break;
        }
    }

    handle.close().await;
    Ok(())
}
