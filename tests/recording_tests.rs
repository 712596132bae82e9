// Integration tests for the recording controller
//
// These tests drive a live session through a ChannelSensor and verify the
// state machine, gapless point sequencing, distance accumulation and
// degraded-mode handling of sensor and persistence failures.

use anyhow::Result;
use chrono::{DateTime, Utc};
use route_replay::geo::{distance, LatLng, EARTH_RADIUS_M};
use route_replay::recording::{RecordingConfig, RecordingController, RecordingState, StopDraft};
use route_replay::sensor::{ChannelSensor, PositionUpdate, ScriptedSensor, SensorFeed};
use route_replay::store::{
    MemoryStore, NewMedia, NewStop, Route, RoutePoint, RouteStatus, RouteStore, RouteUpdate, Stop,
    StopMedia,
};
use route_replay::{RouteError, SensorError};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

/// Store wrapper that fails selected writes
#[derive(Default)]
struct FlakyStore {
    inner: MemoryStore,
    append_calls: AtomicU32,
    failing_appends: Mutex<HashSet<u32>>,
    fail_completion: AtomicBool,
    fail_resume: AtomicBool,
    fail_stops: AtomicBool,
}

impl FlakyStore {
    fn failing_appends(calls: &[u32]) -> Self {
        let store = Self::default();
        store.failing_appends.lock().unwrap().extend(calls);
        store
    }
}

#[async_trait::async_trait]
impl RouteStore for FlakyStore {
    async fn create_route(
        &self,
        owner: &str,
        title: &str,
        started_at: DateTime<Utc>,
    ) -> route_replay::Result<Route> {
        self.inner.create_route(owner, title, started_at).await
    }

    async fn get_route(&self, route_id: Uuid) -> route_replay::Result<Route> {
        self.inner.get_route(route_id).await
    }

    async fn list_routes(&self, owner: &str) -> route_replay::Result<Vec<Route>> {
        self.inner.list_routes(owner).await
    }

    async fn update_route_status(
        &self,
        route_id: Uuid,
        update: RouteUpdate,
    ) -> route_replay::Result<Route> {
        if update.status == RouteStatus::Completed && self.fail_completion.load(Ordering::SeqCst) {
            return Err(RouteError::persistence("connection reset"));
        }
        if update.status == RouteStatus::Recording && self.fail_resume.load(Ordering::SeqCst) {
            return Err(RouteError::persistence("connection reset"));
        }
        self.inner.update_route_status(route_id, update).await
    }

    async fn delete_route(&self, route_id: Uuid) -> route_replay::Result<()> {
        self.inner.delete_route(route_id).await
    }

    async fn append_point(
        &self,
        route_id: Uuid,
        position: LatLng,
        sequence: u32,
        recorded_at: DateTime<Utc>,
    ) -> route_replay::Result<RoutePoint> {
        let call = self.append_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing_appends.lock().unwrap().contains(&call) {
            return Err(RouteError::persistence("timeout"));
        }
        self.inner
            .append_point(route_id, position, sequence, recorded_at)
            .await
    }

    async fn list_points(&self, route_id: Uuid) -> route_replay::Result<Vec<RoutePoint>> {
        self.inner.list_points(route_id).await
    }

    async fn create_stop(&self, route_id: Uuid, stop: NewStop) -> route_replay::Result<Stop> {
        if self.fail_stops.load(Ordering::SeqCst) {
            return Err(RouteError::persistence("timeout"));
        }
        self.inner.create_stop(route_id, stop).await
    }

    async fn list_stops(&self, route_id: Uuid) -> route_replay::Result<Vec<Stop>> {
        self.inner.list_stops(route_id).await
    }

    async fn delete_stop(&self, stop_id: Uuid) -> route_replay::Result<()> {
        self.inner.delete_stop(stop_id).await
    }

    async fn attach_media(
        &self,
        stop_id: Uuid,
        media: NewMedia,
    ) -> route_replay::Result<StopMedia> {
        self.inner.attach_media(stop_id, media).await
    }

    async fn list_media(&self, stop_id: Uuid) -> route_replay::Result<Vec<StopMedia>> {
        self.inner.list_media(stop_id).await
    }
}

async fn start_session(
    store: Arc<dyn RouteStore>,
) -> Result<(RecordingController, SensorFeed, Route)> {
    let controller = RecordingController::new(RecordingConfig::default(), store);
    let (sensor, feed) = ChannelSensor::new(64);
    let route = controller.start("alice", None, Box::new(sensor)).await?;
    Ok((controller, feed, route))
}

/// Point `meters` due north of `from`
fn north_of(from: LatLng, meters: f64) -> LatLng {
    let degrees = meters / (EARTH_RADIUS_M * std::f64::consts::PI / 180.0);
    LatLng::new(from.lat + degrees, from.lng)
}

#[tokio::test]
async fn test_two_points_ten_meters_apart() -> Result<()> {
    let store: Arc<dyn RouteStore> = Arc::new(MemoryStore::new());
    let (controller, feed, route) = start_session(Arc::clone(&store)).await?;

    assert_eq!(route.status, RouteStatus::Recording);
    assert_eq!(controller.state().await, RecordingState::Recording);

    let a = LatLng::new(45.0, 7.0);
    feed.push_fix(a).await?;
    feed.push_fix(north_of(a, 10.0)).await?;

    let finished = controller.finish().await?;

    assert_eq!(finished.status, RouteStatus::Completed);
    assert!(finished.finished_at.is_some());
    assert!(
        (finished.total_distance - 10.0).abs() < 0.01,
        "Expected ~10m, got {}",
        finished.total_distance
    );
    assert_eq!(store.list_points(route.id).await?.len(), 2);
    assert_eq!(controller.state().await, RecordingState::Completed);

    Ok(())
}

#[tokio::test]
async fn test_sequences_are_gapless_and_distance_matches_path() -> Result<()> {
    let store: Arc<dyn RouteStore> = Arc::new(MemoryStore::new());
    let (controller, feed, route) = start_session(Arc::clone(&store)).await?;

    let mut position = LatLng::new(-33.86, 151.2);
    for i in 0..25 {
        position = LatLng::new(position.lat + 0.0001, position.lng + (i % 3) as f64 * 0.00005);
        feed.push_fix(position).await?;
    }

    let telemetry = controller.snapshot().await;
    assert_eq!(telemetry.point_count, 25);

    let finished = controller.finish().await?;
    let points = store.list_points(route.id).await?;

    let sequences: Vec<u32> = points.iter().map(|p| p.sequence).collect();
    assert_eq!(sequences, (0..25).collect::<Vec<u32>>());

    let path_total = route_replay::total_distance(points.iter().map(RoutePoint::position));
    assert!((finished.total_distance - path_total).abs() < 1e-6);

    Ok(())
}

#[tokio::test]
async fn test_pause_drops_samples_and_resume_continues_sequence() -> Result<()> {
    let store: Arc<dyn RouteStore> = Arc::new(MemoryStore::new());
    let (controller, feed, route) = start_session(Arc::clone(&store)).await?;

    let a = LatLng::new(10.0, 10.0);
    let b = north_of(a, 20.0);
    feed.push_fix(a).await?;
    feed.push_fix(b).await?;

    controller.pause().await?;
    assert_eq!(store.get_route(route.id).await?.status, RouteStatus::Paused);

    // Received while paused: shown on screen, never stored
    let detour = north_of(b, 500.0);
    feed.push_fix(detour).await?;

    let telemetry = controller.snapshot().await;
    assert_eq!(telemetry.state, RecordingState::Paused);
    assert_eq!(telemetry.point_count, 2);
    assert_eq!(telemetry.last_position, Some(detour));
    assert!((telemetry.total_distance - 20.0).abs() < 0.01);

    controller.resume().await?;
    assert_eq!(store.get_route(route.id).await?.status, RouteStatus::Recording);

    let c = north_of(b, 5.0);
    feed.push_fix(c).await?;

    let finished = controller.finish().await?;
    let points = store.list_points(route.id).await?;

    assert_eq!(points.len(), 3);
    assert_eq!(points[2].sequence, 2);
    assert_eq!(points[2].position(), c);
    // distance is measured from the last stored point, not the paused detour
    assert!((finished.total_distance - 25.0).abs() < 0.01);

    Ok(())
}

#[tokio::test]
async fn test_add_stop_requires_live_position() -> Result<()> {
    let store: Arc<dyn RouteStore> = Arc::new(MemoryStore::new());
    let (controller, feed, route) = start_session(Arc::clone(&store)).await?;

    let err = controller.add_stop(StopDraft::new("Bakery")).await.unwrap_err();
    assert!(matches!(err, RouteError::InvalidState(_)));
    assert!(store.list_stops(route.id).await?.is_empty());

    let a = LatLng::new(41.9, 12.5);
    feed.push_fix(a).await?;
    feed.push_fix(north_of(a, 3.0)).await?;

    let stop = controller
        .add_stop(StopDraft::new("Bakery").with_notes("cornetti").with_rating(5))
        .await?;

    assert_eq!(stop.sequence, 2);
    assert_eq!(stop.position(), north_of(a, 3.0));
    assert_eq!(stop.rating, Some(5));
    assert_eq!(controller.snapshot().await.stop_count, 1);

    Ok(())
}

#[tokio::test]
async fn test_add_stop_while_paused_uses_latest_fix() -> Result<()> {
    let store: Arc<dyn RouteStore> = Arc::new(MemoryStore::new());
    let (controller, feed, _route) = start_session(Arc::clone(&store)).await?;

    let a = LatLng::new(41.9, 12.5);
    feed.push_fix(a).await?;
    controller.pause().await?;

    let here = north_of(a, 40.0);
    feed.push_fix(here).await?;

    let stop = controller.add_stop(StopDraft::new("Gelato")).await?;
    assert_eq!(stop.position(), here);
    assert_eq!(stop.sequence, 1);

    Ok(())
}

#[tokio::test]
async fn test_add_stop_validates_input() -> Result<()> {
    let store: Arc<dyn RouteStore> = Arc::new(MemoryStore::new());
    let (controller, feed, _route) = start_session(store).await?;
    feed.push_fix(LatLng::new(0.0, 0.0)).await?;

    let err = controller
        .add_stop(StopDraft::new("Diner").with_rating(6))
        .await
        .unwrap_err();
    assert!(matches!(err, RouteError::InvalidInput(_)));

    let err = controller.add_stop(StopDraft::new("   ")).await.unwrap_err();
    assert!(matches!(err, RouteError::InvalidInput(_)));

    Ok(())
}

#[tokio::test]
async fn test_commands_rejected_in_wrong_state() -> Result<()> {
    let store: Arc<dyn RouteStore> = Arc::new(MemoryStore::new());
    let controller = RecordingController::new(RecordingConfig::default(), Arc::clone(&store));

    // Idle
    assert!(matches!(controller.finish().await, Err(RouteError::InvalidState(_))));
    assert!(matches!(controller.pause().await, Err(RouteError::InvalidState(_))));
    assert!(matches!(
        controller.add_stop(StopDraft::new("x")).await,
        Err(RouteError::InvalidState(_))
    ));
    assert_eq!(controller.state().await, RecordingState::Idle);

    let (sensor, _feed) = ChannelSensor::new(8);
    controller.start("alice", Some("Evening".to_string()), Box::new(sensor)).await?;

    // Recording
    assert!(matches!(controller.resume().await, Err(RouteError::InvalidState(_))));
    let (again, _) = ChannelSensor::new(8);
    assert!(matches!(
        controller.start("alice", None, Box::new(again)).await,
        Err(RouteError::InvalidState(_))
    ));

    // Paused
    controller.pause().await?;
    assert!(matches!(controller.pause().await, Err(RouteError::InvalidState(_))));

    // Completed
    let route = controller.finish().await?;
    assert_eq!(route.title, "Evening");
    assert!(matches!(controller.finish().await, Err(RouteError::InvalidState(_))));
    assert!(matches!(controller.resume().await, Err(RouteError::InvalidState(_))));

    Ok(())
}

#[tokio::test]
async fn test_sensor_errors_are_warnings() -> Result<()> {
    let store: Arc<dyn RouteStore> = Arc::new(MemoryStore::new());
    let (controller, feed, route) = start_session(Arc::clone(&store)).await?;

    feed.push_fix(LatLng::new(1.0, 1.0)).await?;
    feed.push_error(SensorError::Timeout).await?;
    feed.push_error(SensorError::Unavailable).await?;
    feed.push_fix(LatLng::new(f64::NAN, 1.0)).await?;
    feed.push_fix(LatLng::new(1.0001, 1.0)).await?;

    let telemetry = controller.snapshot().await;
    assert_eq!(telemetry.state, RecordingState::Recording);
    assert_eq!(telemetry.sensor_errors, 3);
    assert_eq!(telemetry.point_count, 2);
    assert!(telemetry.last_error.is_some());
    assert!(telemetry.total_distance.is_finite());

    controller.finish().await?;
    assert_eq!(store.list_points(route.id).await?.len(), 2);

    Ok(())
}

#[tokio::test]
async fn test_failed_point_write_is_skipped() -> Result<()> {
    // Second append call fails
    let store: Arc<dyn RouteStore> = Arc::new(FlakyStore::failing_appends(&[1]));
    let (controller, feed, route) = start_session(Arc::clone(&store)).await?;

    let a = LatLng::new(60.0, 25.0);
    let b = north_of(a, 10.0);
    let c = north_of(b, 10.0);
    feed.push_fix(a).await?;
    feed.push_fix(b).await?; // lost
    feed.push_fix(c).await?;

    let telemetry = controller.snapshot().await;
    assert_eq!(telemetry.state, RecordingState::Recording);
    assert_eq!(telemetry.failed_writes, 1);
    assert_eq!(telemetry.point_count, 2);
    assert!(telemetry
        .last_error
        .as_deref()
        .is_some_and(|e| e.contains("Failed to save point")));

    let finished = controller.finish().await?;
    let points = store.list_points(route.id).await?;

    assert_eq!(points.iter().map(|p| p.sequence).collect::<Vec<_>>(), vec![0, 1]);
    assert_eq!(points[1].position(), c);
    assert!((finished.total_distance - 20.0).abs() < 0.01);

    Ok(())
}

#[tokio::test]
async fn test_failed_finish_keeps_session_alive() -> Result<()> {
    let flaky = Arc::new(FlakyStore::default());
    let store: Arc<dyn RouteStore> = flaky.clone();
    let (controller, feed, route) = start_session(Arc::clone(&store)).await?;

    feed.push_fix(LatLng::new(0.0, 0.0)).await?;
    flaky.fail_completion.store(true, Ordering::SeqCst);

    let err = controller.finish().await.unwrap_err();
    assert!(matches!(err, RouteError::Persistence(_)));
    assert!(err.is_recoverable());
    assert_eq!(controller.state().await, RecordingState::Recording);

    // Still accepting samples
    feed.push_fix(LatLng::new(0.0, 0.0001)).await?;
    assert_eq!(controller.snapshot().await.point_count, 2);

    flaky.fail_completion.store(false, Ordering::SeqCst);
    let finished = controller.finish().await?;
    assert_eq!(finished.status, RouteStatus::Completed);
    assert_eq!(store.list_points(route.id).await?.len(), 2);

    Ok(())
}

#[tokio::test]
async fn test_finish_cancels_subscription() -> Result<()> {
    let store: Arc<dyn RouteStore> = Arc::new(MemoryStore::new());
    let (controller, feed, route) = start_session(Arc::clone(&store)).await?;

    feed.push_fix(LatLng::new(0.0, 0.0)).await?;
    controller.finish().await?;

    assert!(!feed.is_active());
    assert!(feed.push_fix(LatLng::new(0.0, 0.001)).await.is_err());
    assert_eq!(store.list_points(route.id).await?.len(), 1);

    Ok(())
}

#[tokio::test]
async fn test_teardown_abandons_session() -> Result<()> {
    let store: Arc<dyn RouteStore> = Arc::new(MemoryStore::new());
    let (controller, feed, route) = start_session(Arc::clone(&store)).await?;

    feed.push_fix(LatLng::new(0.0, 0.0)).await?;
    controller.pause().await?;
    controller.teardown().await;

    assert_eq!(controller.state().await, RecordingState::Idle);
    assert!(feed.push_fix(LatLng::new(0.0, 0.001)).await.is_err());

    // The stored route keeps its last status
    assert_eq!(store.get_route(route.id).await?.status, RouteStatus::Paused);

    // A fresh session may start on the same controller
    let (sensor, _feed) = ChannelSensor::new(8);
    let next = controller.start("alice", None, Box::new(sensor)).await?;
    assert_ne!(next.id, route.id);

    Ok(())
}

#[tokio::test]
async fn test_dropping_controller_cancels_subscription() -> Result<()> {
    let store: Arc<dyn RouteStore> = Arc::new(MemoryStore::new());
    let (controller, feed, _route) = start_session(store).await?;

    feed.push_fix(LatLng::new(0.0, 0.0)).await?;
    drop(controller);

    tokio::time::timeout(Duration::from_secs(5), async {
        while feed.is_active() {
            tokio::task::yield_now().await;
        }
    })
    .await?;

    assert!(feed.push_fix(LatLng::new(0.0, 0.001)).await.is_err());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_duration_ticks_from_start_instant() -> Result<()> {
    let store: Arc<dyn RouteStore> = Arc::new(MemoryStore::new());
    let (controller, _feed, _route) = start_session(store).await?;

    tokio::time::sleep(Duration::from_millis(3500)).await;
    assert_eq!(controller.telemetry().duration_secs, 3);

    // Paused time still counts towards the route duration
    controller.pause().await?;
    tokio::time::sleep(Duration::from_secs(2)).await;
    let telemetry = controller.snapshot().await;
    assert_eq!(telemetry.duration_secs, 5);
    assert_eq!(telemetry.duration_label(), "5s");

    let route = controller.finish().await?;
    assert_eq!(route.total_duration, 5);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_scripted_sensor_session() -> Result<()> {
    let store: Arc<dyn RouteStore> = Arc::new(MemoryStore::new());
    let controller = RecordingController::new(RecordingConfig::default(), Arc::clone(&store));

    let a = LatLng::new(35.68, 139.76);
    let b = north_of(a, 15.0);
    let c = north_of(b, 15.0);
    let sensor = ScriptedSensor::new(
        vec![
            PositionUpdate::Fix(a),
            PositionUpdate::Error(SensorError::PermissionDenied),
            PositionUpdate::Fix(b),
            PositionUpdate::Fix(c),
        ],
        Duration::from_millis(100),
    );

    let route = controller.start("bob", None, Box::new(sensor)).await?;
    tokio::time::sleep(Duration::from_millis(450)).await;

    let telemetry = controller.snapshot().await;
    assert_eq!(telemetry.point_count, 3);
    assert_eq!(telemetry.sensor_errors, 1);
    assert!((telemetry.total_distance - distance(a, c)).abs() < 1e-6);

    let finished = controller.finish().await?;
    assert_eq!(finished.id, route.id);
    assert!(finished.title.starts_with("Route "));

    Ok(())
}

#[tokio::test]
async fn test_telemetry_subscription_sees_progress() -> Result<()> {
    let store: Arc<dyn RouteStore> = Arc::new(MemoryStore::new());
    let (controller, feed, route) = start_session(store).await?;
    let mut telemetry = controller.subscribe();

    feed.push_fix(LatLng::new(0.0, 0.0)).await?;

    let seen = tokio::time::timeout(
        Duration::from_secs(5),
        telemetry.wait_for(|t| t.point_count == 1),
    )
    .await??
    .clone();

    assert_eq!(seen.route_id, Some(route.id));
    assert_eq!(seen.distance_label(), "0m");
    Ok(())
}

#[tokio::test]
async fn test_failed_resume_keeps_session_paused() -> Result<()> {
    let flaky = Arc::new(FlakyStore::default());
    let store: Arc<dyn RouteStore> = flaky.clone();
    let (controller, feed, route) = start_session(Arc::clone(&store)).await?;

    let a = LatLng::new(48.85, 2.35);
    feed.push_fix(a).await?;
    controller.pause().await?;

    flaky.fail_resume.store(true, Ordering::SeqCst);
    let err = controller.resume().await.unwrap_err();
    assert!(matches!(err, RouteError::Persistence(_)));

    // Stored and in-memory state agree: still paused
    let telemetry = controller.snapshot().await;
    assert_eq!(telemetry.state, RecordingState::Paused);
    assert_eq!(telemetry.failed_writes, 1);
    assert_eq!(store.get_route(route.id).await?.status, RouteStatus::Paused);

    flaky.fail_resume.store(false, Ordering::SeqCst);
    controller.resume().await?;

    let mut position = a;
    for _ in 0..5 {
        position = north_of(position, 10.0);
        feed.push_fix(position).await?;
    }

    let telemetry = controller.snapshot().await;
    assert_eq!(telemetry.state, RecordingState::Recording);
    assert_eq!(telemetry.point_count, 6);
    assert_eq!(telemetry.failed_writes, 1);
    assert!((telemetry.total_distance - 50.0).abs() < 0.01);
    assert_eq!(store.list_points(route.id).await?.len(), 6);

    Ok(())
}

#[tokio::test]
async fn test_failed_stop_write_is_counted() -> Result<()> {
    let flaky = Arc::new(FlakyStore::default());
    let store: Arc<dyn RouteStore> = flaky.clone();
    let (controller, feed, route) = start_session(Arc::clone(&store)).await?;

    feed.push_fix(LatLng::new(0.0, 0.0)).await?;
    flaky.fail_stops.store(true, Ordering::SeqCst);

    let err = controller.add_stop(StopDraft::new("Kiosk")).await.unwrap_err();
    assert!(matches!(err, RouteError::Persistence(_)));

    let telemetry = controller.snapshot().await;
    assert_eq!(telemetry.failed_writes, 1);
    assert_eq!(telemetry.stop_count, 0);
    assert!(telemetry
        .last_error
        .as_deref()
        .is_some_and(|e| e.contains("Failed to save stop")));
    assert!(store.list_stops(route.id).await?.is_empty());

    Ok(())
}
