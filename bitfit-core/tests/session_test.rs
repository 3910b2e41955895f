use std::sync::Arc;

use bitfit_lib::activity::{ActivityType, DistanceType, DistanceUnit};
use bitfit_lib::location::{destination, LocationSample, LocationSource, ManualLocationSource};
use bitfit_lib::session::{
    ChannelObserver, FinalizationStage, TrackerError, TrackerEvent, WorkoutTracker,
};
use bitfit_lib::sink::{InMemorySink, SinkError, SinkOperation};
use bitfit_lib::state::{TrackerConfig, WorkoutState};
use chrono::{DateTime, Utc};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::{sleep, timeout, Duration};

const ORIGIN: (f64, f64) = (40.015, -105.2705);

/// A fix `north` meters due north of the origin
fn fix(north: f64, accuracy: f64, at: DateTime<Utc>) -> LocationSample {
    let (lat, lon) = destination(ORIGIN.0, ORIGIN.1, 0.0, north);
    LocationSample::new(lat, lon, accuracy, 0.0, at)
}

fn secs(t0: DateTime<Utc>, s: i64) -> DateTime<Utc> {
    t0 + chrono::Duration::seconds(s)
}

struct Harness {
    tracker: Arc<WorkoutTracker>,
    source: Arc<ManualLocationSource>,
    sink: InMemorySink,
    events: UnboundedReceiver<TrackerEvent>,
    t0: DateTime<Utc>,
}

impl Harness {
    async fn new(unit: DistanceUnit) -> Self {
        let (observer, events) = ChannelObserver::new();
        let tracker = WorkoutTracker::with_observer(TrackerConfig::with_unit(unit), observer)
            .expect("valid config");
        Self {
            tracker: Arc::new(tracker),
            source: ManualLocationSource::shared(),
            sink: InMemorySink::new(),
            events,
            t0: Utc::now(),
        }
    }

    async fn start(&mut self) {
        self.tracker
            .start(
                ActivityType::Running,
                self.source.clone(),
                Arc::new(self.sink.clone()),
            )
            .await
            .expect("start");
        self.expect_state(WorkoutState::WaitingForLocationStream).await;
    }

    /// Push a batch and wait until the workout queue has processed it
    async fn push(&self, batch: Vec<LocationSample>) {
        assert!(self.source.push(batch).await, "batch was not delivered");
        self.tracker.snapshot().await.expect("snapshot");
    }

    /// Reference fix then a 1 m away fix with good accuracy
    async fn lock(&mut self) {
        self.push(vec![fix(0.0, 5.0, self.t0), fix(1.0, 5.0, self.t0)])
            .await;
        assert_eq!(self.tracker.state(), WorkoutState::Started);
        self.expect_state(WorkoutState::Started).await;
    }

    async fn next_event(&mut self) -> TrackerEvent {
        timeout(Duration::from_secs(2), self.events.recv())
            .await
            .expect("timed out waiting for event")
            .expect("event channel closed")
    }

    /// Consume events up to and including the given state change
    async fn expect_state(&mut self, state: WorkoutState) -> Vec<TrackerEvent> {
        let mut seen = Vec::new();
        loop {
            let event = self.next_event().await;
            let done = event == TrackerEvent::StateChanged(state);
            seen.push(event);
            if done {
                return seen;
            }
        }
    }

    async fn operations(&self) -> Vec<SinkOperation> {
        self.sink.calls().await.iter().map(|c| c.operation()).collect()
    }
}

#[tokio::test]
async fn test_start_subscribes_and_waits_for_location_stream() {
    let mut h = Harness::new(DistanceUnit::Miles).await;
    h.start().await;

    assert!(h.source.is_updating());
    assert!(h.source.is_subscribed());
    assert_eq!(h.source.start_calls(), 1);
    assert_eq!(h.sink.workouts_opened(), 1);
    assert_eq!(h.sink.routes_opened(), 1);
    assert!(h.sink.calls().await.is_empty());

    let snapshot = h.tracker.snapshot().await.unwrap();
    assert_eq!(snapshot.state, WorkoutState::WaitingForLocationStream);
    assert!(snapshot.is_running);
    assert!(snapshot.splits.is_empty());
}

#[tokio::test]
async fn test_gps_lock_after_poor_accuracy() {
    let mut h = Harness::new(DistanceUnit::Miles).await;
    h.start().await;

    h.push(vec![
        fix(0.0, 50.0, h.t0),
        fix(1.0, 50.0, secs(h.t0, 1)),
        fix(2.0, 8.0, secs(h.t0, 2)),
    ])
    .await;

    let events = h.expect_state(WorkoutState::Started).await;
    assert_eq!(
        events,
        vec![
            TrackerEvent::StateChanged(WorkoutState::WaitingForGpsAccuracy),
            TrackerEvent::StateChanged(WorkoutState::Started),
        ]
    );

    match h.next_event().await {
        TrackerEvent::SplitsUpdated {
            splits,
            summary,
            is_final,
        } => {
            assert_eq!(splits.len(), 1);
            assert_eq!(splits[0].distance_meters, 0.0);
            assert_eq!(summary, None);
            assert!(!is_final);
        }
        other => panic!("unexpected event: {other:?}"),
    }

    let snapshot = h.tracker.snapshot().await.unwrap();
    assert_eq!(snapshot.splits.len(), 1);
    assert!(snapshot.start_date.is_some());
}

#[tokio::test]
async fn test_stop_racing_start_unsubscribes() {
    let h = Harness::new(DistanceUnit::Miles).await;

    let (started, stopped) = tokio::join!(
        h.tracker.start(
            ActivityType::Walking,
            h.source.clone(),
            Arc::new(h.sink.clone()),
        ),
        h.tracker.stop()
    );

    started.unwrap();
    stopped.unwrap();
    assert_eq!(h.tracker.state(), WorkoutState::Stopped);
    assert!(!h.source.is_updating());
    assert!(!h.source.is_subscribed());
    assert_eq!(h.source.stop_calls(), 1);
    assert!(!h.source.push(vec![fix(0.0, 5.0, h.t0)]).await);
}

#[tokio::test]
async fn test_split_crossing() {
    let mut h = Harness::new(DistanceUnit::Kilometers).await;
    h.start().await;
    h.lock().await;

    h.push(vec![fix(501.0, 5.0, secs(h.t0, 200))]).await;
    let snapshot = h.tracker.snapshot().await.unwrap();
    assert_eq!(snapshot.splits.len(), 1);

    h.push(vec![fix(1201.0, 5.0, secs(h.t0, 480))]).await;
    let snapshot = h.tracker.snapshot().await.unwrap();
    assert_eq!(snapshot.splits.len(), 2);
    assert!((snapshot.splits[1].distance_meters - 1201.0).abs() < 0.5);
    assert!((snapshot.distance_meters - 1201.0).abs() < 0.5);
    assert_eq!(snapshot.splits[1].time, secs(h.t0, 480));

    let summary = loop {
        if let TrackerEvent::SplitsUpdated {
            summary: Some(summary),
            ..
        } = h.next_event().await
        {
            break summary;
        }
    };
    assert_eq!(summary.index, 1);
    assert!(!summary.is_final);
    assert!((summary.total_distance_meters - 1201.0).abs() < 0.5);
}

#[tokio::test]
async fn test_splits_are_ordered_and_counted() {
    let mut h = Harness::new(DistanceUnit::Kilometers).await;
    h.start().await;
    h.lock().await;

    // 3.5 km in 10 m steps, 3 seconds apart
    let batch: Vec<_> = (1..=350)
        .map(|i| fix(1.0 + i as f64 * 10.0, 4.0, secs(h.t0, i * 3)))
        .collect();
    h.push(batch).await;

    let snapshot = h.tracker.snapshot().await.unwrap();
    let expected = (snapshot.distance_meters / 1000.0).floor() as usize + 1;
    assert_eq!(snapshot.splits.len(), expected);
    for pair in snapshot.splits.windows(2) {
        assert!(pair[1].time > pair[0].time);
        assert!(pair[1].distance_meters > pair[0].distance_meters);
    }
}

#[tokio::test]
async fn test_jump_while_waiting_is_never_admitted() {
    let mut h = Harness::new(DistanceUnit::Miles).await;
    h.start().await;

    h.push(vec![
        fix(0.0, 5.0, h.t0),
        fix(40.0, 5.0, secs(h.t0, 1)),
        fix(41.0, 5.0, secs(h.t0, 2)),
    ])
    .await;

    let snapshot = h.tracker.snapshot().await.unwrap();
    assert_eq!(snapshot.state, WorkoutState::Started);
    // only the 1 m hop from the new reference counts
    assert!((snapshot.distance_meters - 1.0).abs() < 0.01);
}

#[tokio::test]
async fn test_low_accuracy_never_recorded() {
    let mut h = Harness::new(DistanceUnit::Miles).await;
    h.start().await;
    h.lock().await;
    let before = h.tracker.snapshot().await.unwrap().distance_meters;

    h.push(vec![
        fix(20.0, 25.0, secs(h.t0, 5)),
        fix(30.0, 10.5, secs(h.t0, 6)),
    ])
    .await;

    let snapshot = h.tracker.snapshot().await.unwrap();
    assert_eq!(snapshot.distance_meters, before);

    h.tracker.stop().await.unwrap();
    let finished = h.sink.finished_workouts().await;
    assert_eq!(finished.len(), 1);
    assert!(finished[0]
        .route_points
        .iter()
        .all(|p| p.horizontal_accuracy <= 10.0));
    assert_eq!(finished[0].route_points.len(), 1);
}

#[tokio::test]
async fn test_peak_speed_never_below_current() {
    let mut h = Harness::new(DistanceUnit::Miles).await;
    h.start().await;
    h.lock().await;

    // 4 m/s for five seconds, then 2 m/s
    let mut north = 1.0;
    for i in 1..=12 {
        north += if i < 6 { 4.0 } else { 2.0 };
        h.push(vec![fix(north, 5.0, secs(h.t0, i))]).await;

        let snapshot = h.tracker.snapshot().await.unwrap();
        assert!(snapshot.peak_speed_mps >= snapshot.current_speed_mps);
    }

    let snapshot = h.tracker.snapshot().await.unwrap();
    assert!((snapshot.current_speed_mps - 2.0).abs() < 0.05);
    assert!(snapshot.peak_speed_mps > 3.0);
}

#[tokio::test]
async fn test_successful_stop() {
    let mut h = Harness::new(DistanceUnit::Miles).await;
    h.start().await;
    h.lock().await;
    h.push(vec![fix(301.0, 5.0, secs(h.t0, 100))]).await;

    h.tracker.stop().await.unwrap();

    assert_eq!(h.tracker.state(), WorkoutState::Stopped);
    assert!(!h.source.is_updating());
    assert!(!h.source.is_subscribed());
    assert_eq!(
        h.operations().await,
        vec![
            SinkOperation::BeginCollection,
            SinkOperation::InsertRouteData,
            SinkOperation::InsertRouteData,
            SinkOperation::AddMetadata,
            SinkOperation::AddSamples,
            SinkOperation::EndCollection,
            SinkOperation::FinishWorkout,
            SinkOperation::FinishRoute,
        ]
    );

    let finished = h.sink.finished_workouts().await;
    assert_eq!(finished.len(), 1);
    let workout = &finished[0];
    assert_eq!(workout.samples.len(), 1);
    assert_eq!(workout.samples[0].distance_type, DistanceType::WalkingRunning);
    assert!((workout.samples[0].meters - 301.0).abs() < 0.5);
    assert_eq!(workout.route_points.len(), 2);
    assert!(workout.metadata.is_some());

    // final splits update, then Stopped
    let events = h.expect_state(WorkoutState::Stopped).await;
    assert!(events.iter().any(|e| matches!(
        e,
        TrackerEvent::SplitsUpdated { is_final: true, splits, .. } if splits.len() == 2
    )));

    let snapshot = h.tracker.snapshot().await.unwrap();
    assert!(!snapshot.is_running);
    assert_eq!(snapshot.state, WorkoutState::Stopped);
    assert_eq!(snapshot.splits.len(), 2);
}

#[tokio::test]
async fn test_stop_is_idempotent() {
    let mut h = Harness::new(DistanceUnit::Miles).await;
    h.start().await;
    h.lock().await;

    h.tracker.stop().await.unwrap();
    h.tracker.stop().await.unwrap();

    assert_eq!(h.tracker.state(), WorkoutState::Stopped);
    assert_eq!(h.sink.calls_of(SinkOperation::FinishWorkout).await.len(), 1);
    assert_eq!(h.sink.calls_of(SinkOperation::AddMetadata).await.len(), 1);
}

#[tokio::test]
async fn test_stop_while_waiting_makes_no_sink_calls() {
    let mut h = Harness::new(DistanceUnit::Miles).await;
    h.start().await;
    h.push(vec![fix(0.0, 50.0, h.t0), fix(1.0, 50.0, secs(h.t0, 1))])
        .await;
    assert_eq!(h.tracker.state(), WorkoutState::WaitingForGpsAccuracy);

    h.tracker.stop().await.unwrap();

    assert_eq!(h.tracker.state(), WorkoutState::Stopped);
    assert!(h.sink.calls().await.is_empty());
    assert!(h.sink.finished_workouts().await.is_empty());
}

#[tokio::test]
async fn test_begin_collection_failure_fails_workout() {
    let mut h = Harness::new(DistanceUnit::Miles).await;
    h.sink
        .fail_on(SinkOperation::BeginCollection, "health store unavailable")
        .await;
    h.start().await;

    h.push(vec![fix(0.0, 5.0, h.t0), fix(1.0, 5.0, h.t0)]).await;
    h.expect_state(WorkoutState::Failed).await;

    assert_eq!(h.tracker.state(), WorkoutState::Failed);
    assert!(!h.source.is_updating());
    assert_eq!(h.source.stop_calls(), 1);
    assert!(!h.tracker.is_running().await.unwrap());

    // let the recorder drain the insert queued behind the failed begin
    sleep(Duration::from_millis(20)).await;
    let inserts = h.sink.calls_of(SinkOperation::InsertRouteData).await.len();
    let distance = h.tracker.snapshot().await.unwrap().distance_meters;

    // a source that keeps delivering is ignored by the tracker itself
    h.source.start_updating_location();
    h.push(vec![
        fix(20.0, 5.0, secs(h.t0, 10)),
        fix(40.0, 5.0, secs(h.t0, 20)),
    ])
    .await;
    sleep(Duration::from_millis(20)).await;

    assert_eq!(
        h.sink.calls_of(SinkOperation::InsertRouteData).await.len(),
        inserts
    );
    let snapshot = h.tracker.snapshot().await.unwrap();
    assert_eq!(snapshot.distance_meters, distance);
    assert_eq!(snapshot.state, WorkoutState::Failed);

    // stopping afterwards is a no-op and never finalizes
    h.tracker.stop().await.unwrap();
    assert_eq!(h.tracker.state(), WorkoutState::Failed);
    assert!(h.sink.calls_of(SinkOperation::AddMetadata).await.is_empty());
}

#[tokio::test]
async fn test_finalization_failure_at_each_stage() {
    let cases = [
        (SinkOperation::AddMetadata, FinalizationStage::AttachMetadata),
        (SinkOperation::AddSamples, FinalizationStage::AddDistance),
        (SinkOperation::EndCollection, FinalizationStage::EndCollection),
        (SinkOperation::FinishWorkout, FinalizationStage::FinishWorkout),
        (SinkOperation::FinishRoute, FinalizationStage::FinishRoute),
    ];

    for (operation, stage) in cases {
        let mut h = Harness::new(DistanceUnit::Miles).await;
        h.sink.fail_on(operation, "write failed").await;
        h.start().await;
        h.lock().await;

        let err = h.tracker.stop().await.unwrap_err();
        match err {
            TrackerError::Finalization(e) => {
                assert_eq!(e.stage, stage);
                assert_eq!(e.source.operation(), operation);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(h.tracker.state(), WorkoutState::Failed);

        // no stage after the failing one ran
        let ops = h.operations().await;
        assert_eq!(ops.last(), Some(&operation));
        assert!(!h.tracker.is_running().await.unwrap());
    }
}

#[tokio::test]
async fn test_missing_workout_fails() {
    let mut h = Harness::new(DistanceUnit::Miles).await;
    h.sink.return_nothing_on(SinkOperation::FinishWorkout).await;
    h.start().await;
    h.lock().await;

    let err = h.tracker.stop().await.unwrap_err();

    assert!(matches!(
        err,
        TrackerError::Finalization(ref e) if e.source == SinkError::MissingWorkout
    ));
    assert_eq!(h.tracker.state(), WorkoutState::Failed);
    assert!(h.sink.calls_of(SinkOperation::FinishRoute).await.is_empty());
}

#[tokio::test]
async fn test_route_insert_failure_is_not_fatal() {
    let mut h = Harness::new(DistanceUnit::Miles).await;
    h.sink
        .fail_on(SinkOperation::InsertRouteData, "route store full")
        .await;
    h.start().await;
    h.lock().await;
    h.push(vec![fix(11.0, 5.0, secs(h.t0, 5))]).await;

    assert_eq!(h.tracker.state(), WorkoutState::Started);
    h.tracker.stop().await.unwrap();
    assert_eq!(h.tracker.state(), WorkoutState::Stopped);
}

#[tokio::test]
async fn test_stuck_sink_leaves_workout_in_transition() {
    let mut h = Harness::new(DistanceUnit::Miles).await;
    let gate = h.sink.hold(SinkOperation::FinishWorkout).await;
    h.start().await;
    h.lock().await;

    let tracker = h.tracker.clone();
    let stop = tokio::spawn(async move { tracker.stop().await });

    // the final splits update is published once the stop reaches the queue
    loop {
        if let TrackerEvent::SplitsUpdated { is_final: true, .. } = h.next_event().await {
            break;
        }
    }
    sleep(Duration::from_millis(50)).await;

    assert_eq!(h.tracker.state(), WorkoutState::Started);
    assert!(!stop.is_finished());
    let snapshot = h.tracker.snapshot().await.unwrap();
    assert!(!snapshot.is_running);

    // a second stop does not wait for or repeat the pipeline
    h.tracker.stop().await.unwrap();

    gate.notify_one();
    let result = timeout(Duration::from_secs(2), stop)
        .await
        .expect("stop did not complete")
        .expect("stop task panicked");
    assert!(result.is_ok());
    assert_eq!(h.tracker.state(), WorkoutState::Stopped);
    assert_eq!(h.sink.calls_of(SinkOperation::FinishWorkout).await.len(), 1);
}

#[tokio::test]
async fn test_stop_racing_begin_collection() {
    let mut h = Harness::new(DistanceUnit::Miles).await;
    let gate = h.sink.hold(SinkOperation::BeginCollection).await;
    h.start().await;
    h.lock().await;

    let tracker = h.tracker.clone();
    let stop = tokio::spawn(async move { tracker.stop().await });
    sleep(Duration::from_millis(20)).await;
    assert!(h.sink.calls().await.is_empty());

    gate.notify_one();
    let result = timeout(Duration::from_secs(2), stop).await.unwrap().unwrap();

    assert!(result.is_ok());
    assert_eq!(h.tracker.state(), WorkoutState::Stopped);
    assert_eq!(h.operations().await[0], SinkOperation::BeginCollection);
}

#[tokio::test]
async fn test_reset_allows_new_workout() {
    let mut h = Harness::new(DistanceUnit::Miles).await;
    h.start().await;
    h.lock().await;
    h.tracker.stop().await.unwrap();

    h.tracker.reset().await.unwrap();
    assert_eq!(h.tracker.state(), WorkoutState::Before);
    let snapshot = h.tracker.snapshot().await.unwrap();
    assert!(snapshot.splits.is_empty());
    assert_eq!(snapshot.distance_meters, 0.0);

    h.expect_state(WorkoutState::Before).await;
    h.start().await;
    assert_eq!(h.sink.workouts_opened(), 2);
    h.lock().await;

    let snapshot = h.tracker.snapshot().await.unwrap();
    assert_eq!(snapshot.splits.len(), 1);
    assert!(snapshot.distance_meters < 2.0);
}
