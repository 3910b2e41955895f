//! In-memory recording backend
//!
//! Journals every builder call, keeps finished workouts in memory and can be
//! told to fail, reject or hold individual operations. Hosts without a real
//! health store use it as-is; tests use it to drive every completion path.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{Mutex, Notify};
use tracing::debug;

use super::{
    RecordingSink, RouteBuilder, RouteHandle, RouteMetadata, SinkError, SinkOperation, SinkResult,
    WorkoutBuilder, WorkoutHandle,
};
use crate::activity::{DistanceSample, WorkoutConfiguration, WorkoutMetadata};
use crate::location::LocationSample;

/// One completed call against the sink, in completion order
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum SinkCall {
    BeginCollection { start: DateTime<Utc> },
    InsertRouteData { points: usize },
    AddMetadata(WorkoutMetadata),
    AddSamples(Vec<DistanceSample>),
    EndCollection { end: DateTime<Utc> },
    FinishWorkout,
    FinishRoute { workout_id: u64 },
}

impl SinkCall {
    pub fn operation(&self) -> SinkOperation {
        match self {
            Self::BeginCollection { .. } => SinkOperation::BeginCollection,
            Self::InsertRouteData { .. } => SinkOperation::InsertRouteData,
            Self::AddMetadata(_) => SinkOperation::AddMetadata,
            Self::AddSamples(_) => SinkOperation::AddSamples,
            Self::EndCollection { .. } => SinkOperation::EndCollection,
            Self::FinishWorkout => SinkOperation::FinishWorkout,
            Self::FinishRoute { .. } => SinkOperation::FinishRoute,
        }
    }
}

/// A workout sealed by the in-memory backend
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FinishedWorkout {
    pub handle: WorkoutHandle,
    pub metadata: Option<WorkoutMetadata>,
    pub samples: Vec<DistanceSample>,
    pub route_points: Vec<LocationSample>,
}

#[derive(Debug, Clone)]
enum Fault {
    Fail(String),
    Reject,
    Empty,
}

#[derive(Default)]
struct Shared {
    calls: Mutex<Vec<SinkCall>>,
    faults: Mutex<HashMap<SinkOperation, Fault>>,
    holds: Mutex<HashMap<SinkOperation, Arc<Notify>>>,
    finished: Mutex<Vec<FinishedWorkout>>,
    next_id: AtomicU64,
    workouts_opened: AtomicUsize,
    routes_opened: AtomicUsize,
}

impl Shared {
    /// Wait on any hold, record the call and apply the configured fault
    async fn complete(&self, call: SinkCall) -> SinkResult<()> {
        let operation = call.operation();

        let hold = self.holds.lock().await.get(&operation).cloned();
        if let Some(gate) = hold {
            debug!(%operation, "Holding sink operation");
            gate.notified().await;
        }

        self.calls.lock().await.push(call);

        match self.faults.lock().await.get(&operation) {
            Some(Fault::Fail(message)) => Err(SinkError::backend(operation, message.clone())),
            Some(Fault::Reject) => Err(SinkError::Rejected(operation)),
            _ => Ok(()),
        }
    }

    async fn yields_nothing(&self, operation: SinkOperation) -> bool {
        matches!(self.faults.lock().await.get(&operation), Some(Fault::Empty))
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::SeqCst) + 1
    }
}

/// Recording backend that keeps everything in memory
#[derive(Clone, Default)]
pub struct InMemorySink {
    shared: Arc<Shared>,
}

impl InMemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `operation` complete with a backend error
    pub async fn fail_on(&self, operation: SinkOperation, message: impl Into<String>) {
        self.shared
            .faults
            .lock()
            .await
            .insert(operation, Fault::Fail(message.into()));
    }

    /// Make `operation` complete without error but without success
    pub async fn reject_on(&self, operation: SinkOperation) {
        self.shared.faults.lock().await.insert(operation, Fault::Reject);
    }

    /// Make `finishWorkout`/`finishRoute` succeed without producing a handle
    pub async fn return_nothing_on(&self, operation: SinkOperation) {
        self.shared.faults.lock().await.insert(operation, Fault::Empty);
    }

    /// Hold `operation` until the returned gate is notified
    ///
    /// `notify_one` releases one pending (or the next) call.
    pub async fn hold(&self, operation: SinkOperation) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.shared
            .holds
            .lock()
            .await
            .insert(operation, Arc::clone(&gate));
        gate
    }

    /// Every completed call so far
    pub async fn calls(&self) -> Vec<SinkCall> {
        self.shared.calls.lock().await.clone()
    }

    /// Completed calls of one kind
    pub async fn calls_of(&self, operation: SinkOperation) -> Vec<SinkCall> {
        self.shared
            .calls
            .lock()
            .await
            .iter()
            .filter(|call| call.operation() == operation)
            .cloned()
            .collect()
    }

    /// Workouts sealed so far
    pub async fn finished_workouts(&self) -> Vec<FinishedWorkout> {
        self.shared.finished.lock().await.clone()
    }

    pub fn workouts_opened(&self) -> usize {
        self.shared.workouts_opened.load(Ordering::SeqCst)
    }

    pub fn routes_opened(&self) -> usize {
        self.shared.routes_opened.load(Ordering::SeqCst)
    }
}

impl RecordingSink for InMemorySink {
    fn new_workout_builder(&self, config: WorkoutConfiguration) -> Arc<dyn WorkoutBuilder> {
        self.shared.workouts_opened.fetch_add(1, Ordering::SeqCst);
        Arc::new(InMemoryWorkoutBuilder {
            shared: Arc::clone(&self.shared),
            config,
            record: Mutex::new(WorkoutRecord::default()),
        })
    }

    fn new_route_builder(&self) -> Arc<dyn RouteBuilder> {
        self.shared.routes_opened.fetch_add(1, Ordering::SeqCst);
        Arc::new(InMemoryRouteBuilder {
            shared: Arc::clone(&self.shared),
            points: Mutex::new(Vec::new()),
        })
    }
}

#[derive(Default)]
struct WorkoutRecord {
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
    metadata: Option<WorkoutMetadata>,
    samples: Vec<DistanceSample>,
}

struct InMemoryWorkoutBuilder {
    shared: Arc<Shared>,
    config: WorkoutConfiguration,
    record: Mutex<WorkoutRecord>,
}

#[async_trait]
impl WorkoutBuilder for InMemoryWorkoutBuilder {
    async fn begin_collection(&self, start: DateTime<Utc>) -> SinkResult<()> {
        self.shared.complete(SinkCall::BeginCollection { start }).await?;
        self.record.lock().await.start = Some(start);
        Ok(())
    }

    async fn add_metadata(&self, metadata: WorkoutMetadata) -> SinkResult<()> {
        self.shared.complete(SinkCall::AddMetadata(metadata)).await?;
        self.record.lock().await.metadata = Some(metadata);
        Ok(())
    }

    async fn add_samples(&self, samples: Vec<DistanceSample>) -> SinkResult<()> {
        self.shared
            .complete(SinkCall::AddSamples(samples.clone()))
            .await?;
        self.record.lock().await.samples.extend(samples);
        Ok(())
    }

    async fn end_collection(&self, end: DateTime<Utc>) -> SinkResult<()> {
        self.shared.complete(SinkCall::EndCollection { end }).await?;
        self.record.lock().await.end = Some(end);
        Ok(())
    }

    async fn finish_workout(&self) -> SinkResult<Option<WorkoutHandle>> {
        self.shared.complete(SinkCall::FinishWorkout).await?;
        if self.shared.yields_nothing(SinkOperation::FinishWorkout).await {
            return Ok(None);
        }

        let record = self.record.lock().await;
        let (Some(start), Some(end)) = (record.start, record.end) else {
            return Err(SinkError::backend(
                SinkOperation::FinishWorkout,
                "collection was never begun and ended",
            ));
        };

        let handle = WorkoutHandle {
            id: self.shared.next_id(),
            activity_type: self.config.activity_type,
            start,
            end,
        };

        self.shared.finished.lock().await.push(FinishedWorkout {
            handle: handle.clone(),
            metadata: record.metadata,
            samples: record.samples.clone(),
            route_points: Vec::new(),
        });

        debug!(workout_id = handle.id, "Workout sealed");
        Ok(Some(handle))
    }
}

struct InMemoryRouteBuilder {
    shared: Arc<Shared>,
    points: Mutex<Vec<LocationSample>>,
}

#[async_trait]
impl RouteBuilder for InMemoryRouteBuilder {
    async fn insert_route_data(&self, points: Vec<LocationSample>) -> SinkResult<()> {
        self.shared
            .complete(SinkCall::InsertRouteData {
                points: points.len(),
            })
            .await?;
        self.points.lock().await.extend(points);
        Ok(())
    }

    async fn finish_route(
        &self,
        workout: WorkoutHandle,
        _metadata: Option<RouteMetadata>,
    ) -> SinkResult<Option<RouteHandle>> {
        self.shared
            .complete(SinkCall::FinishRoute {
                workout_id: workout.id,
            })
            .await?;
        if self.shared.yields_nothing(SinkOperation::FinishRoute).await {
            return Ok(None);
        }

        let points = self.points.lock().await.clone();
        let mut finished = self.shared.finished.lock().await;
        if let Some(entry) = finished.iter_mut().find(|w| w.handle.id == workout.id) {
            entry.route_points = points;
        }

        Ok(Some(RouteHandle {
            id: self.shared.next_id(),
            workout_id: workout.id,
        }))
    }
}
