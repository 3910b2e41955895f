//! Recording backend interface
//!
//! A [`RecordingSink`] hands out one [`WorkoutBuilder`] and one
//! [`RouteBuilder`] per workout. Every builder call completes asynchronously
//! and may complete on any task; the tracker re-enters its own queue before
//! acting on a result.

mod error;
mod memory;

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::activity::{ActivityType, DistanceSample, WorkoutConfiguration, WorkoutMetadata};
use crate::location::LocationSample;

pub use error::{SinkError, SinkOperation, SinkResult};
pub use memory::{FinishedWorkout, InMemorySink, SinkCall};

/// Free-form metadata attached to a finished route
pub type RouteMetadata = BTreeMap<String, String>;

/// A workout sealed by the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkoutHandle {
    pub id: u64,
    pub activity_type: ActivityType,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// A route sealed by the backend and associated with a workout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteHandle {
    pub id: u64,
    pub workout_id: u64,
}

/// Builder for a single workout record
#[async_trait]
pub trait WorkoutBuilder: Send + Sync {
    async fn begin_collection(&self, start: DateTime<Utc>) -> SinkResult<()>;

    async fn add_metadata(&self, metadata: WorkoutMetadata) -> SinkResult<()>;

    async fn add_samples(&self, samples: Vec<DistanceSample>) -> SinkResult<()>;

    async fn end_collection(&self, end: DateTime<Utc>) -> SinkResult<()>;

    /// Seal the workout; `None` means the backend produced nothing
    async fn finish_workout(&self) -> SinkResult<Option<WorkoutHandle>>;
}

/// Builder for the GPS route attached to a workout
#[async_trait]
pub trait RouteBuilder: Send + Sync {
    async fn insert_route_data(&self, points: Vec<LocationSample>) -> SinkResult<()>;

    /// Seal the route against a finished workout
    async fn finish_route(
        &self,
        workout: WorkoutHandle,
        metadata: Option<RouteMetadata>,
    ) -> SinkResult<Option<RouteHandle>>;
}

/// Factory for the per-workout builders
pub trait RecordingSink: Send + Sync {
    fn new_workout_builder(&self, config: WorkoutConfiguration) -> Arc<dyn WorkoutBuilder>;

    fn new_route_builder(&self) -> Arc<dyn RouteBuilder>;
}
