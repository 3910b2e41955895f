//! Activity types, distance units and the recording payloads derived from them
//!
//! The activity chosen when a workout starts is immutable for the lifetime of
//! the session. It decides which distance quantity the recording backend files
//! the final distance sample under.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Meters in one statute mile, used as the split distance for [`DistanceUnit::Miles`]
pub const METERS_PER_MILE: f64 = 1609.34;

/// Meters in one kilometer, used as the split distance for [`DistanceUnit::Kilometers`]
pub const METERS_PER_KILOMETER: f64 = 1000.0;

/// Kind of workout being tracked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityType {
    Walking,
    Running,
    Cycling,
    WheelchairWalk,
    WheelchairRun,
    Skating,
}

impl ActivityType {
    /// Every activity the tracker can record
    pub const SUPPORTED: [ActivityType; 6] = [
        ActivityType::Walking,
        ActivityType::Running,
        ActivityType::Cycling,
        ActivityType::WheelchairWalk,
        ActivityType::WheelchairRun,
        ActivityType::Skating,
    ];

    /// Human readable name
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Walking => "Walking",
            Self::Running => "Running",
            Self::Cycling => "Cycling",
            Self::WheelchairWalk => "Wheelchair, medium pace",
            Self::WheelchairRun => "Wheelchair, fast pace",
            Self::Skating => "Skating",
        }
    }

    /// Stable identifier used by recording backends
    pub fn identifier(&self) -> &'static str {
        match self {
            Self::Walking => "walking",
            Self::Running => "running",
            Self::Cycling => "cycling",
            Self::WheelchairWalk => "wheelchairWalkPace",
            Self::WheelchairRun => "wheelchairRunPace",
            Self::Skating => "skatingSports",
        }
    }

    /// Distance quantity the final distance sample is recorded as
    pub fn distance_type(&self) -> DistanceType {
        match self {
            Self::Walking | Self::Running => DistanceType::WalkingRunning,
            Self::Cycling | Self::Skating => DistanceType::Cycling,
            Self::WheelchairWalk | Self::WheelchairRun => DistanceType::Wheelchair,
        }
    }
}

/// Distance quantity families understood by the recording backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceType {
    WalkingRunning,
    Cycling,
    Wheelchair,
}

/// Unit the user wants splits announced in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DistanceUnit {
    #[default]
    Miles,
    Kilometers,
}

impl DistanceUnit {
    /// Split threshold in meters for this unit
    pub fn split_distance_meters(&self) -> f64 {
        match self {
            Self::Miles => METERS_PER_MILE,
            Self::Kilometers => METERS_PER_KILOMETER,
        }
    }
}

/// Where the workout takes place
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationType {
    Indoor,
    Outdoor,
}

/// Configuration handed to the sink when a workout builder is opened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkoutConfiguration {
    pub activity_type: ActivityType,
    pub location_type: LocationType,
}

impl WorkoutConfiguration {
    /// GPS tracked workouts are always outdoor
    pub fn outdoor(activity_type: ActivityType) -> Self {
        Self {
            activity_type,
            location_type: LocationType::Outdoor,
        }
    }
}

/// Aggregate distance covered over the whole workout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistanceSample {
    pub distance_type: DistanceType,
    pub meters: f64,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Speed statistics attached to a finished workout, in meters per second
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WorkoutMetadata {
    pub maximum_speed: f64,
    pub average_speed: f64,
}
