use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Calls a recording sink can complete asynchronously
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SinkOperation {
    BeginCollection,
    InsertRouteData,
    AddMetadata,
    AddSamples,
    EndCollection,
    FinishWorkout,
    FinishRoute,
}

impl SinkOperation {
    pub fn name(&self) -> &'static str {
        match self {
            Self::BeginCollection => "beginCollection",
            Self::InsertRouteData => "insertRouteData",
            Self::AddMetadata => "addMetadata",
            Self::AddSamples => "addSamples",
            Self::EndCollection => "endCollection",
            Self::FinishWorkout => "finishWorkout",
            Self::FinishRoute => "finishRoute",
        }
    }
}

impl fmt::Display for SinkOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Failures reported by a recording sink
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SinkError {
    /// The backend reported an error
    #[error("{operation} failed: {message}")]
    Backend {
        operation: SinkOperation,
        message: String,
    },

    /// The backend completed without error but reported no success
    #[error("{0} was not successful")]
    Rejected(SinkOperation),

    /// Finishing the workout produced no workout
    #[error("Recording backend returned no workout")]
    MissingWorkout,

    /// Finishing the route produced no route
    #[error("Recording backend returned no route")]
    MissingRoute,
}

impl SinkError {
    pub fn backend(operation: SinkOperation, message: impl Into<String>) -> Self {
        Self::Backend {
            operation,
            message: message.into(),
        }
    }

    /// The sink call this error came from
    pub fn operation(&self) -> SinkOperation {
        match self {
            Self::Backend { operation, .. } => *operation,
            Self::Rejected(operation) => *operation,
            Self::MissingWorkout => SinkOperation::FinishWorkout,
            Self::MissingRoute => SinkOperation::FinishRoute,
        }
    }
}

/// Result type for sink calls
pub type SinkResult<T> = Result<T, SinkError>;
