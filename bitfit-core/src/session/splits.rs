//! Distance splits recorded during a workout

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A `(time, cumulative distance)` checkpoint
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Split {
    pub time: DateTime<Utc>,
    pub distance_meters: f64,
}

/// Append-only list of splits for one session
///
/// The first entry is the zero-distance split recorded at GPS lock.
#[derive(Debug, Clone, Default)]
pub struct SplitLog {
    splits: Vec<Split>,
}

impl SplitLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a split
    ///
    /// A time earlier than the previous split is clamped to it so the log
    /// stays ordered even if fixes arrive with skewed clocks.
    pub fn record(&mut self, time: DateTime<Utc>, distance_meters: f64) -> Split {
        let time = match self.splits.last() {
            Some(last) if time < last.time => last.time,
            _ => time,
        };
        let split = Split {
            time,
            distance_meters,
        };
        self.splits.push(split);
        split
    }

    /// Append a boundary split only if `time` is later than the previous split
    ///
    /// Returns `None` for a fix that is not later; the boundary stays crossed,
    /// so the next later fix records it.
    pub fn record_crossing(&mut self, time: DateTime<Utc>, distance_meters: f64) -> Option<Split> {
        if self.splits.last().is_some_and(|last| time <= last.time) {
            return None;
        }
        Some(self.record(time, distance_meters))
    }

    /// Whether `distance_meters` has crossed the next split boundary
    pub fn crosses_next(&self, distance_meters: f64, split_distance_meters: f64) -> bool {
        distance_meters > split_distance_meters * self.splits.len() as f64
    }

    pub fn len(&self) -> usize {
        self.splits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.splits.is_empty()
    }

    pub fn as_slice(&self) -> &[Split] {
        &self.splits
    }

    pub fn to_vec(&self) -> Vec<Split> {
        self.splits.clone()
    }
}

/// Figures behind a split announcement
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SplitSummary {
    /// Number of splits completed, not counting the starting split
    pub index: usize,
    /// Seconds covered by this split, or by the whole workout for the final one
    pub duration_seconds: f64,
    /// Distance from the start of the workout
    pub total_distance_meters: f64,
    /// Average speed over the split in m/s
    pub speed_mps: f64,
    pub is_final: bool,
}

impl SplitSummary {
    /// Summarise the most recent split
    ///
    /// The final summary covers the whole workout instead of the last leg.
    /// Returns `None` until at least one split beyond the starting one exists.
    pub fn latest(splits: &[Split], is_final: bool) -> Option<Self> {
        if splits.len() < 2 {
            return None;
        }

        let first = splits.first()?;
        let latest = splits.last()?;
        let prior = if is_final {
            first
        } else {
            &splits[splits.len() - 2]
        };

        let duration_seconds = (latest.time - prior.time).num_milliseconds() as f64 / 1000.0;
        let speed_mps = if duration_seconds > 0.0 {
            (latest.distance_meters - prior.distance_meters) / duration_seconds
        } else {
            0.0
        };

        Some(Self {
            index: splits.len() - 1,
            duration_seconds,
            total_distance_meters: latest.distance_meters - first.distance_meters,
            speed_mps,
            is_final,
        })
    }
}
