use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::geo::haversine_distance;

/// A single timestamped GPS fix
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationSample {
    /// Latitude in degrees
    pub latitude: f64,
    /// Longitude in degrees
    pub longitude: f64,
    /// Reported uncertainty radius in meters; negative means the fix is invalid
    pub horizontal_accuracy: f64,
    /// Receiver reported speed in m/s; negative when unavailable
    pub speed: f64,
    /// When the fix was taken
    pub timestamp: DateTime<Utc>,
}

impl LocationSample {
    pub fn new(
        latitude: f64,
        longitude: f64,
        horizontal_accuracy: f64,
        speed: f64,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            latitude,
            longitude,
            horizontal_accuracy,
            speed,
            timestamp,
        }
    }

    /// Great-circle distance to another fix in meters
    pub fn distance_to(&self, other: &LocationSample) -> f64 {
        haversine_distance(self.latitude, self.longitude, other.latitude, other.longitude)
    }

    /// Seconds elapsed since `earlier` was taken (negative if `earlier` is newer)
    pub fn seconds_since(&self, earlier: &LocationSample) -> f64 {
        (self.timestamp - earlier.timestamp).num_milliseconds() as f64 / 1000.0
    }
}
