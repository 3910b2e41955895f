//! Peak speed estimation over a short sliding window of accepted fixes

use ringbuf::{
    traits::{Consumer, Observer, Producer},
    HeapRb,
};

use crate::location::LocationSample;

/// Fixed-capacity FIFO of the most recent accepted fixes
///
/// Speed is only measured once the window is full, from the oldest fix to the
/// newest one. If any hop inside the window is faster than the plausibility
/// bound the whole window is ignored for that round, since a single GPS jump
/// would otherwise dominate the peak.
pub struct PeakSpeedWindow {
    samples: HeapRb<LocationSample>,
    max_plausible_speed: f64,
    current_speed: f64,
    peak_speed: f64,
}

impl PeakSpeedWindow {
    pub fn new(capacity: usize, max_plausible_speed: f64) -> Self {
        Self {
            samples: HeapRb::new(capacity.max(2)),
            max_plausible_speed,
            current_speed: 0.0,
            peak_speed: 0.0,
        }
    }

    /// Push an accepted fix, evicting the oldest one when full
    ///
    /// Returns the freshly measured speed, or `None` if the window is not yet
    /// full or was rejected as implausible.
    pub fn push(&mut self, sample: LocationSample) -> Option<f64> {
        if self.samples.is_full() {
            let _ = self.samples.try_pop();
        }
        let _ = self.samples.try_push(sample);

        if !self.samples.is_full() || !self.is_plausible() {
            return None;
        }

        let mut iter = self.samples.iter();
        let oldest = iter.next()?;
        let newest = iter.last()?;

        let elapsed = newest.seconds_since(oldest);
        if elapsed <= 0.0 {
            return None;
        }

        self.current_speed = newest.distance_to(oldest) / elapsed;
        self.peak_speed = self.peak_speed.max(self.current_speed);
        Some(self.current_speed)
    }

    /// Every consecutive hop must be below the plausibility bound
    fn is_plausible(&self) -> bool {
        let mut iter = self.samples.iter();
        let Some(mut previous) = iter.next() else {
            return false;
        };

        for sample in iter {
            let elapsed = sample.seconds_since(previous);
            // a zero or negative interval cannot be trusted either
            if elapsed <= 0.0 || sample.distance_to(previous) / elapsed > self.max_plausible_speed {
                return false;
            }
            previous = sample;
        }
        true
    }

    pub fn current_speed(&self) -> f64 {
        self.current_speed
    }

    pub fn peak_speed(&self) -> f64 {
        self.peak_speed
    }

    pub fn len(&self) -> usize {
        self.samples.occupied_len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.samples.capacity().get()
    }
}
