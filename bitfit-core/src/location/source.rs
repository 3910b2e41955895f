use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use tracing::{debug, trace};

use super::LocationSample;
use crate::session::LocationSubscriber;

/// Producer of GPS fixes
pub trait LocationSource: Send + Sync {
    /// Register the subscriber that receives every delivered batch
    ///
    /// A new subscription replaces the previous one.
    fn subscribe(&self, subscriber: LocationSubscriber);

    /// Drop the current subscriber, if any
    fn unsubscribe(&self);

    /// Begin producing fixes
    fn start_updating_location(&self);

    /// Stop producing fixes
    fn stop_updating_location(&self);
}

/// In-process location source fed by the host application
///
/// Platform glue (or a test) pushes batches with [`ManualLocationSource::push`];
/// they are forwarded to the subscriber only while updates are running.
#[derive(Default)]
pub struct ManualLocationSource {
    subscriber: ArcSwapOption<LocationSubscriber>,
    updating: AtomicBool,
    start_calls: AtomicUsize,
    stop_calls: AtomicUsize,
}

impl ManualLocationSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Convenience constructor for sharing with a tracker
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Deliver a batch of fixes
    ///
    /// Returns `true` if the batch was handed to a subscriber.
    pub async fn push(&self, batch: Vec<LocationSample>) -> bool {
        if !self.is_updating() {
            trace!(len = batch.len(), "Location updates stopped, dropping batch");
            return false;
        }

        let Some(subscriber) = self.subscriber.load_full() else {
            trace!(len = batch.len(), "No subscriber, dropping batch");
            return false;
        };

        subscriber.deliver(batch).await
    }

    pub fn is_updating(&self) -> bool {
        self.updating.load(Ordering::SeqCst)
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscriber.load().is_some()
    }

    /// Number of `start_updating_location` calls so far
    pub fn start_calls(&self) -> usize {
        self.start_calls.load(Ordering::SeqCst)
    }

    /// Number of `stop_updating_location` calls so far
    pub fn stop_calls(&self) -> usize {
        self.stop_calls.load(Ordering::SeqCst)
    }
}

impl LocationSource for ManualLocationSource {
    fn subscribe(&self, subscriber: LocationSubscriber) {
        debug!("Location subscriber registered");
        self.subscriber.store(Some(Arc::new(subscriber)));
    }

    fn unsubscribe(&self) {
        debug!("Location subscriber removed");
        self.subscriber.store(None);
    }

    fn start_updating_location(&self) {
        self.start_calls.fetch_add(1, Ordering::SeqCst);
        self.updating.store(true, Ordering::SeqCst);
    }

    fn stop_updating_location(&self) {
        self.stop_calls.fetch_add(1, Ordering::SeqCst);
        self.updating.store(false, Ordering::SeqCst);
    }
}
