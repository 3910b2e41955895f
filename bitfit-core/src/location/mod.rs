//! Location input for the workout tracker
//!
//! The tracker never talks to a GPS receiver directly. A [`LocationSource`]
//! delivers batches of [`LocationSample`]s through the subscriber handed to it
//! by the tracker; everything platform specific lives behind that trait.

pub mod geo;
mod sample;
mod source;

pub use geo::{destination, haversine_distance, EARTH_RADIUS_METERS};
pub use sample::LocationSample;
pub use source::{LocationSource, ManualLocationSource};
pub use crate::session::LocationSubscriber;
