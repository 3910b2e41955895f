/// Activity types and recording payloads
pub mod activity;

/// Location input
pub mod location;

/// Workout session and tracker
pub mod session;

/// Recording backends
pub mod sink;

/// Workout state machine and configuration
pub mod state;

/// Utility modules
pub mod utils;
