//! Runtime progress statistics for projectors: per-projector properties and
//! events, plus a two-window throughput model that estimates how long a
//! projector needs to reach a target checkpoint.

pub mod estimator;
pub mod registry;
pub mod stats;

pub use estimator::SpeedEstimator;
pub use registry::ProjectorRegistry;
pub use stats::{Event, ProjectorStats, Property, TimestampedCheckpoint};
