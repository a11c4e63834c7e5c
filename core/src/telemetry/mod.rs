//! telemetry/mod.rs
//! Counters, stage timers and immutable snapshots for streams and pipelines.

pub mod counters;
pub mod timers;
pub mod snapshot;

pub use counters::*;
pub use timers::*;
pub use snapshot::*;
