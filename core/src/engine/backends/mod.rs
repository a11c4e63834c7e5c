//! engine/backends/mod.rs
//! Concrete codec engines, one adapter per backend.

pub mod raw;
#[cfg(feature = "libopus")]
pub mod libopus;

pub use raw::*;
#[cfg(feature = "libopus")]
pub use libopus::*;
