//! engine/mod.rs
//! Codec engine capability and backend registry.
//!
//! Notes:
//! - The stream layer only ever talks to `dyn CodecEngine`.
//! - Backends normalize their calling convention (frame size passed or inferred)
//!   behind the trait so `encode_one`/`decode_one` stay uniform.
//! - Registry resolves an `EngineKind` to a compiled-in backend.

pub mod types;
pub mod registry;
pub mod backends;

pub use types::*;
pub use registry::*;
pub use backends::RawEngine;
#[cfg(feature = "libopus")]
pub use backends::LibopusEngine;
