//! opus-stream
//!
//! Frame-aligned streaming adapter over packet codecs.
//! Arbitrary PCM chunks in, one packet per frame out, and the inverse with
//! container header routing.

#![forbid(unsafe_code)]

// Shared and top level
pub mod constants;
pub mod types;
pub mod utils;
pub mod config;

pub mod engine;
pub mod telemetry;

// Stream layers
pub mod stream;

// -----------------------------------------------------------------------------
// Prelude (Rust users)
// -----------------------------------------------------------------------------
pub mod prelude {
    pub use crate::config::{Application, StreamConfig};
    pub use crate::engine::{CodecEngine, EngineError, EngineKind, FrameSizeConvention};
    pub use crate::stream::{
        DecoderEvent, FlushMode, FrameDecoder, FrameEncoder, OpusFormat, ParallelWorkers,
        ParallelismProfile, StreamBase, StreamContext, StreamSink,
    };
    pub use crate::telemetry::TelemetrySnapshot;
    pub use crate::types::{FrameGeometry, StreamError};
}
