use std::io;
use thiserror::Error;

use crate::{
    constants::BYTES_PER_SAMPLE,
    engine::EngineError,
    stream::decoder::HeaderError,
};

/// Frame geometry shared by both stream directions.
///
/// `frame_size` is samples per channel per frame. It is caller supplied and
/// not cross-checked against the engine; inconsistent values surface later as
/// engine errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameGeometry {
    pub sample_rate: u32,
    pub channels: u16,
    pub frame_size: usize,
}

impl FrameGeometry {
    pub fn new(sample_rate: u32, channels: u16, frame_size: usize) -> Self {
        Self { sample_rate, channels, frame_size }
    }

    /// Bytes in one complete interleaved 16-bit PCM frame.
    ///
    /// Saturates at `usize::MAX`; `checked_required_bytes` reports the overflow.
    #[inline]
    pub fn required_bytes(&self) -> usize {
        self.checked_required_bytes().unwrap_or(usize::MAX)
    }

    /// `None` when the frame does not fit in `usize` bytes.
    #[inline]
    pub fn checked_required_bytes(&self) -> Option<usize> {
        self.frame_size.checked_mul(self.sample_stride())
    }

    /// Bytes in one interleaved sample across all channels.
    #[inline]
    pub fn sample_stride(&self) -> usize {
        self.channels as usize * BYTES_PER_SAMPLE
    }
}

/// Unified stream error covering configuration, engine, header and I/O failures.
/// - `From<T>` impls enable `?` across the pipeline.
/// - A stream that returned any of these (other than `Configuration` at
///   construction) must not be fed again.
#[derive(Debug, Error)]
pub enum StreamError {
    /// No usable codec engine, or an unusable stream configuration.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Encode, decode or control call rejected by the engine.
    #[error("engine error: {0}")]
    Engine(#[from] EngineError),

    /// OpusHead packet too short to parse.
    #[error("header error: {0}")]
    Header(#[from] HeaderError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Input offered to a stream that already failed or finished.
    #[error("stream terminated")]
    Terminated,

    /// Channel or thread failure inside a pipeline.
    #[error("pipeline error: {0}")]
    Pipeline(String),

    #[error("validation error: {0}")]
    Validation(String),
}

impl StreamError {
    pub fn config(msg: impl Into<String>) -> Self {
        StreamError::Configuration(msg.into())
    }
}
