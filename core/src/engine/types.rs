//! engine/types.rs
//! The capability contract every codec backend fulfils.
use num_enum::TryFromPrimitive;
use thiserror::Error;

use crate::constants::ctl;
use crate::engine::registry::EngineKind;
use crate::utils::enum_name_or_hex;

/// Recognized control codes.
#[repr(i32)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, TryFromPrimitive)]
pub enum ControlCode {
    Bitrate                = ctl::BITRATE,
    ForwardErrorCorrection = ctl::FORWARD_ERROR_CORRECTION,
    ExpectedPacketLoss     = ctl::EXPECTED_PACKET_LOSS,
}

/// How a backend wants the frame size delivered.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FrameSizeConvention {
    /// Frame size is passed on every encode/decode call.
    PerCall,
    /// Frame size is derived from the buffer length.
    Inferred,
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("{op}: invalid input ({len} bytes): {msg}")]
    InvalidInput { op: &'static str, len: usize, msg: String },

    #[error("control {} = {value} rejected: {msg}", control_name(.code))]
    Control { code: i32, value: i32, msg: String },

    #[error("{op} failed: {msg}")]
    Rejected { op: &'static str, msg: String },

    /// The handle was already finalized.
    #[error("engine already released")]
    Released,

    #[error("engine unavailable: {0}")]
    Unavailable(String),
}

fn control_name(code: &i32) -> String {
    enum_name_or_hex::<ControlCode>(*code)
}

// Require Send so engines can move into pipeline workers.
pub trait CodecEngine: Send {
    /// Which backend this is.
    fn kind(&self) -> EngineKind;

    fn frame_size_convention(&self) -> FrameSizeConvention {
        FrameSizeConvention::Inferred
    }

    /// Encode exactly one PCM frame into one packet.
    fn encode(&mut self, pcm: &[u8], frame_size: Option<usize>) -> Result<Vec<u8>, EngineError>;

    /// Decode exactly one packet into one PCM frame.
    fn decode(&mut self, packet: &[u8], frame_size: Option<usize>) -> Result<Vec<u8>, EngineError>;

    /// Generic control channel.
    fn apply_control(&mut self, code: i32, value: i32) -> Result<(), EngineError>;

    /// Engines holding resources outside normal ownership return true and
    /// release them in `dispose`.
    fn requires_dispose(&self) -> bool {
        false
    }

    fn dispose(&mut self) -> Result<(), EngineError> {
        Ok(())
    }

    /// Whether independent instances may encode different frames of one
    /// stream concurrently.
    fn supports_parallel(&self) -> bool {
        false
    }

    fn set_parallel(&mut self, _enabled: bool) {}
}

impl std::fmt::Debug for dyn CodecEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CodecEngine").field("kind", &self.kind()).finish()
    }
}
