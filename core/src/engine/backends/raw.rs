//! engine/backends/raw.rs
//! Pass-through engine.
//!
//! Packets are the PCM frames themselves. Useful where a stream must be
//! framed without compression, and as a deterministic engine for pipelines.

use crate::constants::{ctl, BYTES_PER_SAMPLE};
use crate::engine::registry::EngineKind;
use crate::engine::types::{CodecEngine, EngineError};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawControls {
    pub bitrate: Option<i32>,
    pub fec: Option<i32>,
    pub packet_loss: Option<i32>,
}

#[derive(Debug, Clone)]
pub struct RawEngine {
    channels: u16,
    controls: RawControls,
}

impl RawEngine {
    pub fn new(channels: u16) -> Self {
        Self { channels, controls: RawControls::default() }
    }

    /// Last value seen for each control code.
    pub fn controls(&self) -> &RawControls {
        &self.controls
    }

    fn check(&self, op: &'static str, buf: &[u8]) -> Result<(), EngineError> {
        let stride = self.channels as usize * BYTES_PER_SAMPLE;
        if buf.is_empty() {
            return Err(EngineError::InvalidInput { op, len: 0, msg: "empty buffer".into() });
        }
        if stride == 0 || buf.len() % stride != 0 {
            return Err(EngineError::InvalidInput {
                op,
                len: buf.len(),
                msg: format!("not a whole number of {}-channel samples", self.channels),
            });
        }
        Ok(())
    }
}

impl CodecEngine for RawEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::Raw
    }

    fn encode(&mut self, pcm: &[u8], _frame_size: Option<usize>) -> Result<Vec<u8>, EngineError> {
        self.check("encode", pcm)?;
        Ok(pcm.to_vec())
    }

    fn decode(&mut self, packet: &[u8], _frame_size: Option<usize>) -> Result<Vec<u8>, EngineError> {
        self.check("decode", packet)?;
        Ok(packet.to_vec())
    }

    fn apply_control(&mut self, code: i32, value: i32) -> Result<(), EngineError> {
        match code {
            ctl::BITRATE => self.controls.bitrate = Some(value),
            ctl::FORWARD_ERROR_CORRECTION => self.controls.fec = Some(value),
            ctl::EXPECTED_PACKET_LOSS => self.controls.packet_loss = Some(value),
            _ => {
                return Err(EngineError::Control { code, value, msg: "unsupported request".into() });
            }
        }
        Ok(())
    }

    /// Stateless, so independent instances may run on separate workers.
    fn supports_parallel(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_and_decode_pass_through() {
        let mut e = RawEngine::new(2);
        let pcm = vec![1u8, 2, 3, 4, 5, 6, 7, 8];
        assert_eq!(e.encode(&pcm, None).unwrap(), pcm);
        assert_eq!(e.decode(&pcm, None).unwrap(), pcm);
    }

    #[test]
    fn partial_samples_are_rejected() {
        let mut e = RawEngine::new(2);
        assert!(matches!(e.decode(b"abc", None), Err(EngineError::InvalidInput { len: 3, .. })));
        assert!(matches!(e.encode(&[], None), Err(EngineError::InvalidInput { len: 0, .. })));
    }

    #[test]
    fn controls_are_recorded_and_unknown_codes_rejected() {
        let mut e = RawEngine::new(1);
        e.apply_control(ctl::BITRATE, 64_000).unwrap();
        e.apply_control(ctl::FORWARD_ERROR_CORRECTION, 1).unwrap();
        assert_eq!(e.controls().bitrate, Some(64_000));
        assert_eq!(e.controls().fec, Some(1));
        assert!(matches!(e.apply_control(4010, 5), Err(EngineError::Control { code: 4010, .. })));
    }
}
