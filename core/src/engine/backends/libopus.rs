//! engine/backends/libopus.rs
//!
//! Native libopus engine.
//!
//! Design notes:
//! - Wraps `opus::Encoder` / `opus::Decoder`; both free their native state on drop,
//!   so no explicit dispose is required.
//! - PCM crosses the boundary as little-endian bytes and is reinterpreted as i16.
//! - Decode output is bounded by the per-call frame size (or `MAX_FRAME_SIZE`).

use crate::config::Application;
use crate::constants::{ctl, MAX_FRAME_SIZE, MAX_PACKET_SIZE};
use crate::engine::registry::EngineKind;
use crate::engine::types::{CodecEngine, EngineError, FrameSizeConvention};
use crate::utils::{pcm_to_samples, samples_to_pcm};

pub struct LibopusEngine {
    channels: usize,
    encoder: opus::Encoder,
    decoder: opus::Decoder,
}

impl LibopusEngine {
    /// # Errors
    /// - `EngineError::Unavailable` if libopus refuses the rate/channel combination.
    pub fn new(sample_rate: u32, channels: u16, application: Application) -> Result<Self, EngineError> {
        let layout = match channels {
            1 => opus::Channels::Mono,
            2 => opus::Channels::Stereo,
            n => return Err(EngineError::Unavailable(format!("libopus supports 1 or 2 channels, got {n}"))),
        };
        let mode = match application {
            Application::Voip => opus::Application::Voip,
            Application::Audio => opus::Application::Audio,
            Application::RestrictedLowdelay => opus::Application::LowDelay,
        };

        let encoder = opus::Encoder::new(sample_rate, layout, mode)
            .map_err(|e| EngineError::Unavailable(format!("encoder init: {e}")))?;
        let decoder = opus::Decoder::new(sample_rate, layout)
            .map_err(|e| EngineError::Unavailable(format!("decoder init: {e}")))?;

        Ok(Self { channels: channels as usize, encoder, decoder })
    }
}

impl CodecEngine for LibopusEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::Libopus
    }

    fn frame_size_convention(&self) -> FrameSizeConvention {
        FrameSizeConvention::PerCall
    }

    fn encode(&mut self, pcm: &[u8], _frame_size: Option<usize>) -> Result<Vec<u8>, EngineError> {
        let samples = pcm_to_samples(pcm).ok_or_else(|| EngineError::InvalidInput {
            op: "encode",
            len: pcm.len(),
            msg: "odd byte count".into(),
        })?;
        self.encoder
            .encode_vec(&samples, MAX_PACKET_SIZE)
            .map_err(|e| EngineError::Rejected { op: "encode", msg: e.to_string() })
    }

    fn decode(&mut self, packet: &[u8], frame_size: Option<usize>) -> Result<Vec<u8>, EngineError> {
        let max = frame_size.unwrap_or(MAX_FRAME_SIZE);
        let mut out = vec![0i16; max * self.channels];
        let per_channel = self
            .decoder
            .decode(packet, &mut out, false)
            .map_err(|e| EngineError::Rejected { op: "decode", msg: e.to_string() })?;
        out.truncate(per_channel * self.channels);
        Ok(samples_to_pcm(&out))
    }

    fn apply_control(&mut self, code: i32, value: i32) -> Result<(), EngineError> {
        let res = match code {
            ctl::BITRATE => self.encoder.set_bitrate(opus::Bitrate::Bits(value)),
            ctl::FORWARD_ERROR_CORRECTION => self.encoder.set_inband_fec(value != 0),
            ctl::EXPECTED_PACKET_LOSS => self.encoder.set_packet_loss_perc(value),
            _ => {
                return Err(EngineError::Control { code, value, msg: "unsupported request".into() });
            }
        };
        res.map_err(|e| EngineError::Control { code, value, msg: e.to_string() })
    }
}
