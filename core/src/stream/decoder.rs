//! stream/decoder.rs
//!
//! Packet classification and routing for the decode direction.
//!
//! Each input packet yields exactly one event: a format description for an
//! `OpusHead` packet, the raw bytes for an `OpusTags` packet, or one decoded
//! PCM frame for anything else. Header and tag packets never reach the engine.

use byteorder::{ByteOrder, LittleEndian};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::StreamConfig;
use crate::constants::{head_offsets, OPUS_HEAD, OPUS_HEAD_MIN_LEN, OPUS_TAGS, SIGNATURE_LEN};
use crate::engine::CodecEngine;
use crate::stream::base::StreamBase;
use crate::stream::io::StreamSink;
use crate::stream::parallelism::StreamContext;
use crate::telemetry::StreamCounters;
use crate::types::StreamError;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HeaderError {
    #[error("OpusHead truncated: have {have} bytes, need {need}")]
    Truncated { have: usize, need: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketKind {
    Head,
    Tags,
    Audio,
}

/// Compare the leading signature. Packets shorter than the signature are audio.
#[inline]
pub fn classify_packet(packet: &[u8]) -> PacketKind {
    match packet.get(..SIGNATURE_LEN) {
        Some(sig) if sig == OPUS_HEAD => PacketKind::Head,
        Some(sig) if sig == OPUS_TAGS => PacketKind::Tags,
        _ => PacketKind::Audio,
    }
}

/// PCM description emitted for an `OpusHead` packet.
///
/// `channels` and `sample_rate` come from the stream configuration, not the
/// packet. Output is always signed 16-bit integer PCM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpusFormat {
    pub channels: u16,
    pub sample_rate: u32,
    pub bit_depth: u8,
    pub float: bool,
    pub signed: bool,
    pub version: u8,
    pub pre_skip: u16,
    /// Raw little-endian u16 at offset 16.
    pub gain: u16,
}

pub fn parse_opus_head(packet: &[u8], channels: u16, sample_rate: u32) -> Result<OpusFormat, HeaderError> {
    if packet.len() < OPUS_HEAD_MIN_LEN {
        return Err(HeaderError::Truncated {
            have: packet.len(),
            need: OPUS_HEAD_MIN_LEN,
        });
    }

    let version = packet[head_offsets::VERSION];
    let pre_skip = LittleEndian::read_u16(&packet[head_offsets::PRE_SKIP..head_offsets::PRE_SKIP + 2]);
    let gain = LittleEndian::read_u16(&packet[head_offsets::GAIN..head_offsets::GAIN + 2]);

    Ok(OpusFormat {
        channels,
        sample_rate,
        bit_depth: 16,
        float: false,
        signed: true,
        version,
        pre_skip,
        gain,
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecoderEvent {
    Format(OpusFormat),
    Tags(Bytes),
    Frame(Bytes),
}

impl DecoderEvent {
    pub fn is_frame(&self) -> bool {
        matches!(self, DecoderEvent::Frame(_))
    }
}

#[derive(Debug)]
pub struct FrameDecoder {
    base: StreamBase,
    counters: StreamCounters,
    terminated: bool,
}

impl FrameDecoder {
    /// # Errors
    /// - `StreamError::Configuration` if `channels` is zero.
    pub fn new(config: &StreamConfig, engine: Box<dyn CodecEngine>) -> Result<Self, StreamError> {
        let geometry = config.decoder_geometry()?;
        Self::assemble(StreamBase::new(engine, geometry), config)
    }

    pub fn with_context(
        config: &StreamConfig,
        engine: Box<dyn CodecEngine>,
        ctx: &StreamContext,
    ) -> Result<Self, StreamError> {
        let geometry = config.decoder_geometry()?;
        Self::assemble(StreamBase::with_context(engine, geometry, config.parallel, ctx), config)
    }

    pub fn from_registry(config: &StreamConfig, ctx: &StreamContext) -> Result<Self, StreamError> {
        let geometry = config.decoder_geometry()?;
        Self::assemble(StreamBase::from_config(config, geometry, ctx)?, config)
    }

    pub(crate) fn assemble(mut base: StreamBase, config: &StreamConfig) -> Result<Self, StreamError> {
        base.apply_config_controls(config)?;
        tracing::debug!(engine = ?base.kind(), channels = config.channels, "frame decoder ready");
        Ok(Self {
            base,
            counters: StreamCounters::default(),
            terminated: false,
        })
    }

    pub fn base(&self) -> &StreamBase {
        &self.base
    }

    pub fn base_mut(&mut self) -> &mut StreamBase {
        &mut self.base
    }

    pub fn counters(&self) -> &StreamCounters {
        &self.counters
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// Route one packet.
    pub fn push(&mut self, packet: &[u8]) -> Result<DecoderEvent, StreamError> {
        if self.terminated {
            return Err(StreamError::Terminated);
        }
        self.counters.add_chunk(packet.len());

        let event = match classify_packet(packet) {
            PacketKind::Head => {
                let geometry = self.base.geometry();
                parse_opus_head(packet, geometry.channels, geometry.sample_rate)
                    .map(|format| {
                        tracing::debug!(?format, "OpusHead received");
                        self.counters.add_head();
                        DecoderEvent::Format(format)
                    })
                    .map_err(StreamError::from)
            }
            PacketKind::Tags => {
                tracing::debug!(len = packet.len(), "OpusTags received");
                self.counters.add_tags();
                Ok(DecoderEvent::Tags(Bytes::copy_from_slice(packet)))
            }
            PacketKind::Audio => self.base.decode_one(packet).map(|pcm| {
                self.counters.add_decoded(pcm.len());
                DecoderEvent::Frame(pcm)
            }),
        };

        if let Err(e) = &event {
            tracing::debug!(error = %e, "frame decoder failed");
            self.terminated = true;
        }
        event
    }

    /// Route one packet into `sink`.
    pub fn push_into<S>(&mut self, packet: &[u8], sink: &mut S) -> Result<(), StreamError>
    where
        S: StreamSink<DecoderEvent> + ?Sized,
    {
        let event = self.push(packet)?;
        sink.accept(event).map_err(|e| {
            self.terminated = true;
            e
        })
    }

    /// Release the engine. Further pushes return `Terminated`.
    pub fn destroy(&mut self) {
        self.terminated = true;
        self.base.finalize();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_packets_are_audio() {
        assert_eq!(classify_packet(b""), PacketKind::Audio);
        assert_eq!(classify_packet(b"Opus"), PacketKind::Audio);
        assert_eq!(classify_packet(b"OpusHea"), PacketKind::Audio);
        assert_eq!(classify_packet(b"OpusHead"), PacketKind::Head);
        assert_eq!(classify_packet(b"OpusTags\x01\x02"), PacketKind::Tags);
    }

    #[test]
    fn truncated_head_is_rejected() {
        let err = parse_opus_head(b"OpusHead\x01\x02", 2, 48_000).unwrap_err();
        assert_eq!(err, HeaderError::Truncated { have: 10, need: 18 });
    }

    #[test]
    fn format_serializes_with_camel_case_keys() {
        let mut head = b"OpusHead".to_vec();
        head.extend_from_slice(&[1, 2, 0x38, 0x01, 0x80, 0xBB, 0, 0, 0, 0, 0]);
        let format = parse_opus_head(&head, 2, 48_000).unwrap();
        let json = serde_json::to_string(&format).unwrap();
        assert!(json.contains("\"sampleRate\":48000"));
        assert!(json.contains("\"preSkip\":312"));
        assert!(json.contains("\"bitDepth\":16"));
    }
}
