//! stream/base.rs
//!
//! Shared base of both stream directions.
//!
//! Design notes:
//! - Owns the engine handle exclusively; nothing else ever sees it.
//! - Control setters clamp before forwarding, so the engine only receives
//!   in-range values.
//! - `finalize` releases the handle once. Later calls, and the call made by
//!   `Drop`, are no-ops.

use bytes::Bytes;

use crate::config::StreamConfig;
use crate::constants::{ctl, MAX_BITRATE, MIN_BITRATE};
use crate::engine::{self, CodecEngine, EngineError, EngineKind, FrameSizeConvention};
use crate::stream::parallelism::{ParallelLease, StreamContext};
use crate::types::{FrameGeometry, StreamError};

/// Clamp a requested bitrate into `[MIN_BITRATE, MAX_BITRATE]`.
#[inline]
pub fn clamp_bitrate(bitrate: i32) -> i32 {
    bitrate.clamp(MIN_BITRATE, MAX_BITRATE)
}

/// Convert an expected-loss fraction into a whole percentage in `[0, 100]`.
/// NaN maps to 0.
#[inline]
pub fn packet_loss_percent(fraction: f64) -> i32 {
    if fraction.is_nan() {
        return 0;
    }
    (fraction.clamp(0.0, 1.0) * 100.0).round() as i32
}

pub struct StreamBase {
    engine: Option<Box<dyn CodecEngine>>,
    kind: EngineKind,
    geometry: FrameGeometry,
    lease: Option<ParallelLease>,
}

impl StreamBase {
    /// Wrap an already-selected engine.
    pub fn new(engine: Box<dyn CodecEngine>, geometry: FrameGeometry) -> Self {
        let kind = engine.kind();
        Self { engine: Some(engine), kind, geometry, lease: None }
    }

    /// Wrap an engine and, when `parallel` is set, register with the shared
    /// worker counter for the lifetime of this stream.
    pub fn with_context(
        engine: Box<dyn CodecEngine>,
        geometry: FrameGeometry,
        parallel: bool,
        ctx: &StreamContext,
    ) -> Self {
        let mut base = Self::new(engine, geometry);
        if parallel {
            base.lease = Some(ctx.workers.acquire());
            base.enable_engine_parallel();
        }
        base
    }

    /// Wrap an engine for one worker of a pipeline stream. The pipeline
    /// holds the stream's lease, so the worker takes none of its own.
    pub(crate) fn for_worker(
        engine: Box<dyn CodecEngine>,
        geometry: FrameGeometry,
        parallel: bool,
    ) -> Self {
        let mut base = Self::new(engine, geometry);
        if parallel {
            base.enable_engine_parallel();
        }
        base
    }

    /// Select and build the engine `config` asks for.
    ///
    /// # Errors
    /// - `StreamError::Configuration` if no codec engine is available.
    pub fn from_config(
        config: &StreamConfig,
        geometry: FrameGeometry,
        ctx: &StreamContext,
    ) -> Result<Self, StreamError> {
        let engine = engine::engine_for(config)?;
        Ok(Self::with_context(engine, geometry, config.parallel, ctx))
    }

    /// Engine the registry selects by default in this build, if any.
    pub fn engine_type() -> Option<EngineKind> {
        engine::default_engine()
    }

    /// Engine backing this instance.
    pub fn kind(&self) -> EngineKind {
        self.kind
    }

    pub fn geometry(&self) -> FrameGeometry {
        self.geometry
    }

    pub fn is_finalized(&self) -> bool {
        self.engine.is_none()
    }

    /// Apply the optional controls carried by `config`.
    pub fn apply_config_controls(&mut self, config: &StreamConfig) -> Result<(), StreamError> {
        if let Some(bitrate) = config.bitrate {
            self.set_bitrate(bitrate)?;
        }
        if let Some(enabled) = config.fec {
            self.set_forward_error_correction(enabled)?;
        }
        if let Some(fraction) = config.packet_loss {
            self.set_expected_packet_loss(fraction)?;
        }
        Ok(())
    }

    /// Takes effect on frames encoded after this call.
    pub fn set_bitrate(&mut self, bitrate: i32) -> Result<(), StreamError> {
        self.control(ctl::BITRATE, clamp_bitrate(bitrate))
    }

    pub fn set_forward_error_correction(&mut self, enabled: bool) -> Result<(), StreamError> {
        self.control(ctl::FORWARD_ERROR_CORRECTION, i32::from(enabled))
    }

    /// `fraction` is clamped to `[0, 1]` and sent as a percentage.
    ///
    /// Sent under the forward-error-correction code, not `EXPECTED_PACKET_LOSS`.
    // TODO: confirm against the engine's CTL table whether 4014 was intended here.
    pub fn set_expected_packet_loss(&mut self, fraction: f64) -> Result<(), StreamError> {
        self.control(ctl::FORWARD_ERROR_CORRECTION, packet_loss_percent(fraction))
    }

    /// Encode exactly one `required_bytes`-sized PCM frame.
    pub fn encode_one(&mut self, pcm: &[u8]) -> Result<Bytes, StreamError> {
        let frame_size = self.frame_size_arg();
        let engine = self.engine.as_mut().ok_or(EngineError::Released)?;
        let packet = engine.encode(pcm, frame_size)?;
        Ok(Bytes::from(packet))
    }

    /// Decode exactly one packet.
    pub fn decode_one(&mut self, packet: &[u8]) -> Result<Bytes, StreamError> {
        let frame_size = self.frame_size_arg();
        let engine = self.engine.as_mut().ok_or(EngineError::Released)?;
        let pcm = engine.decode(packet, frame_size)?;
        Ok(Bytes::from(pcm))
    }

    /// Release the engine handle and the parallel lease. Idempotent.
    pub fn finalize(&mut self) {
        if let Some(mut engine) = self.engine.take() {
            if engine.requires_dispose() {
                if let Err(e) = engine.dispose() {
                    tracing::warn!(engine = ?self.kind, error = %e, "engine dispose failed");
                }
            }
            tracing::debug!(engine = ?self.kind, "engine released");
        }
        if let Some(mut lease) = self.lease.take() {
            lease.release();
        }
    }

    fn enable_engine_parallel(&mut self) {
        if let Some(engine) = self.engine.as_mut() {
            if engine.supports_parallel() {
                engine.set_parallel(true);
            }
        }
    }

    fn control(&mut self, code: i32, value: i32) -> Result<(), StreamError> {
        let engine = self.engine.as_mut().ok_or(EngineError::Released)?;
        engine.apply_control(code, value)?;
        Ok(())
    }

    fn frame_size_arg(&self) -> Option<usize> {
        match self.engine.as_ref().map(|e| e.frame_size_convention()) {
            Some(FrameSizeConvention::PerCall) if self.geometry.frame_size > 0 => {
                Some(self.geometry.frame_size)
            }
            _ => None,
        }
    }
}

impl Drop for StreamBase {
    fn drop(&mut self) {
        self.finalize();
    }
}

impl std::fmt::Debug for StreamBase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamBase")
            .field("kind", &self.kind)
            .field("geometry", &self.geometry)
            .field("finalized", &self.is_finalized())
            .field("parallel", &self.lease.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bitrate_is_clamped() {
        assert_eq!(clamp_bitrate(500), 16_000);
        assert_eq!(clamp_bitrate(999_999), 128_000);
        assert_eq!(clamp_bitrate(64_000), 64_000);
    }

    #[test]
    fn packet_loss_is_clamped_and_scaled() {
        assert_eq!(packet_loss_percent(0.5), 50);
        assert_eq!(packet_loss_percent(-1.0), 0);
        assert_eq!(packet_loss_percent(2.0), 100);
        assert_eq!(packet_loss_percent(f64::NAN), 0);
    }
}
