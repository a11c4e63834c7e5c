//! stream/encoder.rs
//!
//! PCM bytes in arbitrary chunks → one packet per complete frame.
//!
//! Design notes:
//! - Frames are encoded in arrival order on the calling thread; a step never
//!   overlaps another step on the same instance (`&mut self`).
//! - Any failure terminates the instance. Later pushes return `Terminated`.
//! - At close the trailing partial frame is dropped unless `FlushMode::Pad`
//!   is requested.

use std::collections::VecDeque;
use std::io::Read;

use bytes::Bytes;

use crate::config::StreamConfig;
use crate::engine::CodecEngine;
use crate::stream::base::StreamBase;
use crate::stream::framing::FrameAccumulator;
use crate::stream::io::{read_exact_or_eof, StreamSink};
use crate::stream::parallelism::StreamContext;
use crate::telemetry::StreamCounters;
use crate::types::StreamError;

/// What happens to a trailing partial frame at close.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlushMode {
    /// Discard it.
    #[default]
    Drop,
    /// Zero-pad it to one frame and encode it.
    Pad,
}

#[derive(Debug)]
pub struct FrameEncoder {
    base: StreamBase,
    frames: FrameAccumulator,
    counters: StreamCounters,
    terminated: bool,
}

impl FrameEncoder {
    /// # Errors
    /// - `StreamError::Configuration` if `frameSize` is missing or zero, or `channels` is zero.
    /// - `StreamError::Engine` if an initial control from `config` is rejected.
    pub fn new(config: &StreamConfig, engine: Box<dyn CodecEngine>) -> Result<Self, StreamError> {
        let geometry = config.encoder_geometry()?;
        Self::assemble(StreamBase::new(engine, geometry), config)
    }

    /// Like `new`, registering with `ctx`'s worker counter when `config.parallel` is set.
    pub fn with_context(
        config: &StreamConfig,
        engine: Box<dyn CodecEngine>,
        ctx: &StreamContext,
    ) -> Result<Self, StreamError> {
        let geometry = config.encoder_geometry()?;
        Self::assemble(StreamBase::with_context(engine, geometry, config.parallel, ctx), config)
    }

    /// Build the engine through the registry.
    pub fn from_registry(config: &StreamConfig, ctx: &StreamContext) -> Result<Self, StreamError> {
        let geometry = config.encoder_geometry()?;
        Self::assemble(StreamBase::from_config(config, geometry, ctx)?, config)
    }

    fn assemble(mut base: StreamBase, config: &StreamConfig) -> Result<Self, StreamError> {
        base.apply_config_controls(config)?;
        let frames = FrameAccumulator::new(base.geometry().required_bytes());
        tracing::debug!(
            engine = ?base.kind(),
            required_bytes = frames.frame_len(),
            "frame encoder ready"
        );
        Ok(Self {
            base,
            frames,
            counters: StreamCounters::default(),
            terminated: false,
        })
    }

    pub fn base(&self) -> &StreamBase {
        &self.base
    }

    /// Control setters live on the base.
    pub fn base_mut(&mut self) -> &mut StreamBase {
        &mut self.base
    }

    pub fn required_bytes(&self) -> usize {
        self.frames.frame_len()
    }

    /// Bytes held for the next frame, always `< required_bytes()`.
    pub fn pending_len(&self) -> usize {
        self.frames.pending_len()
    }

    pub fn counters(&self) -> &StreamCounters {
        &self.counters
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// Feed one chunk, collecting the packets it completes.
    pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<Bytes>, StreamError> {
        let mut out = Vec::new();
        self.push_into(chunk, &mut out)?;
        Ok(out)
    }

    /// Feed one chunk, handing each completed packet to `sink` in frame order.
    /// Returns the number of packets emitted.
    pub fn push_into<S>(&mut self, chunk: &[u8], sink: &mut S) -> Result<usize, StreamError>
    where
        S: StreamSink<Bytes> + ?Sized,
    {
        if self.terminated {
            return Err(StreamError::Terminated);
        }
        self.counters.add_chunk(chunk.len());
        self.frames.push(chunk);

        let mut emitted = 0;
        while let Some(frame) = self.frames.next_frame() {
            let step = self
                .base
                .encode_one(&frame)
                .and_then(|packet| {
                    self.counters.add_encoded(packet.len());
                    sink.accept(packet)
                });
            if let Err(e) = step {
                tracing::debug!(error = %e, "frame encoder failed");
                self.terminated = true;
                return Err(e);
            }
            emitted += 1;
        }

        if emitted > 0 {
            tracing::debug!(packets = emitted, pending = self.frames.pending_len(), "frames encoded");
        }
        Ok(emitted)
    }

    /// Close the stream and release the engine.
    ///
    /// Returns the padded final packet in `FlushMode::Pad` when a partial
    /// frame was pending.
    pub fn finish(&mut self, mode: FlushMode) -> Result<Option<Bytes>, StreamError> {
        if self.terminated {
            return Err(StreamError::Terminated);
        }
        self.terminated = true;

        let result = match mode {
            FlushMode::Drop => {
                let tail = self.frames.take_remainder();
                if !tail.is_empty() {
                    tracing::warn!(bytes = tail.len(), "dropping trailing partial frame");
                    self.counters.add_dropped_tail(tail.len());
                }
                Ok(None)
            }
            FlushMode::Pad => match self.frames.padded_remainder() {
                Some(frame) => self.base.encode_one(&frame).map(|packet| {
                    self.counters.add_padded();
                    self.counters.add_encoded(packet.len());
                    Some(packet)
                }),
                None => Ok(None),
            },
        };

        self.base.finalize();
        result
    }

    /// Tear down mid-stream: discard pending bytes and release the engine.
    pub fn destroy(&mut self) {
        self.frames.clear();
        self.terminated = true;
        self.base.finalize();
    }
}

/// Pull-based encoder over a reader. Reads `read_chunk` bytes at a time and
/// only reads again once every packet from the previous read was taken.
pub fn encode_stream<R: Read>(reader: R, read_chunk: usize, encoder: FrameEncoder) -> EncodeStream<R> {
    EncodeStream {
        reader,
        read_chunk: read_chunk.max(1),
        encoder,
        ready: VecDeque::new(),
        flush: FlushMode::default(),
        done: false,
    }
}

pub struct EncodeStream<R> {
    reader: R,
    read_chunk: usize,
    encoder: FrameEncoder,
    ready: VecDeque<Bytes>,
    flush: FlushMode,
    done: bool,
}

impl<R> EncodeStream<R> {
    pub fn with_flush(mut self, mode: FlushMode) -> Self {
        self.flush = mode;
        self
    }

    pub fn encoder(&self) -> &FrameEncoder {
        &self.encoder
    }
}

impl<R: Read> Iterator for EncodeStream<R> {
    type Item = Result<Bytes, StreamError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(packet) = self.ready.pop_front() {
                return Some(Ok(packet));
            }
            if self.done {
                return None;
            }

            let chunk = match read_exact_or_eof(&mut self.reader, self.read_chunk) {
                Ok(chunk) => chunk,
                Err(e) => {
                    self.done = true;
                    self.encoder.destroy();
                    return Some(Err(e));
                }
            };

            if chunk.is_empty() {
                self.done = true;
                match self.encoder.finish(self.flush) {
                    Ok(Some(packet)) => self.ready.push_back(packet),
                    Ok(None) => {}
                    Err(e) => return Some(Err(e)),
                }
                continue;
            }

            if let Err(e) = self.encoder.push_into(&chunk, &mut self.ready) {
                self.done = true;
                self.encoder.destroy();
                return Some(Err(e));
            }
        }
    }
}
