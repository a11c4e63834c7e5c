//! stream/framing.rs
//!
//! Pending-buffer discipline for fixed-size PCM frames.
//!
//! Responsibilities:
//! - Accept arbitrarily sized chunks
//! - Hand out whole `frame_len` slices in arrival order
//! - Keep the unaligned suffix (always `< frame_len`) for the next chunk
//!
//! Non-responsibilities:
//! - Encoding
//! - IO

use bytes::{Bytes, BytesMut};

use crate::constants::MAX_PREALLOC_BYTES;

#[derive(Debug)]
pub struct FrameAccumulator {
    pending: BytesMut,
    frame_len: usize,
}

impl FrameAccumulator {
    /// `frame_len` must be non-zero; callers validate geometry before this point.
    pub fn new(frame_len: usize) -> Self {
        debug_assert!(frame_len > 0, "frame_len must be non-zero");
        Self {
            pending: BytesMut::with_capacity(frame_len.saturating_mul(2).min(MAX_PREALLOC_BYTES)),
            frame_len,
        }
    }

    pub fn frame_len(&self) -> usize {
        self.frame_len
    }

    pub fn push(&mut self, chunk: &[u8]) {
        self.pending.extend_from_slice(chunk);
    }

    /// Split the next whole frame off the front, if one is buffered.
    pub fn next_frame(&mut self) -> Option<Bytes> {
        if self.frame_len == 0 || self.pending.len() < self.frame_len {
            return None;
        }
        Some(self.pending.split_to(self.frame_len).freeze())
    }

    /// All whole frames currently buffered.
    pub fn drain_frames(&mut self) -> Vec<Bytes> {
        let mut frames = Vec::with_capacity(self.ready_frames());
        while let Some(frame) = self.next_frame() {
            frames.push(frame);
        }
        frames
    }

    /// Number of whole frames buffered right now.
    pub fn ready_frames(&self) -> usize {
        if self.frame_len == 0 {
            return 0;
        }
        self.pending.len() / self.frame_len
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Take whatever is buffered, leaving the accumulator empty.
    pub fn take_remainder(&mut self) -> Bytes {
        self.pending.split().freeze()
    }

    /// Take the partial frame zero-padded to `frame_len`. `None` when empty.
    pub fn padded_remainder(&mut self) -> Option<Bytes> {
        if self.pending.is_empty() {
            return None;
        }
        let mut frame = self.pending.split();
        frame.resize(self.frame_len.max(frame.len()), 0);
        Some(frame.freeze())
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }
}
