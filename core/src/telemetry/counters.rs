//! telemetry/counters.rs
//! Mutable counters collected while a stream runs.
//!
//! Each stream (or pipeline worker) owns its own counters; pipelines merge
//! them at the end, so nothing here is shared or atomic.
use serde::{Deserialize, Serialize};
use std::ops::AddAssign;

#[derive(Default, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamCounters {
    pub chunks_in: u64,
    pub bytes_in: u64,
    pub frames_encoded: u64,
    pub frames_decoded: u64,
    pub packets_out: u64,
    pub bytes_out: u64,
    pub head_events: u64,
    pub tag_events: u64,
    /// Trailing partial-frame bytes discarded at close.
    pub tail_bytes_dropped: u64,
    pub padded_frames: u64,
}

impl StreamCounters {
    pub fn add_chunk(&mut self, len: usize) {
        self.chunks_in += 1;
        self.bytes_in += len as u64;
    }

    /// One PCM frame in, one packet out.
    pub fn add_encoded(&mut self, packet_len: usize) {
        self.frames_encoded += 1;
        self.packets_out += 1;
        self.bytes_out += packet_len as u64;
    }

    /// One packet in, one PCM frame out.
    pub fn add_decoded(&mut self, pcm_len: usize) {
        self.frames_decoded += 1;
        self.bytes_out += pcm_len as u64;
    }

    pub fn add_head(&mut self) {
        self.head_events += 1;
    }

    pub fn add_tags(&mut self) {
        self.tag_events += 1;
    }

    pub fn add_dropped_tail(&mut self, len: usize) {
        self.tail_bytes_dropped += len as u64;
    }

    pub fn add_padded(&mut self) {
        self.padded_frames += 1;
    }

    pub fn merge(&mut self, other: &StreamCounters) {
        self.chunks_in += other.chunks_in;
        self.bytes_in += other.bytes_in;
        self.frames_encoded += other.frames_encoded;
        self.frames_decoded += other.frames_decoded;
        self.packets_out += other.packets_out;
        self.bytes_out += other.bytes_out;
        self.head_events += other.head_events;
        self.tag_events += other.tag_events;
        self.tail_bytes_dropped += other.tail_bytes_dropped;
        self.padded_frames += other.padded_frames;
    }
}

impl AddAssign for StreamCounters {
    fn add_assign(&mut self, rhs: Self) {
        self.merge(&rhs);
    }
}
