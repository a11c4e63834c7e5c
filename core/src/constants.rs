//! constants.rs
//! Stable control codes, container signatures and framing defaults.

/// Signed 16-bit interleaved PCM.
pub const BYTES_PER_SAMPLE: usize = 2;

/// Bitrate clamp applied before the value reaches the engine.
pub const MIN_BITRATE: i32 = 16_000;
pub const MAX_BITRATE: i32 = 128_000;

/// Engine control codes (mirrors the libopus CTL request numbers).
pub mod ctl {
    pub const BITRATE: i32                  = 4002;
    pub const FORWARD_ERROR_CORRECTION: i32 = 4012;
    pub const EXPECTED_PACKET_LOSS: i32     = 4014;
}

/// Codec-setup header signature.
pub const OPUS_HEAD: [u8; 8] = *b"OpusHead";
/// Comment / metadata block signature.
pub const OPUS_TAGS: [u8; 8] = *b"OpusTags";
pub const SIGNATURE_LEN: usize = 8;

/// Offsets inside an OpusHead packet.
pub mod head_offsets {
    pub const VERSION: usize  = 8;
    pub const PRE_SKIP: usize = 10;
    pub const GAIN: usize     = 16;
}
/// Smallest OpusHead that still carries the gain field.
pub const OPUS_HEAD_MIN_LEN: usize = head_offsets::GAIN + 2;

/// 120 ms at 48 kHz, the longest frame Opus can produce.
pub const MAX_FRAME_SIZE: usize = 5760;
/// Ceiling on the pending buffer reserved up front: two max-size stereo frames.
pub const MAX_PREALLOC_BYTES: usize = MAX_FRAME_SIZE * 2 * BYTES_PER_SAMPLE * 2;
/// Recommended upper bound for a single encoded packet.
pub const MAX_PACKET_SIZE: usize = 4000;

/// Pipeline defaults.
pub const DEFAULT_READ_CHUNK: usize = 16 * 1024; // 16 KiB
pub const DEFAULT_INFLIGHT_FRAMES: usize = 64;
