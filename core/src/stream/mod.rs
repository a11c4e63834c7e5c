//! Framing adapters between chunked byte streams and a frame-oriented codec.
//!
//! Layers:
//! - `base`: engine ownership, control setters, one-frame primitives
//! - `framing`: pending buffer and frame slicing
//! - `encoder` / `decoder`: the two stream directions
//! - `pipeline`: threaded variants with ordered output

pub mod base;
pub mod framing;
pub mod encoder;
pub mod decoder;
pub mod parallelism;
pub mod io;
pub mod pipeline;

pub use base::StreamBase;
pub use encoder::{encode_stream, EncodeStream, FlushMode, FrameEncoder};
pub use decoder::{classify_packet, parse_opus_head, DecoderEvent, FrameDecoder, HeaderError, OpusFormat, PacketKind};
pub use parallelism::{ParallelLease, ParallelWorkers, ParallelismProfile, StreamContext};
pub use io::{OrderedEmitter, StreamSink};
pub use pipeline::{registry_factory, run_decode_pipeline, run_encode_pipeline};
