//! Scripted engine shared by the integration tests.
#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use opus_stream::engine::{CodecEngine, EngineError, EngineKind, FrameSizeConvention};

/// What the engine saw, shared between the test and every engine instance.
#[derive(Clone, Default)]
pub struct Probe {
    pub controls: Arc<Mutex<Vec<(i32, i32)>>>,
    pub frame_sizes: Arc<Mutex<Vec<Option<usize>>>>,
    pub calls: Arc<AtomicUsize>,
    pub disposed: Arc<AtomicUsize>,
    pub parallel: Arc<AtomicBool>,
}

impl Probe {
    pub fn controls(&self) -> Vec<(i32, i32)> {
        self.controls.lock().unwrap().clone()
    }

    pub fn last_control(&self) -> Option<(i32, i32)> {
        self.controls.lock().unwrap().last().copied()
    }

    pub fn frame_sizes(&self) -> Vec<Option<usize>> {
        self.frame_sizes.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn disposed(&self) -> usize {
        self.disposed.load(Ordering::SeqCst)
    }

    pub fn parallel(&self) -> bool {
        self.parallel.load(Ordering::SeqCst)
    }
}

/// Echoes its input. Behaviour toggles are set with the builder methods.
pub struct MockEngine {
    probe: Probe,
    convention: FrameSizeConvention,
    disposable: bool,
    fail_at: Option<usize>,
    parallel_capable: bool,
    jitter: bool,
    panic_at: Option<usize>,
}

impl MockEngine {
    pub fn new(probe: &Probe) -> Self {
        Self {
            probe: probe.clone(),
            convention: FrameSizeConvention::Inferred,
            disposable: false,
            fail_at: None,
            parallel_capable: false,
            jitter: false,
            panic_at: None,
        }
    }

    pub fn per_call(mut self) -> Self {
        self.convention = FrameSizeConvention::PerCall;
        self
    }

    pub fn disposable(mut self) -> Self {
        self.disposable = true;
        self
    }

    /// Reject the n-th (0-based) encode/decode call across all instances sharing the probe.
    pub fn failing_at(mut self, call: usize) -> Self {
        self.fail_at = Some(call);
        self
    }

    /// Panic on the n-th (0-based) call across all instances sharing the probe.
    pub fn panicking_at(mut self, call: usize) -> Self {
        self.panic_at = Some(call);
        self
    }

    pub fn parallel_capable(mut self) -> Self {
        self.parallel_capable = true;
        self
    }

    /// Sleep a little, keyed on the first input byte, so workers finish out of order.
    pub fn jittered(mut self) -> Self {
        self.jitter = true;
        self
    }

    pub fn boxed(self) -> Box<dyn CodecEngine> {
        Box::new(self)
    }

    fn process(&mut self, op: &'static str, input: &[u8], frame_size: Option<usize>) -> Result<Vec<u8>, EngineError> {
        let n = self.probe.calls.fetch_add(1, Ordering::SeqCst);
        self.probe.frame_sizes.lock().unwrap().push(frame_size);
        if self.fail_at == Some(n) {
            return Err(EngineError::Rejected { op, msg: format!("scripted failure at call {n}") });
        }
        if input.is_empty() {
            return Err(EngineError::InvalidInput { op, len: 0, msg: "empty".into() });
        }
        if self.panic_at == Some(n) {
            panic!("scripted panic at call {n}");
        }
        if self.jitter {
            std::thread::sleep(Duration::from_millis(u64::from(input[0] % 4)));
        }
        Ok(input.to_vec())
    }
}

impl CodecEngine for MockEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::Raw
    }

    fn frame_size_convention(&self) -> FrameSizeConvention {
        self.convention
    }

    fn encode(&mut self, pcm: &[u8], frame_size: Option<usize>) -> Result<Vec<u8>, EngineError> {
        self.process("encode", pcm, frame_size)
    }

    fn decode(&mut self, packet: &[u8], frame_size: Option<usize>) -> Result<Vec<u8>, EngineError> {
        self.process("decode", packet, frame_size)
    }

    fn apply_control(&mut self, code: i32, value: i32) -> Result<(), EngineError> {
        self.probe.controls.lock().unwrap().push((code, value));
        Ok(())
    }

    fn requires_dispose(&self) -> bool {
        self.disposable
    }

    fn dispose(&mut self) -> Result<(), EngineError> {
        self.probe.disposed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn supports_parallel(&self) -> bool {
        self.parallel_capable
    }

    fn set_parallel(&mut self, enabled: bool) {
        self.probe.parallel.store(enabled, Ordering::SeqCst);
    }
}

/// `count` frames of `frame_len` bytes, frame `i` filled with byte `i`.
pub fn numbered_frames(count: usize, frame_len: usize) -> Vec<u8> {
    (0..count).flat_map(|i| std::iter::repeat(i as u8).take(frame_len)).collect()
}

/// OpusHead packet: version 1, 2 channels, pre-skip 312, 48 kHz, gain 0, mapping 0.
pub fn opus_head() -> Vec<u8> {
    let mut p = b"OpusHead".to_vec();
    p.push(1);
    p.push(2);
    p.extend_from_slice(&312u16.to_le_bytes());
    p.extend_from_slice(&48_000u32.to_le_bytes());
    p.extend_from_slice(&0u16.to_le_bytes());
    p.push(0);
    p
}

pub fn opus_tags() -> Vec<u8> {
    let mut p = b"OpusTags".to_vec();
    p.extend_from_slice(&7u32.to_le_bytes());
    p.extend_from_slice(b"encoder");
    p.extend_from_slice(&0u32.to_le_bytes());
    p
}
