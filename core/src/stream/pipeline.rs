//! stream/pipeline.rs
//!
//! Threaded encode/decode pipelines.
//!
//! Shape: reader thread → bounded channel → N workers → bounded channel →
//! ordered emitter on the calling thread. Frames carry an index from the
//! reader; the emitter re-sequences so output order equals input order.
//!
//! N is the profile's worker count only when the config asks for parallel
//! work and the engine says independent instances may run concurrently.
//! Otherwise a single worker owns the only engine instance.
//!
//! At most `profile.inflight` frames are between the reader and the sink at
//! any time: the reader takes a credit per frame and the emitter returns it
//! once the frame reaches the sink. A pipeline counts as one stream on the
//! shared worker counter however many workers it runs.

use std::io::Read;
use std::thread::{self, ScopedJoinHandle};
use std::time::Instant;

use bytes::Bytes;
use crossbeam::channel::{bounded, Receiver, Sender};

use crate::config::StreamConfig;
use crate::constants::DEFAULT_READ_CHUNK;
use crate::engine::{self, CodecEngine};
use crate::stream::base::StreamBase;
use crate::stream::decoder::{DecoderEvent, FrameDecoder};
use crate::stream::framing::FrameAccumulator;
use crate::stream::io::{read_exact_or_eof, OrderedEmitter, StreamSink};
use crate::stream::parallelism::{ParallelismProfile, StreamContext};
use crate::telemetry::{Stage, StageTimes, StreamCounters, TelemetrySnapshot, TelemetryTimer};
use crate::types::StreamError;

type Indexed<T> = (u64, T);
type WorkerResult<T> = (u64, Result<T, StreamError>);

/// Engine factory backed by the registry.
pub fn registry_factory(config: &StreamConfig) -> impl Fn() -> Result<Box<dyn CodecEngine>, StreamError> + '_ {
    move || engine::engine_for(config)
}

#[derive(Debug, Default)]
struct StageReport {
    counters: StreamCounters,
    times: StageTimes,
}

impl StageReport {
    fn absorb(&mut self, other: StageReport) {
        self.counters.merge(&other.counters);
        self.times.merge(&other.times);
    }
}

/// Reports a worker panic to the emitter. The lost frame never returns its
/// credit, so without this the reader could wait forever.
struct PanicNotice<T> {
    tx: Sender<WorkerResult<T>>,
}

impl<T> Drop for PanicNotice<T> {
    fn drop(&mut self) {
        if thread::panicking() {
            let _ = self
                .tx
                .send((u64::MAX, Err(StreamError::Pipeline("worker panicked".into()))));
        }
    }
}

struct EncodeWorker {
    id: usize,
    base: StreamBase,
}

impl EncodeWorker {
    fn run(mut self, rx: Receiver<Indexed<Bytes>>, tx: Sender<WorkerResult<Bytes>>) -> StageReport {
        let _notice = PanicNotice { tx: tx.clone() };
        let mut report = StageReport::default();
        tracing::debug!(worker = self.id, "encode worker starting");

        for (index, frame) in rx.iter() {
            let t = Instant::now();
            let res = self.base.encode_one(&frame);
            report.times.add(Stage::Encode, t.elapsed());

            if let Ok(packet) = &res {
                report.counters.add_encoded(packet.len());
            }
            let failed = res.is_err();
            if tx.send((index, res)).is_err() || failed {
                break;
            }
        }

        self.base.finalize();
        tracing::debug!(worker = self.id, frames = report.counters.frames_encoded, "encode worker finished");
        report
    }
}

struct DecodeWorker {
    id: usize,
    decoder: FrameDecoder,
}

impl DecodeWorker {
    fn run(mut self, rx: Receiver<Indexed<Bytes>>, tx: Sender<WorkerResult<DecoderEvent>>) -> StageReport {
        let _notice = PanicNotice { tx: tx.clone() };
        let mut times = StageTimes::default();
        tracing::debug!(worker = self.id, "decode worker starting");

        for (index, packet) in rx.iter() {
            let t = Instant::now();
            let res = self.decoder.push(&packet);
            times.add(Stage::Decode, t.elapsed());

            let failed = res.is_err();
            if tx.send((index, res)).is_err() || failed {
                break;
            }
        }

        self.decoder.destroy();
        let counters = self.decoder.counters().clone();
        tracing::debug!(worker = self.id, frames = counters.frames_decoded, "decode worker finished");
        StageReport { counters, times }
    }
}

/// One engine per worker. The first instance decides whether more may be built.
fn build_engines<F>(
    factory: &F,
    config: &StreamConfig,
    profile: &ParallelismProfile,
) -> Result<Vec<Box<dyn CodecEngine>>, StreamError>
where
    F: Fn() -> Result<Box<dyn CodecEngine>, StreamError>,
{
    let first = factory()?;
    let count = if config.parallel && first.supports_parallel() {
        profile.workers.max(1)
    } else {
        1
    };

    let mut engines = Vec::with_capacity(count);
    engines.push(first);
    for _ in 1..count {
        engines.push(factory()?);
    }
    Ok(engines)
}

/// Drain worker results into `sink` in index order, returning one credit per
/// item the sink accepts.
fn emit_ordered<T, S>(
    out_rx: Receiver<WorkerResult<T>>,
    credits: Receiver<()>,
    sink: &mut S,
    times: &mut StageTimes,
) -> Result<u64, StreamError>
where
    S: StreamSink<T> + ?Sized,
{
    let mut emitter = OrderedEmitter::new(sink);
    for (index, res) in out_rx.iter() {
        let item = res?;
        let before = emitter.emitted();
        let t = Instant::now();
        emitter.push(index, item)?;
        times.add(Stage::Emit, t.elapsed());
        for _ in before..emitter.emitted() {
            let _ = credits.try_recv();
        }
    }
    emitter.finish()
}

fn take_credit(credits: &Sender<()>) -> Result<(), StreamError> {
    credits
        .send(())
        .map_err(|_| StreamError::Pipeline("emitter stopped".into()))
}

fn join<T>(handle: ScopedJoinHandle<'_, T>, what: &str) -> Result<T, StreamError> {
    handle
        .join()
        .map_err(|_| StreamError::Pipeline(format!("{what} thread panicked")))
}

/// Collect reader and worker outcomes. The emitter's error wins, then the
/// reader's, then any worker panic.
fn settle(
    emitted: Result<u64, StreamError>,
    reader: Result<Result<StageReport, StreamError>, StreamError>,
    workers: Vec<Result<StageReport, StreamError>>,
) -> Result<(u64, StageReport), StreamError> {
    let emitted = emitted?;
    let mut report = reader.and_then(|r| r)?;
    for worker in workers {
        report.absorb(worker?);
    }
    Ok((emitted, report))
}

fn snapshot(report: StageReport, emit_times: StageTimes, mut timer: TelemetryTimer, workers: usize) -> TelemetrySnapshot {
    timer.stage_times.merge(&report.times);
    timer.stage_times.merge(&emit_times);
    timer.finish();
    TelemetrySnapshot::from(&report.counters, &timer).with_workers(workers)
}

/// Encode everything `reader` yields into `sink`, one packet per frame in
/// input order. A trailing partial frame is dropped.
pub fn run_encode_pipeline<R, S, F>(
    mut reader: R,
    sink: &mut S,
    factory: F,
    config: &StreamConfig,
    profile: &ParallelismProfile,
    ctx: &StreamContext,
) -> Result<TelemetrySnapshot, StreamError>
where
    R: Read + Send,
    S: StreamSink<Bytes> + ?Sized,
    F: Fn() -> Result<Box<dyn CodecEngine>, StreamError>,
{
    let timer = TelemetryTimer::new();
    let geometry = config.encoder_geometry()?;
    let frame_len = geometry.required_bytes();

    let bases = build_engines(&factory, config, profile)?
        .into_iter()
        .map(|engine| {
            let mut base = StreamBase::for_worker(engine, geometry, config.parallel);
            base.apply_config_controls(config)?;
            Ok(base)
        })
        .collect::<Result<Vec<_>, StreamError>>()?;
    let worker_count = bases.len();
    let _lease = config.parallel.then(|| ctx.workers.acquire());

    tracing::debug!(workers = worker_count, frame_len, inflight = profile.inflight, "encode pipeline starting");

    let mut emit_times = StageTimes::default();
    let (emitted, report) = thread::scope(|scope| {
        let (frame_tx, frame_rx) = bounded::<Indexed<Bytes>>(profile.inflight);
        let (out_tx, out_rx) = bounded::<WorkerResult<Bytes>>(profile.inflight);
        let (credit_tx, credit_rx) = bounded::<()>(profile.inflight.max(1));

        // ---- Reader ----
        let reader = &mut reader;
        let reader_handle = scope.spawn(move || -> Result<StageReport, StreamError> {
            let mut report = StageReport::default();
            let mut frames = FrameAccumulator::new(frame_len);
            let mut index = 0u64;

            loop {
                let t = Instant::now();
                let chunk = read_exact_or_eof(&mut *reader, DEFAULT_READ_CHUNK)?;
                report.times.add(Stage::Read, t.elapsed());
                if chunk.is_empty() {
                    break;
                }
                report.counters.add_chunk(chunk.len());
                frames.push(&chunk);

                while let Some(frame) = frames.next_frame() {
                    take_credit(&credit_tx)?;
                    frame_tx
                        .send((index, frame))
                        .map_err(|_| StreamError::Pipeline("frame channel closed".into()))?;
                    index += 1;
                }
            }

            let tail = frames.take_remainder();
            if !tail.is_empty() {
                tracing::warn!(bytes = tail.len(), "dropping trailing partial frame");
                report.counters.add_dropped_tail(tail.len());
            }
            tracing::debug!(frames = index, "reader finished");
            Ok(report)
        });

        // ---- Workers ----
        let handles: Vec<_> = bases
            .into_iter()
            .enumerate()
            .map(|(id, base)| {
                let rx = frame_rx.clone();
                let tx = out_tx.clone();
                scope.spawn(move || EncodeWorker { id, base }.run(rx, tx))
            })
            .collect();
        drop(frame_rx);
        drop(out_tx);

        // ---- Ordered emitter ----
        let emitted = emit_ordered(out_rx, credit_rx, sink, &mut emit_times);

        let reader = join(reader_handle, "reader");
        let workers = handles.into_iter().map(|h| join(h, "encode worker")).collect();
        settle(emitted, reader, workers)
    })?;

    let snap = snapshot(report, emit_times, timer, worker_count);
    tracing::info!(
        packets = emitted,
        bytes_in = snap.counters.bytes_in,
        bytes_out = snap.counters.bytes_out,
        tail_dropped = snap.counters.tail_bytes_dropped,
        workers = worker_count,
        "encode pipeline finished"
    );
    Ok(snap)
}

/// Decode `packets` into `sink`, one event per packet in input order.
pub fn run_decode_pipeline<I, S, F>(
    packets: I,
    sink: &mut S,
    factory: F,
    config: &StreamConfig,
    profile: &ParallelismProfile,
    ctx: &StreamContext,
) -> Result<TelemetrySnapshot, StreamError>
where
    I: IntoIterator<Item = Bytes>,
    I::IntoIter: Send,
    S: StreamSink<DecoderEvent> + ?Sized,
    F: Fn() -> Result<Box<dyn CodecEngine>, StreamError>,
{
    let timer = TelemetryTimer::new();
    let geometry = config.decoder_geometry()?;
    let decoders = build_engines(&factory, config, profile)?
        .into_iter()
        .map(|engine| {
            let base = StreamBase::for_worker(engine, geometry, config.parallel);
            FrameDecoder::assemble(base, config)
        })
        .collect::<Result<Vec<_>, StreamError>>()?;
    let worker_count = decoders.len();
    let _lease = config.parallel.then(|| ctx.workers.acquire());
    let packets = packets.into_iter();

    tracing::debug!(workers = worker_count, inflight = profile.inflight, "decode pipeline starting");

    let mut emit_times = StageTimes::default();
    let (emitted, report) = thread::scope(|scope| {
        let (packet_tx, packet_rx) = bounded::<Indexed<Bytes>>(profile.inflight);
        let (out_tx, out_rx) = bounded::<WorkerResult<DecoderEvent>>(profile.inflight);
        let (credit_tx, credit_rx) = bounded::<()>(profile.inflight.max(1));

        // ---- Reader ----
        let reader_handle = scope.spawn(move || -> Result<StageReport, StreamError> {
            let mut count = 0u64;
            for packet in packets {
                take_credit(&credit_tx)?;
                packet_tx
                    .send((count, packet))
                    .map_err(|_| StreamError::Pipeline("packet channel closed".into()))?;
                count += 1;
            }
            tracing::debug!(packets = count, "reader finished");
            Ok(StageReport::default())
        });

        // ---- Workers ----
        let handles: Vec<_> = decoders
            .into_iter()
            .enumerate()
            .map(|(id, decoder)| {
                let rx = packet_rx.clone();
                let tx = out_tx.clone();
                scope.spawn(move || DecodeWorker { id, decoder }.run(rx, tx))
            })
            .collect();
        drop(packet_rx);
        drop(out_tx);

        // ---- Ordered emitter ----
        let emitted = emit_ordered(out_rx, credit_rx, sink, &mut emit_times);

        let reader = join(reader_handle, "reader");
        let workers = handles.into_iter().map(|h| join(h, "decode worker")).collect();
        settle(emitted, reader, workers)
    })?;

    let snap = snapshot(report, emit_times, timer, worker_count);
    tracing::info!(
        events = emitted,
        frames = snap.counters.frames_decoded,
        head = snap.counters.head_events,
        tags = snap.counters.tag_events,
        workers = worker_count,
        "decode pipeline finished"
    );
    Ok(snap)
}
