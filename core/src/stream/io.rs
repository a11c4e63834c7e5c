//! stream/io.rs
//! Output sinks, ordered re-sequencing and chunked reads.

use std::collections::{BTreeMap, VecDeque};
use std::io::Read;

use bytes::Bytes;
use crossbeam::channel::Sender;

use crate::types::StreamError;

/// Downstream consumer of stream output.
///
/// A bounded channel sender blocks in `accept` until the consumer catches up,
/// which is how backpressure reaches the producer.
pub trait StreamSink<T> {
    fn accept(&mut self, item: T) -> Result<(), StreamError>;
}

impl<T> StreamSink<T> for Vec<T> {
    fn accept(&mut self, item: T) -> Result<(), StreamError> {
        self.push(item);
        Ok(())
    }
}

impl<T> StreamSink<T> for VecDeque<T> {
    fn accept(&mut self, item: T) -> Result<(), StreamError> {
        self.push_back(item);
        Ok(())
    }
}

impl<T> StreamSink<T> for Sender<T> {
    fn accept(&mut self, item: T) -> Result<(), StreamError> {
        self.send(item)
            .map_err(|_| StreamError::Pipeline("output channel closed".into()))
    }
}

impl<T, S: StreamSink<T> + ?Sized> StreamSink<T> for &mut S {
    fn accept(&mut self, item: T) -> Result<(), StreamError> {
        (**self).accept(item)
    }
}

/// Re-sequences indexed results so the sink sees them in index order,
/// whatever order workers complete in.
pub struct OrderedEmitter<'a, T, S: StreamSink<T> + ?Sized> {
    out: &'a mut S,
    next: u64,
    pending: BTreeMap<u64, T>,
}

impl<'a, T, S: StreamSink<T> + ?Sized> OrderedEmitter<'a, T, S> {
    pub fn new(out: &'a mut S) -> Self {
        Self {
            out,
            next: 0,
            pending: BTreeMap::new(),
        }
    }

    pub fn push(&mut self, index: u64, item: T) -> Result<(), StreamError> {
        if index < self.next || self.pending.contains_key(&index) {
            return Err(StreamError::Validation(format!("duplicate result index {index}")));
        }
        self.pending.insert(index, item);
        self.flush_ready()
    }

    /// Number of items handed to the sink so far.
    pub fn emitted(&self) -> u64 {
        self.next
    }

    pub fn buffered(&self) -> usize {
        self.pending.len()
    }

    /// Every pushed index must have been emitted; a gap means a result was lost.
    pub fn finish(mut self) -> Result<u64, StreamError> {
        self.flush_ready()?;
        if let Some((&index, _)) = self.pending.iter().next() {
            return Err(StreamError::Validation(format!(
                "missing result {} before index {index}",
                self.next
            )));
        }
        Ok(self.next)
    }

    fn flush_ready(&mut self) -> Result<(), StreamError> {
        while let Some(item) = self.pending.remove(&self.next) {
            self.out.accept(item)?;
            self.next += 1;
        }
        Ok(())
    }
}

/// Read up to `len` bytes, stopping early only at EOF. An empty result means EOF.
pub fn read_exact_or_eof<R: Read + ?Sized>(r: &mut R, len: usize) -> Result<Bytes, StreamError> {
    let mut buf = vec![0u8; len];
    let mut off = 0;

    while off < len {
        match r.read(&mut buf[off..]) {
            Ok(0) => break,
            Ok(n) => off += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }

    buf.truncate(off);
    Ok(Bytes::from(buf))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn emitter_restores_index_order() {
        let mut out: Vec<&str> = Vec::new();
        let mut emitter = OrderedEmitter::new(&mut out);
        emitter.push(2, "c").unwrap();
        emitter.push(0, "a").unwrap();
        assert_eq!(emitter.buffered(), 1);
        emitter.push(1, "b").unwrap();
        assert_eq!(emitter.finish().unwrap(), 3);
        assert_eq!(out, vec!["a", "b", "c"]);
    }

    #[test]
    fn emitter_reports_gaps_and_duplicates() {
        let mut out: Vec<u8> = Vec::new();
        let mut emitter = OrderedEmitter::new(&mut out);
        emitter.push(0, 1).unwrap();
        assert!(matches!(emitter.push(0, 1), Err(StreamError::Validation(_))));
        emitter.push(2, 3).unwrap();
        assert!(matches!(emitter.finish(), Err(StreamError::Validation(_))));
    }

    #[test]
    fn read_exact_or_eof_returns_short_tail() {
        let mut r = Cursor::new(vec![9u8; 10]);
        assert_eq!(read_exact_or_eof(&mut r, 4).unwrap().len(), 4);
        assert_eq!(read_exact_or_eof(&mut r, 4).unwrap().len(), 4);
        assert_eq!(read_exact_or_eof(&mut r, 4).unwrap().len(), 2);
        assert!(read_exact_or_eof(&mut r, 4).unwrap().is_empty());
    }

    #[test]
    fn closed_channel_is_a_pipeline_error() {
        let (mut tx, rx) = crossbeam::channel::bounded::<u8>(1);
        drop(rx);
        assert!(matches!(tx.accept(1), Err(StreamError::Pipeline(_))));
    }
}
