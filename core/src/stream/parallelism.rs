use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Shared count of streams currently running with engine-level parallelism.
///
/// Passed explicitly through `StreamContext` instead of living in a global.
/// Clones share one counter.
#[derive(Debug, Clone, Default)]
pub struct ParallelWorkers {
    active: Arc<AtomicUsize>,
}

impl ParallelWorkers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register one stream. The returned lease decrements the counter exactly
    /// once, when it is released or dropped.
    pub fn acquire(&self) -> ParallelLease {
        let now = self.active.fetch_add(1, Ordering::AcqRel) + 1;
        tracing::debug!(active = now, "parallel workers acquired");
        ParallelLease { active: Some(self.active.clone()) }
    }

    pub fn active(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }

    /// True while at least one stream holds a lease.
    pub fn is_enabled(&self) -> bool {
        self.active() > 0
    }
}

#[derive(Debug)]
pub struct ParallelLease {
    active: Option<Arc<AtomicUsize>>,
}

impl ParallelLease {
    /// Release early. Further calls (and the eventual drop) are no-ops.
    pub fn release(&mut self) {
        if let Some(active) = self.active.take() {
            let now = active.fetch_sub(1, Ordering::AcqRel) - 1;
            tracing::debug!(active = now, "parallel workers released");
        }
    }
}

impl Drop for ParallelLease {
    fn drop(&mut self) {
        self.release();
    }
}

/// Per-stream context handed to constructors.
#[derive(Debug, Clone, Default)]
pub struct StreamContext {
    pub workers: ParallelWorkers,
}

impl StreamContext {
    pub fn new(workers: ParallelWorkers) -> Self {
        Self { workers }
    }
}

/// Parallelism configuration
#[derive(Debug, Clone)]
pub struct ParallelismProfile {
    pub workers: usize,
    pub inflight: usize,
}

impl ParallelismProfile {
    pub fn single_threaded() -> Self {
        Self {
            workers: 1,
            inflight: 1,
        }
    }

    pub fn new(workers: usize, inflight: usize) -> Self {
        Self {
            workers: workers.max(1),
            inflight: inflight.max(1),
        }
    }

    /// One worker per core minus one (leave a core for reader + writer),
    /// capped at `hard_cap`.
    pub fn dynamic(hard_cap: usize) -> Self {
        let cores = num_cpus::get();
        let workers = cores.saturating_sub(1).clamp(1, hard_cap.max(1));

        tracing::debug!(cores, workers, "parallelism profile");

        Self {
            workers,
            inflight: crate::constants::DEFAULT_INFLIGHT_FRAMES.max(workers * 2),
        }
    }
}
