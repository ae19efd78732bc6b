use std::sync::atomic::{AtomicU64, Ordering};

/// Relaxed atomic counters updated on the alloc/free hot path, exposed as a
/// point-in-time [`PoolStatsSnapshot`] by [`crate::Pool::info`] — mirrors the
/// corpus's `Metrics`/`MetricsSnapshot` split rather than a logging facade.
#[derive(Default)]
pub(crate) struct PoolStats {
    allocs: AtomicU64,
    frees: AtomicU64,
    cache_refills: AtomicU64,
    cache_spills: AtomicU64,
    hp_skips: AtomicU64,
    ring_underflows: AtomicU64,
}

impl PoolStats {
    pub(crate) fn record_alloc(&self) {
        self.allocs.fetch_add(1, Ordering::Relaxed);
    }
    pub(crate) fn record_free(&self) {
        self.frees.fetch_add(1, Ordering::Relaxed);
    }
    pub(crate) fn record_hp_skip(&self) {
        self.hp_skips.fetch_add(1, Ordering::Relaxed);
    }
    pub(crate) fn record_ring_underflow(&self) {
        self.ring_underflows.fetch_add(1, Ordering::Relaxed);
    }
    pub(crate) fn record_cache_refill(&self) {
        self.cache_refills.fetch_add(1, Ordering::Relaxed);
    }
    pub(crate) fn record_cache_spill(&self) {
        self.cache_spills.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> PoolStatsSnapshot {
        PoolStatsSnapshot {
            allocs: self.allocs.load(Ordering::Relaxed),
            frees: self.frees.load(Ordering::Relaxed),
            cache_refills: self.cache_refills.load(Ordering::Relaxed),
            cache_spills: self.cache_spills.load(Ordering::Relaxed),
            hp_skips: self.hp_skips.load(Ordering::Relaxed),
            ring_underflows: self.ring_underflows.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of [`PoolStats`] returned by `Pool::info`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStatsSnapshot {
    pub allocs: u64,
    pub frees: u64,
    pub cache_refills: u64,
    pub cache_spills: u64,
    pub hp_skips: u64,
    pub ring_underflows: u64,
}
