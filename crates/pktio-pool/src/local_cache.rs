//! Per-thread buffer index caches.
//!
//! Each [`crate::Pool`] keeps a weak registry of the [`LocalCache`] any
//! thread has created for it. A thread's own handle is a strong `Arc` held
//! in a `thread_local!`; when the thread exits, that strong reference drops
//! and (because the pool only holds a `Weak`) the cache's own [`Drop`] runs,
//! flushing whatever indices it still held back to the ring — spec §4.2's
//! "on thread termination, the cache is flushed to the ring".
//!
//! [`Pool::destroy`](crate::Pool::destroy) can also force a drain from any
//! thread (including caches belonging to still-running threads) by locking
//! each registered cache directly.

use crate::stats::PoolStats;
use pktio_ring::{Ring, CACHE_BURST};
use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};

pub(crate) struct LocalCache {
    ring: Arc<Ring<u32>>,
    stats: Arc<PoolStats>,
    buf: Mutex<Vec<u32>>,
    capacity: usize,
}

impl LocalCache {
    fn new(ring: Arc<Ring<u32>>, stats: Arc<PoolStats>, capacity: usize) -> Self {
        Self { ring, stats, buf: Mutex::new(Vec::with_capacity(capacity)), capacity }
    }

    /// Returns one index, refilling from the ring in a burst on underflow.
    pub(crate) fn alloc(&self) -> Option<u32> {
        let mut buf = self.buf.lock().unwrap();
        if let Some(idx) = buf.pop() {
            return Some(idx);
        }
        let mut tmp = vec![0u32; CACHE_BURST];
        let n = self.ring.dequeue_batch(&mut tmp);
        if n > 0 {
            self.stats.record_cache_refill();
        } else {
            self.stats.record_ring_underflow();
        }
        buf.extend_from_slice(&tmp[..n]);
        buf.pop()
    }

    /// Returns one index, spilling to the ring in a burst on overflow.
    pub(crate) fn free(&self, idx: u32) {
        let mut buf = self.buf.lock().unwrap();
        buf.push(idx);
        if buf.len() > self.capacity.saturating_sub(CACHE_BURST) {
            let spill = buf.len().min(CACHE_BURST);
            let start = buf.len() - spill;
            let items: Vec<u32> = buf.split_off(start);
            let committed = self.ring.enqueue_batch_spin(&items);
            debug_assert_eq!(committed, items.len(), "ring undersized for pool cache spill");
            self.stats.record_cache_spill();
        }
    }

    /// Drains every index currently held, returning them to the ring.
    /// Returns the number of indices flushed.
    pub(crate) fn drain(&self) -> usize {
        let mut buf = self.buf.lock().unwrap();
        let n = buf.len();
        let items: Vec<u32> = buf.split_off(0);
        let committed = self.ring.enqueue_batch_spin(&items);
        debug_assert_eq!(committed, items.len(), "ring undersized for pool cache drain");
        n
    }

    pub(crate) fn len(&self) -> usize {
        self.buf.lock().unwrap().len()
    }
}

impl Drop for LocalCache {
    fn drop(&mut self) {
        self.drain();
    }
}

/// Per-pool registry of every thread's cache, so `destroy` can force a drain
/// from threads other than the one calling it.
#[derive(Default)]
pub(crate) struct CacheRegistry {
    caches: Mutex<Vec<Weak<LocalCache>>>,
}

impl CacheRegistry {
    /// Flushes every still-live cache. Returns the total number flushed.
    pub(crate) fn drain_all(&self) -> usize {
        let caches = self.caches.lock().unwrap();
        caches.iter().filter_map(Weak::upgrade).map(|c| c.drain()).sum()
    }

    /// Sum of indices currently parked in any still-live cache.
    pub(crate) fn total_cached(&self) -> usize {
        let caches = self.caches.lock().unwrap();
        caches.iter().filter_map(Weak::upgrade).map(|c| c.len()).sum()
    }

    fn register(&self, cache: &Arc<LocalCache>) {
        let mut caches = self.caches.lock().unwrap();
        caches.retain(|w| w.strong_count() > 0);
        caches.push(Arc::downgrade(cache));
    }
}

thread_local! {
    // Keyed by the pool's `ring` allocation identity, not its registry slot
    // index: a destroyed pool's slot can be reused by an unrelated `create`,
    // and a `u32` index alone can't tell the two apart. The ring's `Arc`
    // address can't be reused for a different pool while this thread still
    // holds a cache bound to the old one, since that cache's own `Arc<Ring>`
    // clone keeps the old allocation's strong count above zero.
    static TLS_CACHES: RefCell<HashMap<usize, Arc<LocalCache>>> = RefCell::new(HashMap::new());
}

/// Returns this thread's cache for the pool backing `ring`, creating and
/// registering it on first use.
pub(crate) fn thread_cache(
    ring: &Arc<Ring<u32>>,
    stats: &Arc<PoolStats>,
    registry: &CacheRegistry,
    capacity: usize,
) -> Arc<LocalCache> {
    let key = Arc::as_ptr(ring) as usize;
    TLS_CACHES.with(|caches| {
        let mut caches = caches.borrow_mut();
        caches
            .entry(key)
            .or_insert_with(|| {
                let cache = Arc::new(LocalCache::new(Arc::clone(ring), Arc::clone(stats), capacity));
                registry.register(&cache);
                cache
            })
            .clone()
    })
}
