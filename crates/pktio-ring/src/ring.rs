use crate::backoff::Backoff;
use crate::config::RingConfig;
use crate::invariants::{debug_assert_bounded_count, debug_assert_initialized_read, debug_assert_monotonic};
use crossbeam_utils::CachePadded;
use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicUsize, Ordering};

// =============================================================================
// MEMORY ORDERING & SYNCHRONIZATION STRATEGY
// =============================================================================
//
// Bounded multi-producer/multi-consumer ring (Vyukov's per-cell sequence
// design). Each slot carries its own sequence number instead of relying on a
// single shared head/tail pair, which is what makes concurrent producers (and
// concurrent consumers) safe without a lock:
//
// - A cell's sequence equals the cycle-relative position at which it is next
//   writable. A producer claims a cell by CAS-ing the shared `enqueue_pos`
//   forward only when the cell's sequence matches its own claim position.
// - After writing, the producer publishes by storing `pos + 1` into the
//   cell's sequence with Release — this is what a consumer's Acquire load
//   synchronizes with.
// - Consumers mirror the protocol against `dequeue_pos`, and on completion
//   advance the cell's sequence to `pos + capacity`, making it the next
//   writable generation for the producer side.
//
// This lets any thread be a producer and any thread be a consumer: the two
// rings in `pktio-pool` (pool free list) and the internal event queues that
// reuse this type both need that property — the pool's free list can be fed
// and drained from arbitrary worker threads.
// =============================================================================

struct Cell<T> {
    sequence: AtomicUsize,
    data: UnsafeCell<MaybeUninit<T>>,
}

/// Bounded power-of-two capacity index ring.
///
/// Used by the buffer pool's backing free list and by internal event queues.
/// `enqueue`/`dequeue` never block; a full enqueue or empty dequeue reports
/// the count actually moved (which may be zero), per spec.
pub struct Ring<T> {
    buffer: Box<[Cell<T>]>,
    config: RingConfig,
    // Producer and consumer positions are each hammered by a disjoint set of
    // threads; padding them onto separate cache lines keeps a producer's CAS
    // from invalidating a consumer's line (and vice versa).
    enqueue_pos: CachePadded<AtomicUsize>,
    dequeue_pos: CachePadded<AtomicUsize>,
}

// Safety: access to each cell is negotiated through its sequence number;
// only one thread at a time holds the right to read or write a given cell.
unsafe impl<T: Send> Send for Ring<T> {}
unsafe impl<T: Send> Sync for Ring<T> {}

impl<T> Ring<T> {
    /// Creates a ring with the given configuration (spec: `init`).
    pub fn init(config: RingConfig) -> Self {
        let capacity = config.capacity();
        let mut buffer = Vec::with_capacity(capacity);
        for i in 0..capacity {
            buffer.push(Cell {
                sequence: AtomicUsize::new(i),
                data: UnsafeCell::new(MaybeUninit::uninit()),
            });
        }
        Self {
            buffer: buffer.into_boxed_slice(),
            config,
            enqueue_pos: CachePadded::new(AtomicUsize::new(0)),
            dequeue_pos: CachePadded::new(AtomicUsize::new(0)),
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.config.capacity()
    }

    /// Current occupancy. Racy under concurrent access — a hint, not a fact.
    pub fn len(&self) -> usize {
        let tail = self.enqueue_pos.load(Ordering::Relaxed);
        let head = self.dequeue_pos.load(Ordering::Relaxed);
        tail.saturating_sub(head).min(self.capacity())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // ---------------------------------------------------------------------
    // Single-item operations
    // ---------------------------------------------------------------------

    /// Enqueues one index. Returns `false` if the ring is full.
    pub fn enqueue_one(&self, item: T) -> bool {
        let mask = self.config.mask();
        let mut pos = self.enqueue_pos.load(Ordering::Relaxed);
        loop {
            let cell = &self.buffer[pos & mask];
            let seq = cell.sequence.load(Ordering::Acquire);
            let diff = seq as isize - pos as isize;

            if diff == 0 {
                match self.enqueue_pos.compare_exchange_weak(
                    pos,
                    pos.wrapping_add(1),
                    Ordering::Relaxed,
                    Ordering::Relaxed,
                ) {
                    Ok(_) => {
                        debug_assert_monotonic!("enqueue_pos", pos, pos.wrapping_add(1));
                        unsafe {
                            (*cell.data.get()).write(item);
                        }
                        cell.sequence.store(pos.wrapping_add(1), Ordering::Release);
                        return true;
                    }
                    Err(cur) => pos = cur,
                }
            } else if diff < 0 {
                // Cell not yet reclaimed by a consumer: ring is full.
                return false;
            } else {
                pos = self.enqueue_pos.load(Ordering::Relaxed);
            }
        }
    }

    /// Dequeues one index. Returns `None` if the ring is empty.
    pub fn dequeue_one(&self) -> Option<T> {
        let mask = self.config.mask();
        let capacity = self.capacity();
        let mut pos = self.dequeue_pos.load(Ordering::Relaxed);
        loop {
            let cell = &self.buffer[pos & mask];
            let seq = cell.sequence.load(Ordering::Acquire);
            let diff = seq as isize - (pos.wrapping_add(1)) as isize;

            if diff == 0 {
                match self.dequeue_pos.compare_exchange_weak(
                    pos,
                    pos.wrapping_add(1),
                    Ordering::Relaxed,
                    Ordering::Relaxed,
                ) {
                    Ok(_) => {
                        debug_assert_initialized_read!(pos, pos, pos.wrapping_add(capacity));
                        let item = unsafe { (*cell.data.get()).assume_init_read() };
                        cell.sequence.store(pos.wrapping_add(capacity), Ordering::Release);
                        return Some(item);
                    }
                    Err(cur) => pos = cur,
                }
            } else if diff < 0 {
                return None;
            } else {
                pos = self.dequeue_pos.load(Ordering::Relaxed);
            }
        }
    }

    // ---------------------------------------------------------------------
    // Batch operations
    // ---------------------------------------------------------------------

    /// Enqueues a prefix of `items`, stopping at the first full cell.
    ///
    /// Returns the number actually inserted (0..=items.len()). Each inserted
    /// item is immediately visible to consumers — there is no partially
    /// published state, but under contention the batch as a whole may be
    /// split across interleaved producers (the count returned is exact for
    /// what *this* call inserted).
    pub fn enqueue_batch(&self, items: &[T]) -> usize
    where
        T: Copy,
    {
        let mut n = 0;
        for &item in items {
            if !self.enqueue_one(item) {
                break;
            }
            n += 1;
        }
        debug_assert_bounded_count!(n, items.len());
        n
    }

    /// Dequeues up to `out.len()` indices, stopping at the first empty read.
    /// Returns the number actually written into `out`.
    pub fn dequeue_batch(&self, out: &mut [T]) -> usize {
        let mut n = 0;
        while n < out.len() {
            match self.dequeue_one() {
                Some(item) => {
                    out[n] = item;
                    n += 1;
                }
                None => break,
            }
        }
        n
    }

    /// Enqueues a full batch with adaptive backoff, retrying while the ring
    /// is transiently full instead of giving up after the first pass.
    pub fn enqueue_batch_spin(&self, items: &[T]) -> usize
    where
        T: Copy,
    {
        let mut done = 0;
        let mut backoff = Backoff::new();
        while done < items.len() {
            let n = self.enqueue_batch(&items[done..]);
            done += n;
            if n == 0 {
                if backoff.is_completed() {
                    break;
                }
                backoff.snooze();
            } else {
                backoff.reset();
            }
        }
        done
    }

    /// Dequeues a full batch with adaptive backoff, retrying while the ring
    /// is transiently empty instead of giving up after the first pass.
    pub fn dequeue_batch_spin(&self, out: &mut [T]) -> usize {
        let mut done = 0;
        let mut backoff = Backoff::new();
        while done < out.len() {
            let n = self.dequeue_batch(&mut out[done..]);
            done += n;
            if n == 0 {
                if backoff.is_completed() {
                    break;
                }
                backoff.snooze();
            } else {
                backoff.reset();
            }
        }
        done
    }
}

impl<T> Drop for Ring<T> {
    fn drop(&mut self) {
        // Drain any indices still owned by the ring so T's Drop runs.
        while self.dequeue_one().is_some() {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn ring(cap: usize) -> Ring<u32> {
        Ring::init(RingConfig::new(cap))
    }

    #[test]
    fn enqueue_dequeue_roundtrip() {
        let r = ring(8);
        assert!(r.enqueue_one(1));
        assert!(r.enqueue_one(2));
        assert_eq!(r.dequeue_one(), Some(1));
        assert_eq!(r.dequeue_one(), Some(2));
        assert_eq!(r.dequeue_one(), None);
    }

    #[test]
    fn enqueue_into_full_ring_returns_false() {
        let r = ring(2);
        assert!(r.enqueue_one(1));
        assert!(r.enqueue_one(2));
        assert!(!r.enqueue_one(3));
    }

    #[test]
    fn dequeue_from_empty_ring_returns_none() {
        let r: Ring<u32> = ring(4);
        assert_eq!(r.dequeue_one(), None);
    }

    #[test]
    fn batch_enqueue_stops_at_full() {
        let r = ring(4);
        let items = [1u32, 2, 3, 4, 5, 6];
        let n = r.enqueue_batch(&items);
        assert_eq!(n, 4);
        let mut out = [0u32; 8];
        let got = r.dequeue_batch(&mut out);
        assert_eq!(got, 4);
        assert_eq!(&out[..4], &[1, 2, 3, 4]);
    }

    #[test]
    fn wrap_around_reuses_slots() {
        let r = ring(4);
        for round in 0..10u32 {
            assert!(r.enqueue_one(round));
            assert_eq!(r.dequeue_one(), Some(round));
        }
    }

    #[test]
    fn concurrent_producers_consumers_preserve_count() {
        let r = Arc::new(ring(1024));
        let producers: Vec<_> = (0..4)
            .map(|_| {
                let r = Arc::clone(&r);
                thread::spawn(move || {
                    for i in 0..10_000u32 {
                        while !r.enqueue_one(i) {
                            thread::yield_now();
                        }
                    }
                })
            })
            .collect();

        let total = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let consumers: Vec<_> = (0..4)
            .map(|_| {
                let r = Arc::clone(&r);
                let total = Arc::clone(&total);
                thread::spawn(move || {
                    let mut n = 0;
                    for _ in 0..10_000 {
                        loop {
                            if r.dequeue_one().is_some() {
                                n += 1;
                                break;
                            }
                            thread::yield_now();
                        }
                    }
                    total.fetch_add(n, Ordering::Relaxed);
                })
            })
            .collect();

        for p in producers {
            p.join().unwrap();
        }
        for c in consumers {
            c.join().unwrap();
        }
        assert_eq!(total.load(Ordering::Relaxed), 40_000);
        assert!(r.is_empty());
    }
}
