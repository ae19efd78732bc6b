/// Number of indices moved between a ring and a local cache in one batch.
///
/// Mirrors the original pool's `CACHE_BURST`: amortizes atomic traffic on the
/// backing ring by refilling/spilling local caches in chunks rather than one
/// index at a time.
pub const CACHE_BURST: usize = 32;

/// Configuration for a [`crate::Ring`].
#[derive(Debug, Clone, Copy)]
pub struct RingConfig {
    capacity: usize,
    mask: usize,
}

impl RingConfig {
    /// Creates a configuration for an explicit power-of-two capacity.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero or not a power of two.
    pub const fn new(capacity: usize) -> Self {
        assert!(capacity > 0 && capacity.is_power_of_two(), "capacity must be a nonzero power of two");
        Self { capacity, mask: capacity - 1 }
    }

    /// Smallest configuration that can hold at least `min` indices.
    ///
    /// Mirrors the pool's ring-sizing rule (spec §3): capacity is at least
    /// `CACHE_BURST * 2` (the original's `RING_SIZE_MIN`), rounded up further
    /// to the next power of two covering `min`.
    pub fn for_min_capacity(min: usize) -> Self {
        let floor = CACHE_BURST * 2;
        let wanted = min.max(floor);
        Self::new(wanted.next_power_of_two())
    }

    #[inline]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub const fn mask(&self) -> usize {
        self.mask
    }
}
