//! The buffer pool itself: sizing, huge-page-boundary skipping, alignment,
//! and the alloc/free entry points (spec §4.2).

use crate::config::{
    round_up, BufferType, PoolCapability, PoolParams, BUFFER_ALIGN_MAX, CACHE_BURST,
    CACHE_LINE_SIZE, FIRST_HP_SIZE,
};
use crate::error::PoolError;
use crate::header::BufferHeader;
use crate::local_cache::{self, CacheRegistry};
use crate::region::Region;
use crate::stats::{PoolStats, PoolStatsSnapshot};
use pktio_ring::{Ring, RingConfig};
use std::mem::size_of;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Opaque reference to one buffer within its owning pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferHandle(pub(crate) u32);

impl BufferHandle {
    #[inline]
    pub fn index(self) -> u32 {
        self.0
    }
}

/// Descriptive snapshot returned by [`Pool::info`].
#[derive(Debug, Clone)]
pub struct PoolInfo {
    pub name: String,
    pub buf_type: BufferType,
    pub num: usize,
    pub num_extra: usize,
    pub seg_len: usize,
    pub block_size: usize,
    pub free_count: usize,
    pub stats: PoolStatsSnapshot,
}

fn div_ceil(numerator: u64, denominator: u64) -> u64 {
    (numerator + denominator - 1) / denominator
}

fn huge_page(addr: usize) -> u64 {
    addr as u64 / FIRST_HP_SIZE
}

/// A live, reserved buffer pool: `params` instantiated against real memory.
pub struct Pool {
    index: u32,
    name: String,
    buf_type: BufferType,
    num: usize,
    num_extra: usize,
    seg_len: usize,
    headroom: usize,
    tailroom: usize,
    align: usize,
    block_size: usize,
    uarea_size: usize,
    region: Region,
    uarea_region: Option<Region>,
    ring: Arc<Ring<u32>>,
    cache_capacity: usize,
    caches: CacheRegistry,
    outstanding: AtomicUsize,
    stats: Arc<PoolStats>,
}

// Safety: `region`/`uarea_region` are plain byte storage; all access to a
// given block is serialized through ownership handed out by `ring`/`caches`
// (spec §3 Ownership — a buffer has exactly one owner at a time).
unsafe impl Send for Pool {}
unsafe impl Sync for Pool {}

impl Pool {
    pub(crate) fn create(
        index: u32,
        name: &str,
        params: PoolParams,
        capability: &PoolCapability,
    ) -> Result<Self, PoolError> {
        if params.num == 0 || params.num > capability.max_num {
            return Err(PoolError::BadParams("num out of range"));
        }
        if params.seg_len == 0 || params.seg_len > capability.max_len {
            return Err(PoolError::BadParams("seg_len out of range"));
        }
        let align = if params.align == 0 { crate::config::BUFFER_ALIGN_MIN } else { params.align };
        if !align.is_power_of_two() || align > BUFFER_ALIGN_MAX {
            return Err(PoolError::BadParams("align must be a power of two no greater than BUFFER_ALIGN_MAX"));
        }
        if params.headroom > capability.max_headroom || params.tailroom > capability.max_tailroom {
            return Err(PoolError::BadParams("headroom/tailroom exceeds capability"));
        }
        if params.uarea_size > capability.max_uarea_size {
            return Err(PoolError::BadParams("uarea_size exceeds capability"));
        }

        // Two-stage rounding: header size is cache-line rounded first, then
        // the whole block is rounded again once the rest is added.
        let header_size = round_up(size_of::<BufferHeader>(), CACHE_LINE_SIZE);
        let block_size = round_up(
            header_size + align + params.headroom + params.seg_len + params.tailroom,
            CACHE_LINE_SIZE,
        );

        let num = params.num;
        let first_term = div_ceil(num as u64 * block_size as u64, FIRST_HP_SIZE);
        let num_extra = first_term + div_ceil(first_term * block_size as u64, FIRST_HP_SIZE);
        let num_extra = num_extra as usize;

        let ring = Arc::new(Ring::init(RingConfig::for_min_capacity(num)));

        let total_blocks = num + num_extra;
        let region_len = total_blocks
            .checked_mul(block_size)
            .ok_or(PoolError::BadParams("pool size overflows backing region"))?;
        let shareable = params.buf_type == BufferType::Packet;
        let region = Region::reserve(region_len, shareable)?;

        let uarea_region = if params.uarea_size > 0 {
            Some(Region::reserve(num * params.uarea_size, shareable)?)
        } else {
            None
        };

        let pool = Self {
            index,
            name: name.to_owned(),
            buf_type: params.buf_type,
            num,
            num_extra,
            seg_len: params.seg_len,
            headroom: params.headroom,
            tailroom: params.tailroom,
            align,
            block_size,
            uarea_size: params.uarea_size,
            region,
            uarea_region,
            ring,
            cache_capacity: CACHE_BURST * 4,
            caches: CacheRegistry::default(),
            outstanding: AtomicUsize::new(0),
            stats: Arc::new(PoolStats::default()),
        };

        pool.init_buffers(header_size)?;
        Ok(pool)
    }

    /// Initializes buffer headers and seeds the free ring, skipping any
    /// candidate block whose payload would straddle a huge-page boundary
    /// (spec §4.2 "Huge-page-boundary skipping").
    fn init_buffers(&self, header_size: usize) -> Result<(), PoolError> {
        let base = self.region.as_ptr() as usize;
        let total_blocks = self.num + self.num_extra;
        let mut accepted = 0usize;
        let mut candidate = 0usize;

        while accepted < self.num && candidate < total_blocks {
            let block_addr = base + candidate * self.block_size;
            // Search forward from `header_size + headroom`, not from
            // `header_size` alone: rounding the payload origin up first and
            // adding `headroom` afterward doesn't land on an `align`
            // boundary unless `headroom` happens to be a multiple of
            // `align` (matches generic.c's `offset = headroom` loop).
            let data_start = align_offset(block_addr, header_size + self.headroom, self.align);
            let payload_origin = data_start - self.headroom;
            let buf_end = data_start + self.seg_len + self.tailroom;

            let straddles = self.buf_type == BufferType::Packet
                && huge_page(block_addr + data_start) != huge_page(block_addr + buf_end - 1);

            if straddles {
                self.stats.record_hp_skip();
                candidate += 1;
                continue;
            }

            let uarea_offset = if self.uarea_size > 0 { Some(accepted * self.uarea_size) } else { None };
            let header = BufferHeader::new(
                self.buf_type,
                self.index,
                uarea_offset,
                payload_origin,
                data_start,
                self.seg_len,
                buf_end,
            );

            unsafe {
                (block_addr as *mut BufferHeader).write(header);
            }

            let committed = self.ring.enqueue_one(candidate as u32);
            debug_assert!(committed, "free ring undersized during pool initialization");

            accepted += 1;
            candidate += 1;
        }

        if accepted < self.num {
            return Err(PoolError::NoMemory);
        }
        Ok(())
    }

    #[inline]
    fn block_addr(&self, index: u32) -> usize {
        self.region.as_ptr() as usize + index as usize * self.block_size
    }

    /// Reference to the buffer header backing `handle`.
    ///
    /// # Safety contract
    /// Valid as long as `handle` is currently owned by the caller (spec §3
    /// Ownership) — the pool does not itself prevent use-after-free of a
    /// handle the caller has already passed to `free`.
    pub fn header(&self, handle: BufferHandle) -> &BufferHeader {
        unsafe { &*(self.block_addr(handle.0) as *const BufferHeader) }
    }

    /// Pointer to the first payload byte (`base_data + data_start`) of `handle`.
    pub fn data_ptr(&self, handle: BufferHandle) -> *mut u8 {
        let header = self.header(handle);
        (self.block_addr(handle.0) + header.segment.data_start) as *mut u8
    }

    /// Pointer to `handle`'s user-metadata area, if the pool was created with one.
    pub fn uarea_ptr(&self, handle: BufferHandle) -> Option<*mut u8> {
        let offset = self.header(handle).uarea_offset?;
        let region = self.uarea_region.as_ref()?;
        Some((region.as_ptr() as usize + offset) as *mut u8)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn buf_type(&self) -> BufferType {
        self.buf_type
    }

    pub fn num(&self) -> usize {
        self.num
    }

    pub fn seg_len(&self) -> usize {
        self.seg_len
    }

    /// Allocates one buffer, refilling the calling thread's cache from the
    /// ring in a `CACHE_BURST` batch on underflow. Returns `None` (the spec's
    /// `INVALID`) when both the cache and ring are exhausted.
    pub fn alloc(&self) -> Option<BufferHandle> {
        let cache = local_cache::thread_cache(&self.ring, &self.stats, &self.caches, self.cache_capacity);
        let idx = cache.alloc()?;
        self.outstanding.fetch_add(1, Ordering::Relaxed);
        self.stats.record_alloc();
        Some(BufferHandle(idx))
    }

    /// Allocates up to `n` buffers, stopping early (returning a shorter
    /// vector) once the pool is exhausted.
    pub fn alloc_multi(&self, n: usize) -> Vec<BufferHandle> {
        let mut out = Vec::with_capacity(n);
        for _ in 0..n {
            match self.alloc() {
                Some(handle) => out.push(handle),
                None => break,
            }
        }
        out
    }

    /// Returns `handle` to the calling thread's cache, spilling to the ring
    /// in a `CACHE_BURST` batch on overflow. Infallible — payload contents
    /// are left untouched (spec §4.2: "zeros nothing by default").
    pub fn free(&self, handle: BufferHandle) {
        let cache = local_cache::thread_cache(&self.ring, &self.stats, &self.caches, self.cache_capacity);
        cache.free(handle.0);
        self.outstanding.fetch_sub(1, Ordering::Relaxed);
        self.stats.record_free();
    }

    pub fn free_multi(&self, handles: &[BufferHandle]) {
        for &handle in handles {
            self.free(handle);
        }
    }

    /// Drains every per-thread cache back to the ring and verifies no
    /// allocation is outstanding. Called by the registry before a pool's
    /// backing memory is released.
    pub(crate) fn prepare_destroy(&self) -> Result<(), PoolError> {
        self.caches.drain_all();
        if self.outstanding.load(Ordering::Relaxed) != 0 {
            return Err(PoolError::InUse);
        }
        Ok(())
    }

    pub fn info(&self) -> PoolInfo {
        PoolInfo {
            name: self.name.clone(),
            buf_type: self.buf_type,
            num: self.num,
            num_extra: self.num_extra,
            seg_len: self.seg_len,
            block_size: self.block_size,
            free_count: self.ring.len() + self.caches.total_cached(),
            stats: self.stats.snapshot(),
        }
    }

    pub fn print(&self) {
        let info = self.info();
        eprintln!(
            "pool '{}' type={:?} num={} num_extra={} seg_len={} block_size={} free={} stats={:?}",
            info.name, info.buf_type, info.num, info.num_extra, info.seg_len, info.block_size, info.free_count, info.stats,
        );
    }
}

/// Smallest offset `>= min_offset` from `block_addr` such that
/// `(block_addr + offset) % align == 0` (spec §4.2 "Alignment"). Callers
/// pass `min_offset = header_size + headroom` so the returned offset is
/// `data_start` itself, already headroom-clear and aligned — not an
/// intermediate "payload origin" that headroom gets added to afterward.
fn align_offset(block_addr: usize, min_offset: usize, align: usize) -> usize {
    let target = block_addr + min_offset;
    round_up(target, align) - block_addr
}
