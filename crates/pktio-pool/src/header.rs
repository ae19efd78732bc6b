use crate::config::BufferType;
use std::sync::atomic::AtomicUsize;

/// A single contiguous segment within a buffer. Core buffers always carry
/// exactly one (spec §3: "segment count (always 1 in this core)").
#[derive(Debug, Clone, Copy)]
pub struct SegmentDescriptor {
    /// Offset of the payload start from the block base.
    pub data_start: usize,
    pub length: usize,
}

/// Fixed-size metadata at the start of every block (spec §3 "Buffer header").
///
/// Invariants upheld by [`crate::Pool`] at init time:
/// - `data_start` is `headroom` bytes or more past `base_data`; the gap
///   absorbs whatever padding alignment needs.
/// - `(block_addr + data_start) % align == 0`, where `block_addr` is the
///   block's own (not necessarily aligned) runtime address.
/// - for packet pools backed by huge pages, `[data_start, data_start + seg_len
///   + tailroom)` never straddles a huge-page boundary.
#[derive(Debug)]
pub struct BufferHeader {
    pub buf_type: BufferType,
    pub event_type: u32,
    pub event_subtype: u32,
    /// Index of the owning pool within its registry.
    pub pool_index: u32,
    /// Offset of this buffer's user area within the pool's user-area region,
    /// or `None` if the pool has no user area.
    pub uarea_offset: Option<usize>,
    pub seg_count: u8,
    pub segment: SegmentDescriptor,
    /// Reserved for future multi-owner use; always 0 in this core (spec §9
    /// "Reference counting" — the field is kept for forward compatibility,
    /// not read or written by any operation specified here).
    pub refcount: AtomicUsize,
    /// Offset of the payload origin (`base_data`) from the block base.
    pub base_data: usize,
    /// Offset one past the end of the block, from the block base.
    pub buf_end: usize,
}

impl BufferHeader {
    pub(crate) fn new(
        buf_type: BufferType,
        pool_index: u32,
        uarea_offset: Option<usize>,
        base_data: usize,
        data_start: usize,
        seg_len: usize,
        buf_end: usize,
    ) -> Self {
        Self {
            buf_type,
            event_type: 0,
            event_subtype: 0,
            pool_index,
            uarea_offset,
            seg_count: 1,
            segment: SegmentDescriptor { data_start, length: seg_len },
            refcount: AtomicUsize::new(0),
            base_data,
            buf_end,
        }
    }
}
