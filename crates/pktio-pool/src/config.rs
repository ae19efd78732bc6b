pub use pktio_ring::CACHE_BURST;

/// Minimum allowed buffer alignment (bytes), per spec §4.2 "Alignment".
pub const BUFFER_ALIGN_MIN: usize = 8;

/// Maximum allowed buffer alignment (bytes).
pub const BUFFER_ALIGN_MAX: usize = 4096;

/// Cache line size blocks are rounded up to (spec §3 `block_size`).
pub const CACHE_LINE_SIZE: usize = 64;

/// Smallest huge-page size at which packet buffers must not straddle a page
/// boundary (spec §4.2 "Huge-page-boundary skipping").
pub const FIRST_HP_SIZE: u64 = 2 * 1024 * 1024;

/// Maximum number of concurrently reserved pools (spec §4.2 `capability.max_pools`).
pub const MAX_POOLS: usize = 64;

/// What kind of buffer a pool hands out (spec §3 "Buffer pool" `params.type`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferType {
    /// Plain fixed-size scratch buffer, no packet framing.
    Raw,
    /// Packet buffer: headroom/tailroom-aware, huge-page-boundary-safe.
    Packet,
    /// Timeout/event buffer, reuses the same block layout as `Raw`.
    Timeout,
}

/// Parameters requested at pool creation time (spec §4.2 `create(name, params)`).
#[derive(Debug, Clone, Copy)]
pub struct PoolParams {
    pub buf_type: BufferType,
    /// Number of usable buffers (spec's `num`).
    pub num: usize,
    /// Segment payload length in bytes.
    pub seg_len: usize,
    /// Requested alignment; `0` means "use `BUFFER_ALIGN_MIN`".
    pub align: usize,
    /// Headroom reserved before `data_start` (packet pools).
    pub headroom: usize,
    /// Tailroom reserved after the segment payload (packet pools).
    pub tailroom: usize,
    /// Per-buffer user metadata area size, or `0` for none.
    pub uarea_size: usize,
}

impl PoolParams {
    /// A packet pool with the given count and segment length, default headroom.
    pub fn packet(num: usize, seg_len: usize) -> Self {
        Self {
            buf_type: BufferType::Packet,
            num,
            seg_len,
            align: 0,
            headroom: PoolCapability::default().default_headroom,
            tailroom: 0,
            uarea_size: 0,
        }
    }

    /// A raw scratch-buffer pool.
    pub fn raw(num: usize, len: usize) -> Self {
        Self {
            buf_type: BufferType::Raw,
            num,
            seg_len: len,
            align: 0,
            headroom: 0,
            tailroom: 0,
            uarea_size: 0,
        }
    }
}

/// Static limits a pool creation request is validated against (spec §4.2 `capability`).
#[derive(Debug, Clone, Copy)]
pub struct PoolCapability {
    pub max_pools: usize,
    pub max_num: usize,
    pub max_len: usize,
    pub max_headroom: usize,
    pub max_tailroom: usize,
    pub max_segs_per_pkt: usize,
    pub max_uarea_size: usize,
    pub default_headroom: usize,
}

impl Default for PoolCapability {
    fn default() -> Self {
        Self {
            max_pools: MAX_POOLS,
            max_num: 1 << 20,
            max_len: 64 * 1024,
            max_headroom: 256,
            max_tailroom: 256,
            max_segs_per_pkt: 1,
            max_uarea_size: 4096,
            default_headroom: 128,
        }
    }
}

#[inline]
pub(crate) const fn round_up(value: usize, multiple: usize) -> usize {
    (value + multiple - 1) & !(multiple - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_up_cache_line() {
        assert_eq!(round_up(1, CACHE_LINE_SIZE), CACHE_LINE_SIZE);
        assert_eq!(round_up(CACHE_LINE_SIZE, CACHE_LINE_SIZE), CACHE_LINE_SIZE);
        assert_eq!(round_up(CACHE_LINE_SIZE + 1, CACHE_LINE_SIZE), 2 * CACHE_LINE_SIZE);
    }
}
