//! Fixed-size packet/raw buffer pool: a cache-friendly allocator with
//! per-thread caches backed by a shared free-index ring, and huge-page-aware
//! layout for packet-typed buffers.
//!
//! ```
//! use pktio_pool::{PoolParams, PoolRegistry};
//!
//! let registry = PoolRegistry::new();
//! let handle = registry.create("pkt-pool", PoolParams::packet(256, 1500)).unwrap();
//! let buf = registry.alloc(handle).unwrap();
//! registry.free(handle, buf);
//! ```

mod config;
mod error;
mod header;
mod local_cache;
mod pool;
mod region;
mod registry;
mod stats;

pub use config::{BufferType, PoolCapability, PoolParams, CACHE_BURST};
pub use error::PoolError;
pub use header::{BufferHeader, SegmentDescriptor};
pub use pool::{BufferHandle, Pool, PoolInfo};
pub use region::Region;
pub use registry::{PoolHandle, PoolRegistry};
pub use stats::PoolStatsSnapshot;
