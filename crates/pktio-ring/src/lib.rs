//! Bounded power-of-two index ring.
//!
//! The leaf dependency of the packet I/O stack (spec §4.1): a fixed-capacity,
//! multi-producer/multi-consumer-safe ring of indices. [`pktio-pool`] backs
//! its per-pool free list with one; the device table's queued/scheduled input
//! and output modes reuse the same type for their internal event queues.
//!
//! # Example
//!
//! ```
//! use pktio_ring::{Ring, RingConfig};
//!
//! let ring = Ring::<u32>::init(RingConfig::new(8));
//! assert!(ring.enqueue_one(42));
//! assert_eq!(ring.dequeue_one(), Some(42));
//! ```

mod backoff;
mod config;
mod invariants;
mod ring;

pub use backoff::Backoff;
pub use config::{RingConfig, CACHE_BURST};
pub use ring::Ring;
