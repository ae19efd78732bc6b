//! Property-based test mirroring the teacher's bounded-count invariant
//! (`ringmpsc`'s `INV-SEQ-01`, checked against its ring directly) applied
//! here to the pool's own conservation law instead: every buffer is
//! either allocated or sitting in `free_count`, and `free_count` never
//! exceeds `num`.

use pktio_pool::{PoolParams, PoolRegistry};
use proptest::prelude::*;

proptest! {
    #[test]
    fn prop_free_count_conserved(batch_sizes in prop::collection::vec(1usize..40, 1..30)) {
        let registry = PoolRegistry::new();
        let handle = registry.create("prop-pool", PoolParams::raw(256, 64)).unwrap();

        for size in batch_sizes {
            let bufs = registry.alloc_multi(handle, size);
            let info = registry.info(handle).unwrap();
            prop_assert!(info.free_count <= info.num);
            prop_assert_eq!(info.free_count + bufs.len(), info.num);
            registry.free_multi(handle, &bufs);
            prop_assert_eq!(registry.info(handle).unwrap().free_count, info.num);
        }
    }
}
