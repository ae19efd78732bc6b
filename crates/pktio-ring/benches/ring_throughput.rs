use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use pktio_ring::{Ring, RingConfig};

fn bench_spsc_roundtrip(c: &mut Criterion) {
    let mut group = c.benchmark_group("ring_spsc");
    group.throughput(Throughput::Elements(1));

    group.bench_function("enqueue_dequeue_one", |b| {
        let ring = Ring::<u64>::init(RingConfig::new(1024));
        b.iter(|| {
            ring.enqueue_one(black_box(1));
            black_box(ring.dequeue_one());
        });
    });

    group.finish();
}

fn bench_batch(c: &mut Criterion) {
    let mut group = c.benchmark_group("ring_batch");
    const BATCH: usize = 64;
    group.throughput(Throughput::Elements(BATCH as u64));

    group.bench_function("enqueue_dequeue_batch", |b| {
        let ring = Ring::<u64>::init(RingConfig::new(1024));
        let items = [7u64; BATCH];
        let mut out = [0u64; BATCH];
        b.iter(|| {
            ring.enqueue_batch(black_box(&items));
            ring.dequeue_batch(black_box(&mut out));
        });
    });

    group.finish();
}

criterion_group!(benches, bench_spsc_roundtrip, bench_batch);
criterion_main!(benches);
