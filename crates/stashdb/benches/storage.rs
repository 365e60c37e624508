use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use stashdb::{Durability, StashStore};
use tempfile::TempDir;

fn bench_set(c: &mut Criterion) {
    let mut group = c.benchmark_group("set");
    group.sample_size(50);
    group.throughput(Throughput::Elements(1));

    for (name, durability) in [("set_1kb_sync", Durability::Sync), ("set_1kb_nosync", Durability::NoSync)] {
        group.bench_function(name, |b| {
            let dir = TempDir::new().unwrap();
            let db = StashStore::open(dir.path()).unwrap();
            let data = vec![b'x'; 1024];

            let mut counter = 0u64;
            b.iter(|| {
                let key = (counter % 1000).to_le_bytes();
                black_box(db.set(&key, &data, durability).unwrap());
                counter += 1;
            });
        });
    }
    group.finish();
}

fn bench_get(c: &mut Criterion) {
    let mut group = c.benchmark_group("get");
    group.sample_size(50);
    group.throughput(Throughput::Elements(1));

    group.bench_function("get_1kb", |b| {
        let dir = TempDir::new().unwrap();
        let db = StashStore::open(dir.path()).unwrap();
        let data = vec![b'x'; 1024];

        // Pre-populate with 100 keys
        for i in 0..100u64 {
            db.set(&i.to_le_bytes(), &data, Durability::NoSync).unwrap();
        }

        b.iter(|| {
            black_box(db.get(&50u64.to_le_bytes()).unwrap());
        });
    });
    group.finish();
}

fn bench_reopen(c: &mut Criterion) {
    let mut group = c.benchmark_group("reopen");
    group.sample_size(20);

    group.bench_function("replay_10k_records", |b| {
        let dir = TempDir::new().unwrap();
        {
            let db = StashStore::open(dir.path()).unwrap();
            let data = vec![b'x'; 128];
            for i in 0..10_000u64 {
                db.set(&i.to_le_bytes(), &data, Durability::NoSync).unwrap();
            }
            db.close().unwrap();
        }

        b.iter(|| {
            let db = StashStore::open(dir.path()).unwrap();
            black_box(db.len());
        });
    });
    group.finish();
}

criterion_group!(benches, bench_set, bench_get, bench_reopen);
criterion_main!(benches);
