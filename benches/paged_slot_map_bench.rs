use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use paged_tables::{Handle, PagedSlotMap};
use slotmap::{DefaultKey, SlotMap};
use std::time::Duration;

fn lcg(mut s: u64) -> impl Iterator<Item = u64> {
    std::iter::from_fn(move || {
        s = s.wrapping_mul(6364136223846793005).wrapping_add(1);
        Some(s)
    })
}

fn bench_insert_fresh_100k(c: &mut Criterion) {
    c.bench_function("paged::insert_fresh_100k", |b| {
        b.iter_batched(
            PagedSlotMap::<u64>::new,
            |mut m| {
                for x in lcg(1).take(100_000) {
                    let _ = m.insert(x).unwrap();
                }
                black_box(m)
            },
            BatchSize::SmallInput,
        )
    });
    c.bench_function("slotmap::insert_fresh_100k", |b| {
        b.iter_batched(
            SlotMap::<DefaultKey, u64>::new,
            |mut m| {
                for x in lcg(1).take(100_000) {
                    let _ = m.insert(x);
                }
                black_box(m)
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_insert_recycled_100k(c: &mut Criterion) {
    c.bench_function("paged::insert_recycled_100k", |b| {
        b.iter_batched(
            || {
                let mut m = PagedSlotMap::<u64>::new();
                let handles: Vec<Handle> =
                    lcg(2).take(100_000).map(|x| m.insert(x).unwrap()).collect();
                for h in handles {
                    m.erase(h);
                }
                m
            },
            |mut m| {
                for x in lcg(3).take(100_000) {
                    let _ = m.insert(x).unwrap();
                }
                black_box(m)
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_lookup_hit(c: &mut Criterion) {
    let mut m = PagedSlotMap::<u64>::new();
    let handles: Vec<Handle> = lcg(7).take(100_000).map(|x| m.insert(x).unwrap()).collect();
    c.bench_function("paged::lookup_hit", |b| {
        let mut i = 0usize;
        b.iter(|| {
            let h = handles[i % handles.len()];
            i = i.wrapping_add(7919);
            black_box(m.lookup(h))
        })
    });

    let mut s = SlotMap::new();
    let keys: Vec<DefaultKey> = lcg(7).take(100_000).map(|x| s.insert(x)).collect();
    c.bench_function("slotmap::lookup_hit", |b| {
        let mut i = 0usize;
        b.iter(|| {
            let k = keys[i % keys.len()];
            i = i.wrapping_add(7919);
            black_box(s.get(k))
        })
    });
}

fn bench_iterate_sparse(c: &mut Criterion) {
    let mut m = PagedSlotMap::<u64>::new();
    let handles: Vec<Handle> = lcg(11).take(100_000).map(|x| m.insert(x).unwrap()).collect();
    for (i, h) in handles.iter().enumerate() {
        if i % 4 != 0 {
            m.erase(*h);
        }
    }
    c.bench_function("paged::iterate_quarter_full", |b| {
        b.iter(|| black_box(m.iter().map(|(_, &v)| v).fold(0u64, u64::wrapping_add)))
    });

    let mut s = SlotMap::new();
    let keys: Vec<DefaultKey> = lcg(11).take(100_000).map(|x| s.insert(x)).collect();
    for (i, k) in keys.iter().enumerate() {
        if i % 4 != 0 {
            s.remove(*k);
        }
    }
    c.bench_function("slotmap::iterate_quarter_full", |b| {
        b.iter(|| black_box(s.values().fold(0u64, |a, &v| a.wrapping_add(v))))
    });
}

fn bench_config() -> Criterion {
    Criterion::default()
        .sample_size(50)
        .measurement_time(Duration::from_secs(8))
        .warm_up_time(Duration::from_secs(2))
}

criterion_group! {
    name = benches;
    config = bench_config();
    targets = bench_insert_fresh_100k,
        bench_insert_recycled_100k,
        bench_lookup_hit,
        bench_iterate_sparse
}
criterion_main!(benches);
