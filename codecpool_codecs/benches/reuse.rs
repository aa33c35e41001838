use std::io::Write;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use codecpool_codecs::{GzipCompressor, ZstdCompressor, FLATE_BEST};
use codecpool_core::{Compressor, WriterPool};

fn payload(len: usize) -> Vec<u8> {
    let pattern = b"{\"user\":42,\"event\":\"click\",\"path\":\"/index.html\"}\n";
    (0..len).map(|i| pattern[i % pattern.len()]).collect()
}

fn compress_pooled<C: Compressor>(pool: &WriterPool<C>, data: &[u8]) -> Vec<u8> {
    let mut w = pool.acquire_writer(Vec::with_capacity(data.len())).unwrap();
    w.write_all(data).unwrap();
    pool.release_writer(w).unwrap()
}

/// No pool: every stream pays full construction.
fn compress_fresh<C: Compressor>(level: C::Level, data: &[u8]) -> Vec<u8> {
    let mut w = C::new(level).unwrap().bind(Vec::with_capacity(data.len()));
    w.write_all(data).unwrap();
    C::finish(w).unwrap().1
}

/// Small messages are where construction cost dominates.
fn bench_gzip(c: &mut Criterion) {
    let mut group = c.benchmark_group("gzip_writer");
    let pool = WriterPool::<GzipCompressor>::best();

    for size in [256usize, 4 * 1024, 64 * 1024] {
        let data = payload(size);
        group.throughput(Throughput::Bytes(size as u64));

        group.bench_with_input(BenchmarkId::new("pooled", size), &data, |b, data| {
            b.iter(|| black_box(compress_pooled(&pool, data)))
        });
        group.bench_with_input(BenchmarkId::new("fresh", size), &data, |b, data| {
            b.iter(|| black_box(compress_fresh::<GzipCompressor>(FLATE_BEST, data)))
        });
    }

    group.finish();
}

fn bench_zstd(c: &mut Criterion) {
    let mut group = c.benchmark_group("zstd_writer");
    let pool = WriterPool::<ZstdCompressor>::new(3).unwrap();
    let data = payload(1024);
    group.throughput(Throughput::Bytes(data.len() as u64));

    group.bench_function("pooled", |b| b.iter(|| black_box(compress_pooled(&pool, &data))));
    group.bench_function("fresh", |b| {
        b.iter(|| black_box(compress_fresh::<ZstdCompressor>(3, &data)))
    });

    group.finish();
}

criterion_group!(benches, bench_gzip, bench_zstd);
criterion_main!(benches);
