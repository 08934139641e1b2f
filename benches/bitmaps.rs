use criterion::{black_box, criterion_group, criterion_main, Criterion};

use bitmap_index::bitmaps::{CompressedBitmap, CompressedBitmapBuilder};
use bitmap_index::iterators::{
    collect, ArcSequence, BitmapSequence, IterationContext, MergeSortSequence,
};
use helpers::bits::random_runs;
use rand::thread_rng;
use std::sync::Arc;

fn criterion_benchmark(c: &mut Criterion) {
    let mut rng = thread_rng();

    const NUM_BITS: usize = 500_000;

    let left_bits = random_runs(&mut rng, NUM_BITS, 200., 80.);
    let right_bits = random_runs(&mut rng, NUM_BITS, 50., 300.);
    let left_bytes = left_bits.to_bytes();
    let left = CompressedBitmap::from_bits(&left_bytes);
    let right = CompressedBitmap::from_bits(&right_bits.to_bytes());

    c.bench_function("compress", |b| {
        b.iter(|| CompressedBitmap::from_bits(black_box(&left_bytes)))
    });

    c.bench_function("and", |b| b.iter(|| left.and(black_box(&right))));
    c.bench_function("or", |b| b.iter(|| left.or(black_box(&right))));

    c.bench_function("builder_set", |b| {
        b.iter(|| {
            let mut builder = CompressedBitmapBuilder::new();
            for offset in (0..100_000u32).step_by(37) {
                builder.set(black_box(offset)).unwrap();
            }
            builder.to_bitmap()
        })
    });

    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .expect("Could not build the runtime");
    let sources: Vec<ArcSequence<u32>> = vec![
        Arc::new(BitmapSequence::new(left.clone())),
        Arc::new(BitmapSequence::new(right.clone())),
    ];
    let merged = MergeSortSequence::new(sources, |&v: &u32| v).take(10_000);

    c.bench_function("merge", |b| {
        b.iter(|| {
            let ctx = IterationContext::default();
            runtime
                .block_on(collect(&merged, &ctx))
                .expect("merge failed")
        })
    });
}

criterion_group! {
    name = benches;
    config = Criterion::default().significance_level(0.1).sample_size(60);
    targets = criterion_benchmark
}
criterion_main!(benches);
