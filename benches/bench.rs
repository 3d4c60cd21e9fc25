// Criterion benchmarks for Facefind engine math

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use facefind::engine::attribute::softmax;
use facefind::engine::embedder::cosine_distance;
use facefind::engine::FaceEmbedding;

fn make_embedding(seed: f32, dim: usize) -> FaceEmbedding {
    let values: Vec<f32> = (0..dim).map(|i| ((i as f32) * seed).sin()).collect();
    FaceEmbedding::new(values)
}

fn bench_cosine_distance(c: &mut Criterion) {
    let mut group = c.benchmark_group("cosine_distance");

    for dim in [128usize, 512] {
        let a = make_embedding(0.31, dim);
        let b = make_embedding(0.73, dim);

        group.bench_with_input(BenchmarkId::from_parameter(dim), &dim, |bencher, _| {
            bencher.iter(|| cosine_distance(black_box(&a), black_box(&b)));
        });
    }

    group.finish();
}

fn bench_softmax(c: &mut Criterion) {
    let logits: Vec<f32> = (0..8).map(|i| (i as f32) * 0.4 - 1.5).collect();

    c.bench_function("softmax_8", |bencher| {
        bencher.iter(|| softmax(black_box(&logits)));
    });
}

criterion_group!(benches, bench_cosine_distance, bench_softmax);
criterion_main!(benches);
