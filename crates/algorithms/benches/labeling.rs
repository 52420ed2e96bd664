//! Benchmarks for the component-labeling hot path

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use humedal_algorithms::components::{
    component_filter, label_components, ComponentFilterParams, Connectivity,
};
use humedal_core::Raster;

/// Deterministic pseudo-random mask (xorshift), ~50% foreground
fn speckled_mask(rows: usize, cols: usize) -> Raster<u8> {
    let mut state = 0x9e3779b97f4a7c15u64;
    let mut values = Vec::with_capacity(rows * cols);
    for _ in 0..rows * cols {
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        values.push((state & 1) as u8);
    }
    Raster::from_vec(values, rows, cols).unwrap()
}

fn bench_labeling(c: &mut Criterion) {
    let mask = speckled_mask(512, 512);

    c.bench_function("label_components 512x512", |b| {
        b.iter(|| label_components(black_box(&mask), 1, Connectivity::Four))
    });

    c.bench_function("component_filter sieve 512x512", |b| {
        b.iter(|| {
            component_filter(
                black_box(&mask),
                &ComponentFilterParams {
                    target: 1,
                    threshold: 10,
                    connectivity: Connectivity::Four,
                    fill_gaps: false,
                },
            )
            .unwrap()
        })
    });
}

criterion_group!(benches, bench_labeling);
criterion_main!(benches);
