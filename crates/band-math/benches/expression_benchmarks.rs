//! Benchmarks for formula compilation and per-pixel evaluation.
//!
//! Run with: cargo bench --package band-math --bench expression_benchmarks

use band_math::{evaluate_bands, BandMetadata, BandSet, CompiledExpression};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

/// Four bands (R, G, B, NIR) with smooth gradients.
fn generate_band_set(size: usize) -> BandSet {
    let len = size * size;
    let mut bands = vec![vec![0.0f32; len]; 4];
    for y in 0..size {
        for x in 0..size {
            let i = y * size + x;
            let t = (x + y) as f32 / (2 * size) as f32;
            bands[0][i] = 0.05 + 0.2 * t;
            bands[1][i] = 0.1 + 0.1 * t;
            bands[2][i] = 0.08;
            bands[3][i] = 0.3 + 0.4 * (1.0 - t);
        }
    }
    BandSet::new(size, size, bands).expect("band set")
}

fn bench_compile(c: &mut Criterion) {
    let mut group = c.benchmark_group("compile");
    let formulas = [
        ("ndvi", "(nir - red) / (nir + red)"),
        ("evi", "2.5 * ((nir - red) / (nir + 6 * red - 7.5 * blue + 1))"),
        ("msavi", "(2 * nir + 1 - sqrt((2 * nir + 1)^2 - 8 * (nir - red))) / 2"),
    ];
    for (name, formula) in formulas {
        group.bench_with_input(BenchmarkId::from_parameter(name), formula, |b, f| {
            b.iter(|| CompiledExpression::compile(black_box(f)).expect("compile"))
        });
    }
    group.finish();
}

fn bench_evaluate_tile(c: &mut Criterion) {
    let mut group = c.benchmark_group("evaluate_tile");
    let meta = BandMetadata::resolve(4, None);
    let expr = CompiledExpression::compile(
        "(2 * nir + 1 - sqrt((2 * nir + 1)^2 - 8 * (nir - red))) / 2",
    )
    .expect("compile");

    for size in [256usize, 512] {
        let bands = generate_band_set(size);
        group.throughput(Throughput::Elements((size * size) as u64));
        group.bench_with_input(BenchmarkId::new("msavi", size), &bands, |b, bands| {
            b.iter(|| evaluate_bands(&expr, &meta, black_box(bands)).expect("evaluate"))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_compile, bench_evaluate_tile);
criterion_main!(benches);
