//! Benchmarks for colormap rendering and tile encoding.
//!
//! Run with: cargo bench --package renderer --bench render_benchmarks

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::Rng;
use renderer::colormap::{get_colormap, percentile_bounds, Lut};
use renderer::encode::{encode, ImageFormat};
use renderer::gradient;

/// NDVI-like values in [-0.2, 0.9] with a little noise.
fn generate_index_grid(width: usize, height: usize) -> Vec<f32> {
    let mut rng = rand::thread_rng();
    let mut data = vec![0.0f32; width * height];
    for y in 0..height {
        for x in 0..width {
            let base = (x + y) as f32 / (width + height) as f32 * 1.1 - 0.2;
            data[y * width + x] = base + rng.gen_range(-0.02..0.02);
        }
    }
    data
}

fn bench_percentile(c: &mut Criterion) {
    let mut group = c.benchmark_group("percentile_bounds");
    for size in [256usize, 512, 1024] {
        let data = generate_index_grid(size, size);
        group.throughput(Throughput::Elements((size * size) as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &data, |b, data| {
            b.iter(|| percentile_bounds(black_box(data), 2.0, 98.0))
        });
    }
    group.finish();
}

fn bench_render_lut(c: &mut Criterion) {
    let mut group = c.benchmark_group("render_with_lut");
    let lut = Lut::build(get_colormap("RdYlGn").expect("colormap"), 257);

    for size in [256usize, 512, 1024] {
        let data = generate_index_grid(size, size);
        group.throughput(Throughput::Elements((size * size) as u64));
        group.bench_with_input(BenchmarkId::new("RdYlGn", size), &data, |b, data| {
            b.iter(|| gradient::render_with_lut(black_box(data), size, size, -0.2, 0.9, &lut))
        });
    }
    group.finish();
}

fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode");
    let lut = Lut::build(get_colormap("viridis").expect("colormap"), 257);
    let size = 256;
    let data = generate_index_grid(size, size);
    let pixels = gradient::render_with_lut(&data, size, size, -0.2, 0.9, &lut);

    for format in [ImageFormat::Png, ImageFormat::Jpeg, ImageFormat::Webp] {
        group.bench_with_input(
            BenchmarkId::new("256x256", format.extension()),
            &pixels,
            |b, pixels| b.iter(|| encode(black_box(pixels), size, size, format, 90)),
        );
    }
    group.finish();
}

criterion_group!(benches, bench_percentile, bench_render_lut, bench_encode);
criterion_main!(benches);
