//! Benchmarks for contour line and filled band generation.
//!
//! Run with: cargo bench --package contour-engine --bench contour_benchmarks

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::Rng;
use contour_engine::{
    Algorithm, ChunkSpec, ContourGenerator, ContourGrid, FillLayout, GeneratorConfig, LineLayout,
};
use test_utils::{create_gaussian_hills, create_scattered_mask, create_wave_grid, Hill};

/// Smooth periodic field with many closed contours and saddles.
fn wave_grid(n: usize) -> ContourGrid {
    ContourGrid::from_z(n, n, create_wave_grid(n, n, 4.0), None).unwrap()
}

/// Wave field with random noise (many more, shorter contours).
fn noisy_grid(n: usize) -> ContourGrid {
    let mut rng = rand::thread_rng();
    let z = create_wave_grid(n, n, 4.0)
        .into_iter()
        .map(|v| v + rng.gen_range(-0.2..0.2))
        .collect();
    ContourGrid::from_z(n, n, z, None).unwrap()
}

/// A few broad hills with scattered masked nodes.
fn masked_hills_grid(n: usize) -> ContourGrid {
    let c = n as f64;
    let hills = [
        Hill {
            cx: 0.3 * c,
            cy: 0.3 * c,
            amplitude: 1.0,
            sigma: 0.15 * c,
        },
        Hill {
            cx: 0.7 * c,
            cy: 0.6 * c,
            amplitude: -0.8,
            sigma: 0.2 * c,
        },
    ];
    let z = create_gaussian_hills(n, n, &hills);
    let mask = create_scattered_mask(n, n, 50, 7);
    ContourGrid::from_z(n, n, z, Some(mask)).unwrap()
}

fn generator(grid: ContourGrid, config: GeneratorConfig) -> ContourGenerator {
    ContourGenerator::new(grid, config).unwrap()
}

// =============================================================================
// LINE BENCHMARKS
// =============================================================================

fn bench_lines(c: &mut Criterion) {
    let mut group = c.benchmark_group("lines");

    for size in [64, 256, 512] {
        let gen = generator(wave_grid(size), GeneratorConfig::default());
        group.throughput(Throughput::Elements((size * size) as u64));
        group.bench_with_input(BenchmarkId::new("wave", size), &gen, |b, gen| {
            b.iter(|| gen.lines(black_box(0.25)).unwrap());
        });
    }

    let gen = generator(noisy_grid(256), GeneratorConfig::default());
    group.bench_function("noisy_256", |b| {
        b.iter(|| gen.lines(black_box(0.0)).unwrap());
    });

    let gen = generator(masked_hills_grid(256), GeneratorConfig::default());
    group.bench_function("masked_hills_256", |b| {
        b.iter(|| gen.lines(black_box(0.5)).unwrap());
    });

    group.finish();
}

fn bench_line_options(c: &mut Criterion) {
    let mut group = c.benchmark_group("line_options");
    let size = 256;

    let variants: [(&str, fn(&mut GeneratorConfig)); 4] = [
        ("default", |_| {}),
        ("quad_as_tri", |c| c.quad_as_tri = true),
        ("corner_mask", |c| c.corner_mask = true),
        ("with_codes", |c| c.line_layout = LineLayout::SeparateWithCodes),
    ];
    for (name, apply) in variants {
        let mut config = GeneratorConfig::default();
        apply(&mut config);
        let gen = generator(masked_hills_grid(size), config);
        group.bench_function(name, |b| {
            b.iter(|| gen.lines(black_box(0.5)).unwrap());
        });
    }

    group.finish();
}

// =============================================================================
// FILLED BENCHMARKS
// =============================================================================

fn bench_filled(c: &mut Criterion) {
    let mut group = c.benchmark_group("filled");
    group.sample_size(20); // Slower benchmark

    for size in [64, 256] {
        let gen = generator(wave_grid(size), GeneratorConfig::default());
        group.throughput(Throughput::Elements((size * size) as u64));
        group.bench_with_input(BenchmarkId::new("wave", size), &gen, |b, gen| {
            b.iter(|| gen.filled(black_box(Some(-0.25)), black_box(Some(0.25))).unwrap());
        });
    }

    let gen = generator(masked_hills_grid(256), GeneratorConfig::default());
    group.bench_function("masked_hills_multi", |b| {
        let levels = [-0.6, -0.3, 0.0, 0.3, 0.6, 0.9];
        b.iter(|| gen.multi_filled(black_box(&levels)).unwrap());
    });

    group.finish();
}

// =============================================================================
// CHUNKING AND THREADING BENCHMARKS
// =============================================================================

fn bench_chunk_sizes(c: &mut Criterion) {
    let mut group = c.benchmark_group("chunk_size");
    group.sample_size(20);
    let size = 512;

    for chunk in [16, 64, 128, 511] {
        let mut config = GeneratorConfig::default();
        config.chunking = ChunkSpec::Size {
            nx: chunk,
            ny: chunk,
        };
        let gen = generator(wave_grid(size), config);
        group.bench_with_input(BenchmarkId::new("lines", chunk), &gen, |b, gen| {
            b.iter(|| gen.lines(black_box(0.25)).unwrap());
        });
    }

    group.finish();
}

fn bench_serial_vs_threaded(c: &mut Criterion) {
    let mut group = c.benchmark_group("serial_vs_threaded");
    group.sample_size(20);
    let size = 512;

    let mut serial = GeneratorConfig::default();
    serial.chunking = ChunkSpec::Count { nx: 4, ny: 4 };
    let serial = generator(wave_grid(size), serial);
    group.bench_function("serial_lines", |b| {
        b.iter(|| gen_lines(&serial));
    });

    for threads in [2, 4, 8] {
        let mut config = GeneratorConfig::for_algorithm(Algorithm::Threaded);
        config.chunking = ChunkSpec::Count { nx: 4, ny: 4 };
        config.thread_count = threads;
        let gen = generator(wave_grid(size), config);
        group.bench_with_input(BenchmarkId::new("threaded_lines", threads), &gen, |b, gen| {
            b.iter(|| gen_lines(gen));
        });
    }

    let mut config = GeneratorConfig::for_algorithm(Algorithm::Threaded);
    config.chunking = ChunkSpec::Count { nx: 4, ny: 4 };
    config.fill_layout = FillLayout::ChunkCombined;
    let gen = generator(wave_grid(size), config);
    group.bench_function("threaded_filled_chunk_combined", |b| {
        b.iter(|| gen.filled(black_box(Some(0.0)), black_box(Some(0.5))).unwrap());
    });

    group.finish();
}

fn gen_lines(gen: &ContourGenerator) -> usize {
    gen.lines(black_box(0.25)).unwrap().line_count()
}

criterion_group!(
    benches,
    bench_lines,
    bench_line_options,
    bench_filled,
    bench_chunk_sizes,
    bench_serial_vs_threaded,
);

criterion_main!(benches);
