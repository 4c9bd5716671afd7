//! Benchmarks for overlay rendering and PNG encoding.
//!
//! Run with: cargo bench --package renderer --bench render_benchmarks

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use flux_raster::DecodedRaster;
use renderer::{map_to_color, png, OverlayRenderer, Resampling};
use solar_common::{GeoBounds, LatLng, Viewport};
use test_utils::{create_flux_grid, create_masked_flux_grid};

const ANCHOR: LatLng = LatLng { lat: 27.95, lng: -82.46 };

// =============================================================================
// COLOR MAPPING BENCHMARKS
// =============================================================================

fn bench_map_to_color(c: &mut Criterion) {
    let values: Vec<f32> = (0..10_000).map(|i| i as f32 / 10_000.0).collect();

    let mut group = c.benchmark_group("map_to_color");
    group.throughput(Throughput::Elements(values.len() as u64));
    group.bench_function("default_gradient", |b| {
        b.iter(|| values.iter().map(|v| map_to_color(black_box(*v)).a as u32).sum::<u32>());
    });
    group.finish();
}

// =============================================================================
// RENDER OVERLAY BENCHMARKS
// =============================================================================

fn bench_render_overlay(c: &mut Criterion) {
    let mut group = c.benchmark_group("render_overlay");

    // Annual flux rasters are 0.1 m/px; a house lot is a few hundred pixels across
    let scenarios = [
        (200, 200, 800, 800, "house_to_default_viewport"),
        (600, 400, 800, 800, "large_lot"),
        (1000, 1000, 400, 400, "downscale"),
    ];
    let bounds = GeoBounds::around(ANCHOR, 0.0005);

    for (src_w, src_h, dst_w, dst_h, name) in scenarios {
        let raster = DecodedRaster::new(src_w, src_h, create_masked_flux_grid(src_w, src_h, 10), None).unwrap();
        let viewport = Viewport::new(dst_w, dst_h);

        group.throughput(Throughput::Elements(viewport.pixel_count() as u64));
        for resampling in [Resampling::Nearest, Resampling::Bilinear] {
            let renderer = OverlayRenderer::new(Default::default(), resampling);
            group.bench_with_input(
                BenchmarkId::new(name, format!("{:?}", resampling)),
                &raster,
                |b, raster| {
                    b.iter(|| renderer.render(black_box(raster), bounds, ANCHOR, viewport).unwrap());
                },
            );
        }
    }

    group.finish();
}

// =============================================================================
// PNG ENCODING BENCHMARKS
// =============================================================================

fn bench_png_encoding(c: &mut Criterion) {
    let mut group = c.benchmark_group("png_encoding");

    let raster = DecodedRaster::new(200, 200, create_flux_grid(200, 200), None).unwrap();
    let renderer = OverlayRenderer::default();

    for size in [400u32, 800] {
        let pixels = renderer.render_pixels(&raster, Viewport::new(size, size));
        group.throughput(Throughput::Bytes(pixels.len() as u64));

        group.bench_with_input(BenchmarkId::new("auto", size), &pixels, |b, pixels| {
            b.iter(|| png::create_png_auto(black_box(pixels), size as usize, size as usize).unwrap());
        });
        group.bench_with_input(BenchmarkId::new("rgba", size), &pixels, |b, pixels| {
            b.iter(|| png::create_png(black_box(pixels), size as usize, size as usize).unwrap());
        });
    }

    group.finish();
}

criterion_group!(benches, bench_map_to_color, bench_render_overlay, bench_png_encoding);
criterion_main!(benches);
