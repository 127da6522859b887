//! Benchmarks for offscreen kernel dispatch.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use texel_kernels::gpu::{threadgroups_along, ThreadgroupSize};
use texel_kernels::offscreen::{OffscreenConfig, OffscreenDispatcher};

fn bench_grid_arithmetic(c: &mut Criterion) {
    c.bench_function("threadgroups_along", |b| {
        b.iter(|| {
            for dimension in 1..4096u32 {
                black_box(threadgroups_along(black_box(dimension), 8));
            }
        });
    });
}

fn bench_ray_tracing_dispatch(c: &mut Criterion) {
    let mut group = c.benchmark_group("Ray Tracing Dispatch");

    let dispatcher = match pollster::block_on(OffscreenDispatcher::new(OffscreenConfig::default()))
    {
        Ok(d) => d,
        Err(e) => {
            eprintln!("Skipping GPU benchmarks: {}", e);
            return;
        }
    };

    group.bench_function("dispatch_256", |b| {
        b.iter(|| {
            black_box(dispatcher.dispatch().ok());
        });
    });

    group.finish();
}

fn bench_threadgroup_shapes(c: &mut Criterion) {
    let mut group = c.benchmark_group("Threadgroup Shapes");

    let shapes = [(8, 8), (16, 16), (32, 8)];

    for (width, height) in shapes {
        let Ok(threadgroup) = ThreadgroupSize::new(width, height) else {
            continue;
        };
        let config = OffscreenConfig {
            width: 1024,
            height: 1024,
            threadgroup,
            ..Default::default()
        };

        let dispatcher = match pollster::block_on(OffscreenDispatcher::new(config)) {
            Ok(d) => d,
            Err(_) => continue,
        };

        group.bench_with_input(
            BenchmarkId::new("dispatch_1024", format!("{}x{}", width, height)),
            &dispatcher,
            |b, dispatcher| {
                b.iter(|| {
                    black_box(dispatcher.dispatch().ok());
                });
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_grid_arithmetic,
    bench_ray_tracing_dispatch,
    bench_threadgroup_shapes
);
criterion_main!(benches);
