mod common;

use criterion::{BatchSize, BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use common::{counting_demux, generate_records};
use tokio::runtime::Runtime;

/// Benchmark high water mark sizing
///
/// A high water mark of 1 makes nearly every submission wait for a drain;
/// larger marks let the worker batch through its queue.
fn bench_high_water_mark(c: &mut Criterion) {
    let mut group = c.benchmark_group("backpressure_high_water_mark");
    let runtime = Runtime::new().unwrap();
    let num_rows = 10_000;
    group.throughput(Throughput::Elements(num_rows as u64));

    for high_water_mark in [1, 4, 16, 256] {
        group.bench_with_input(
            BenchmarkId::from_parameter(high_water_mark),
            &high_water_mark,
            |b, &high_water_mark| {
                b.to_async(&runtime).iter_batched(
                    || (counting_demux(2, high_water_mark, false), generate_records(num_rows, 8)),
                    |(mut demux, records)| async move {
                        for record in records {
                            demux.submit(record).await.unwrap();
                        }
                        demux.finish().await.unwrap();
                        black_box(demux.stats().total_routed());
                    },
                    BatchSize::SmallInput,
                );
            },
        );
    }

    group.finish();
}

/// Benchmark single-threaded vs multi-threaded runtimes under backpressure
fn bench_runtime_flavor(c: &mut Criterion) {
    let mut group = c.benchmark_group("backpressure_runtime_flavor");
    let num_rows = 10_000;
    group.throughput(Throughput::Elements(num_rows as u64));

    let runtimes = [
        (
            "current_thread",
            tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap(),
        ),
        ("multi_thread", Runtime::new().unwrap()),
    ];

    for (name, runtime) in &runtimes {
        group.bench_function(*name, |b| {
            b.to_async(runtime).iter_batched(
                || (counting_demux(4, 4, false), generate_records(num_rows, 16)),
                |(mut demux, records)| async move {
                    for record in records {
                        demux.submit(record).await.unwrap();
                    }
                    demux.finish().await.unwrap();
                },
                BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

criterion_group!(benches, bench_high_water_mark, bench_runtime_flavor);
criterion_main!(benches);
