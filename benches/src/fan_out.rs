mod common;

use criterion::{BatchSize, BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use common::{counting_demux, generate_keyed_csv, generate_records};
use demux::prelude::*;
use futures::StreamExt;
use futures::io::Cursor;
use tokio::runtime::Runtime;

/// Benchmark key cardinality
///
/// Same row count routed to 1, 16, 256 and 4096 keys. Measures the cost of
/// lazy endpoint construction against steady-state routing.
fn bench_key_cardinality(c: &mut Criterion) {
    let mut group = c.benchmark_group("fan_out_key_cardinality");
    let runtime = Runtime::new().unwrap();
    let num_rows = 20_000;
    group.throughput(Throughput::Elements(num_rows as u64));

    for num_keys in [1, 16, 256, 4_096] {
        group.bench_with_input(BenchmarkId::from_parameter(num_keys), &num_keys, |b, &num_keys| {
            b.to_async(&runtime).iter_batched(
                || (counting_demux(1, 64, false), generate_records(num_rows, num_keys)),
                |(mut demux, records)| async move {
                    for record in records {
                        demux.submit(record).await.unwrap();
                    }
                    demux.finish().await.unwrap();
                    black_box(demux.key_count());
                },
                BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

/// Benchmark endpoints per key
///
/// Every chunk is cloned to each endpoint of its key.
fn bench_endpoints_per_key(c: &mut Criterion) {
    let mut group = c.benchmark_group("fan_out_endpoints_per_key");
    let runtime = Runtime::new().unwrap();
    let num_rows = 10_000;
    group.throughput(Throughput::Elements(num_rows as u64));

    for fan_out in [1, 2, 4, 8] {
        group.bench_with_input(BenchmarkId::from_parameter(fan_out), &fan_out, |b, &fan_out| {
            b.to_async(&runtime).iter_batched(
                || (counting_demux(fan_out, 64, false), generate_records(num_rows, 64)),
                |(mut demux, records)| async move {
                    for record in records {
                        demux.submit(record).await.unwrap();
                    }
                    demux.finish().await.unwrap();
                    black_box(demux.endpoint_count());
                },
                BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

/// Benchmark the full CSV path with remultiplexing on and off
fn bench_csv_session(c: &mut Criterion) {
    let mut group = c.benchmark_group("fan_out_csv_session");
    let runtime = Runtime::new().unwrap();
    let num_rows = 20_000;
    group.throughput(Throughput::Elements(num_rows as u64));

    for (name, remultiplex) in [("remux_on", true), ("remux_off", false)] {
        group.bench_function(name, |b| {
            b.to_async(&runtime).iter_batched(
                || generate_keyed_csv(num_rows, 128),
                |csv_data| async move {
                    let input = CsvRecordStream::new(Cursor::new(csv_data));
                    let mut session = DemuxSession::new(counting_demux(1, 64, remultiplex));
                    let output = session.output().unwrap();
                    let (report, counts) =
                        tokio::join!(session.run(input), output.collect::<Vec<u64>>());
                    black_box((report.unwrap(), counts));
                },
                BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_key_cardinality,
    bench_endpoints_per_key,
    bench_csv_session
);
criterion_main!(benches);
