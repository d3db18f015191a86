use demux::prelude::*;
use futures::StreamExt;
use tokio::runtime::Builder;

/// Fan-out hotpath profiling
///
/// Profiles routing of 1M records across 1K keys with two endpoints per key.
/// Shows where time goes between classification, lazy endpoint construction,
/// per-endpoint writes and backpressure drains.
///
/// Run with: cargo run --release --bin hotpath_fan_out --features profiling
#[hotpath::main]
fn main() {
    println!("=== Fan-Out Hotpath Profile ===");
    println!("Workload: 1M records across 1K keys, 2 endpoints per key");
    println!("Configuration: 4 worker threads, high water mark 16");
    println!();

    let runtime = Builder::new_multi_thread()
        .worker_threads(4)
        .enable_all()
        .build()
        .unwrap();

    println!("Starting profiled execution...");
    println!();

    let total = runtime.block_on(run_workload(1_000_000, 1_000));

    println!();
    println!("Remultiplexed total: {total}");
    println!("Profiling complete. Results above show function-level breakdown.");
}

#[hotpath::measure]
async fn run_workload(num_records: usize, num_keys: usize) -> u64 {
    let mut demux = Demultiplexer::new(
        |key: &str, _first: &Record| {
            let counter = pipelines::reduce(format!("{key}/count"), 16, 0u64, |n, _: Record| Ok(n + 1));
            let sink = pipelines::for_each(format!("{key}/discard"), 16, |_: Record| Ok(()));
            Ok(vec![counter, sink])
        },
        Classifier::by_field("key"),
        DemuxOptions::default(),
    );
    let output = demux.output().unwrap();
    let collector = tokio::spawn(output.fold(0u64, |acc, n| async move { acc + n }));

    submit_records(&mut demux, num_records, num_keys).await;
    finish(&mut demux).await;

    collector.await.unwrap()
}

#[hotpath::measure]
async fn submit_records(demux: &mut Demultiplexer<Record, u64>, num_records: usize, num_keys: usize) {
    for i in 0..num_records {
        let key = format!("k{}", i % num_keys);
        let seq = i.to_string();
        let record = Record::from_pairs([("key", key.as_str()), ("seq", seq.as_str())]);
        demux.submit(record).await.unwrap();

        if (i + 1) % 100_000 == 0 {
            println!("Routed {} / {} records", i + 1, num_records);
        }
    }
}

#[hotpath::measure]
async fn finish(demux: &mut Demultiplexer<Record, u64>) {
    demux.finish().await.unwrap();
    println!("{} keys, {} endpoints", demux.key_count(), demux.endpoint_count());
}
