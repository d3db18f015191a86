//! Example: Split a CSV file by key
//!
//! Routes every row of a CSV file to `<out_dir>/<key>.csv`, where the key is
//! the value of the given column. Each key's file is opened the first time the
//! key appears. Remultiplexing is disabled: the split files are the only
//! output.
//!
//! Use case: partitioning a mixed event log
//! - One file per event type, tenant or region
//! - Input larger than memory (rows are streamed, not buffered)
//!
//! Usage:
//!   cargo run --example split_by_key -- events.csv type /tmp/split
//!
//! Or create test data:
//!   echo -e "type,id\nclick,1\nview,2\nclick,3" > /tmp/events.csv
//!   cargo run --example split_by_key -- /tmp/events.csv type /tmp/split

use std::env;
use std::path::PathBuf;

use demux::prelude::*;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();
    if args.len() != 4 {
        eprintln!("Usage: {} <input.csv> <column> <out_dir>", args[0]);
        eprintln!();
        eprintln!("Example with test data:");
        eprintln!("  echo -e \"type,id\\nclick,1\\nview,2\\nclick,3\" > /tmp/events.csv");
        eprintln!("  {} /tmp/events.csv type /tmp/split", args[0]);
        std::process::exit(1);
    }

    let column = args[2].clone();
    let out_dir = PathBuf::from(&args[3]);
    tokio::fs::create_dir_all(&out_dir).await?;

    eprintln!("=== Split By Key Example ===");
    eprintln!("Input:  {}", args[1]);
    eprintln!("Column: {column}");
    eprintln!("Output: {}", out_dir.display());
    eprintln!();

    let input = CsvRecordStream::from_file(&args[1]).await?;

    // One split file per key, built from the key's first row
    let dir = out_dir.clone();
    let demux = Demultiplexer::new(
        move |key: &str, first: &Record| {
            split_endpoint(key, &dir, first.headers().to_vec(), DEFAULT_HIGH_WATER_MARK)
        },
        Classifier::by_field(column),
        DemuxOptions::default().with_remultiplex(false),
    );

    let mut session = DemuxSession::new(demux);
    let report = session.run(input).await?;

    eprintln!("Routed {} rows to {} keys", report.chunks_routed, report.keys);
    if report.input_errors + report.routing_errors > 0 {
        eprintln!(
            "Skipped {} unreadable rows and {} unroutable rows",
            report.input_errors, report.routing_errors
        );
    }

    let demux = session.into_demux();
    for stats in demux.stats().snapshot() {
        println!("{}", out_dir.join(format!("{}.csv", stats.key)).display());
        eprintln!("  {}: {} rows", stats.key, stats.routed);
    }

    Ok(())
}
