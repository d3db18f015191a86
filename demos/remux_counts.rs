//! Example: Remultiplexed per-key aggregates
//!
//! Routes every row of a CSV file to two duplex endpoints per key: one counts
//! the key's rows, the other tags each row as it passes through. Both
//! endpoints' outputs are merged into the demultiplexer's single output
//! stream, which is printed concurrently with the input.
//!
//! Use case: per-key stateful processing with one merged result stream
//! - Per-customer totals next to a filtered event feed
//! - Per-sensor reductions fanned back into one report
//!
//! Usage:
//!   cargo run --example remux_counts -- events.csv type
//!
//! Or create test data:
//!   echo -e "type,id\nclick,1\nview,2\nclick,3" > /tmp/events.csv
//!   cargo run --example remux_counts -- /tmp/events.csv type

use std::env;

use demux::prelude::*;
use futures::StreamExt;

/// Items merged from every key's endpoints
#[derive(Debug)]
enum Merged {
    Row { key: String, id: String },
    Count { key: String, rows: u64 },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();
    if args.len() != 3 {
        eprintln!("Usage: {} <input.csv> <column>", args[0]);
        eprintln!();
        eprintln!("Example with test data:");
        eprintln!("  echo -e \"type,id\\nclick,1\\nview,2\\nclick,3\" > /tmp/events.csv");
        eprintln!("  {} /tmp/events.csv type", args[0]);
        std::process::exit(1);
    }

    let column = args[2].clone();
    eprintln!("=== Remultiplexed Counts Example ===");
    eprintln!("Topology: input -> classify by {column} -> [tag, count] per key -> merged output");
    eprintln!();

    let input = CsvRecordStream::from_file(&args[1]).await?;

    let demux = Demultiplexer::new(
        |key: &str, _first: &Record| {
            let tag_key = key.to_owned();
            let tag = pipelines::map(format!("{key}/tag"), 8, move |record: Record| {
                let id = record.values().first().cloned().unwrap_or_default();
                Ok(Merged::Row {
                    key: tag_key.clone(),
                    id,
                })
            });
            let count_key = key.to_owned();
            let count = pipelines::reduce(
                format!("{key}/count"),
                8,
                Merged::Count {
                    key: count_key,
                    rows: 0,
                },
                |acc, _: Record| match acc {
                    Merged::Count { key, rows } => Ok(Merged::Count { key, rows: rows + 1 }),
                    other => Ok(other),
                },
            );
            Ok(vec![tag, count])
        },
        Classifier::by_field(column),
        DemuxOptions::default(),
    );

    let mut session = DemuxSession::new(demux);
    let Some(output) = session.output() else {
        return Err("output already taken".into());
    };

    // Print merged items as they arrive rather than after the input ends
    let printer = output.for_each(|item| async move {
        match item {
            Merged::Row { key, id } => println!("row   {key:<12} {id}"),
            Merged::Count { key, rows } => println!("count {key:<12} {rows}"),
        }
    });

    let (report, ()) = tokio::join!(session.run(input), printer);
    let report = report?;

    eprintln!();
    eprintln!(
        "Routed {} rows across {} keys ({} endpoints)",
        report.chunks_routed, report.keys, report.endpoints
    );

    Ok(())
}
