#![allow(dead_code)]

use demux::prelude::*;

/// Generate a keyed CSV dataset: `key,seq,payload` with keys `k0..k{num_keys}`
///
/// Keys are assigned round-robin so every key sees a similar share of rows.
pub fn generate_keyed_csv(num_rows: usize, num_keys: usize) -> String {
    let mut csv = String::from("key,seq,payload\n");
    for i in 0..num_rows {
        let key = i % num_keys.max(1);
        csv.push_str(&format!("k{},{},{}\n", key, i, i.wrapping_mul(2_654_435_761) % 10_000));
    }
    csv
}

/// Build the same rows as [`generate_keyed_csv`] directly as records
pub fn generate_records(num_rows: usize, num_keys: usize) -> Vec<Record> {
    (0..num_rows)
        .map(|i| {
            let key = format!("k{}", i % num_keys.max(1));
            let seq = i.to_string();
            Record::from_pairs([("key", key.as_str()), ("seq", seq.as_str())])
        })
        .collect()
}

/// Demultiplexer with `fan_out` counting endpoints per key
pub fn counting_demux(
    fan_out: usize,
    high_water_mark: usize,
    remultiplex: bool,
) -> Demultiplexer<Record, u64> {
    Demultiplexer::new(
        move |key: &str, _first: &Record| {
            let endpoints: Vec<Endpoint<Record, u64>> = (0..fan_out)
                .map(|i| {
                    pipelines::reduce(format!("{key}/{i}"), high_water_mark, 0u64, |n, _: Record| {
                        Ok(n + 1)
                    })
                })
                .collect();
            Ok(endpoints)
        },
        Classifier::by_field("key"),
        DemuxOptions::default().with_remultiplex(remultiplex),
    )
}
