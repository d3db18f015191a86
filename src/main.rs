use demux::prelude::*;

fn main() {
    CliApp::new("demux")
        .with_value_flags(VALUE_FLAGS)
        .with_args(DemuxArgs::parse)
        .run(run_cli);
}

/// Route the input by key and write the per-key summary to stdout
async fn run_cli(
    mut writers: Writers,
    args: DemuxArgs,
    handle: DestroyHandle,
) -> Result<(), AppError> {
    // Single input, one counting (or splitting) endpoint per key.
    // For building topologies by hand, see:
    //   - demos/split_by_key.rs (write-only endpoints, remultiplexing off)
    //   - demos/remux_counts.rs (duplex endpoints merged into one output)
    let report = run_demux(&args, &mut writers.stdout, handle).await?;
    if report.cancelled {
        return Err(AppError::Demux(DemuxError::Cancelled(
            "input not fully routed".to_string(),
        )));
    }
    Ok(())
}
