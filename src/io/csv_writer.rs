use std::path::Path;

use csv_async::{AsyncSerializer, AsyncWriter};
use serde::Serialize;
use tokio::fs::File;
use tokio::io::AsyncWrite;
use tokio::sync::mpsc;
use tokio_util::compat::TokioAsyncWriteCompatExt;
use tracing::debug;

use super::error::IoError;
use crate::domain::Record;
use crate::endpoint::{ChannelEndpoint, ChunkReceiver, Endpoint, EndpointError, pipelines};

/// Row count for one routing key
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeySummary {
    pub key: String,
    pub rows: u64,
}

/// Write key summaries as CSV (`key,rows`), in the order given
///
/// Nothing is written for an empty slice.
pub async fn write_summary<W>(rows: &[KeySummary], writer: W) -> Result<(), IoError>
where
    W: AsyncWrite + Unpin + Send,
{
    let mut serializer = AsyncSerializer::from_writer(writer.compat_write());
    for row in rows {
        serializer.serialize(row).await?;
    }
    serializer.flush().await?;
    Ok(())
}

/// File name for a key's split file, rejecting keys that would escape the directory
pub fn split_file_name(key: &str) -> Result<String, IoError> {
    let unsafe_name = key.is_empty()
        || key == "."
        || key == ".."
        || key.contains(['/', '\\', '\0']);
    if unsafe_name {
        return Err(IoError::InvalidKey(key.to_owned()));
    }
    Ok(format!("{key}.csv"))
}

/// Endpoint that writes every record of `key` to `<dir>/<key>.csv`
///
/// The header row comes from `headers`, normally the first record's. Once the
/// input ends the file is flushed and the endpoint emits the row count.
pub fn split_endpoint(
    key: &str,
    dir: &Path,
    headers: Vec<String>,
    high_water_mark: usize,
) -> Result<Endpoint<Record, KeySummary>, EndpointError> {
    let file_name = split_file_name(key).map_err(|e| EndpointError::Construct(e.to_string()))?;
    let path = dir.join(file_name);
    let name = format!("{key}/split");
    let worker_name = name.clone();
    let key = key.to_owned();

    let (out_tx, out_rx) = mpsc::channel(1);
    let sink = ChannelEndpoint::spawn(name, high_water_mark, move |mut input| async move {
        let rows = write_rows(&path, &headers, &mut input)
            .await
            .map_err(|e| EndpointError::failed(&worker_name, e))?;
        let _ = out_tx.send(KeySummary { key, rows }).await;
        Ok(())
    });
    Ok(Endpoint::duplex(sink, pipelines::receiver_stream(out_rx)))
}

async fn write_rows(
    path: &Path,
    headers: &[String],
    input: &mut ChunkReceiver<Record>,
) -> Result<u64, IoError> {
    let file = File::create(path).await?;
    let mut writer = AsyncWriter::from_writer(file.compat_write());
    writer.write_record(headers).await?;

    let mut rows = 0u64;
    while let Some(record) = input.recv().await {
        writer.write_record(record.values()).await?;
        rows += 1;
    }
    writer.flush().await?;
    debug!(path = %path.display(), rows, "Split file written");
    Ok(rows)
}
