use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use csv_async::AsyncReaderBuilder;
use futures::io::AsyncRead;
use futures::{Stream, StreamExt, future, stream};
use tokio::fs::File;
use tokio_util::compat::TokioAsyncReadCompatExt;
use tracing::debug;

use super::error::IoError;
use crate::domain::Record;

/// Async stream of records from CSV input
///
/// The first row is the header row; every following row becomes a
/// [`Record`] sharing those headers. Rows whose width differs from the
/// header row are yielded as errors and do not end the stream.
pub struct CsvRecordStream {
    inner: Pin<Box<dyn Stream<Item = Result<Record, IoError>> + Send>>,
}

impl CsvRecordStream {
    /// Create a new record stream from an async reader
    pub fn new<R>(reader: R) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let mut csv_reader = AsyncReaderBuilder::new()
            .trim(csv_async::Trim::All)
            .flexible(true)
            .create_reader(reader);

        let records = stream::once(async move {
            let headers = match csv_reader.headers().await {
                Ok(headers) => Arc::new(headers.iter().map(str::to_owned).collect::<Vec<_>>()),
                Err(e) => return stream::once(future::ready(Err(IoError::from(e)))).left_stream(),
            };
            debug!(columns = headers.len(), "Read CSV header row");

            csv_reader
                .into_records()
                .map(move |row| -> Result<Record, IoError> {
                    let row = row?;
                    let values = row.iter().map(str::to_owned).collect();
                    Ok(Record::new(Arc::clone(&headers), values)?)
                })
                .right_stream()
        })
        .flatten();

        Self {
            inner: Box::pin(records),
        }
    }

    /// Create a new record stream from a file path
    ///
    /// Opens the file asynchronously and handles tokio-futures compatibility
    /// internally.
    ///
    /// # Example
    /// ```rust,ignore
    /// let stream = CsvRecordStream::from_file("events.csv").await?;
    /// ```
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, IoError> {
        let file = File::open(path.as_ref()).await?;
        Ok(Self::new(file.compat()))
    }
}

impl Stream for CsvRecordStream {
    type Item = Result<Record, IoError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}
