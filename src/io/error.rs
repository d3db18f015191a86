use std::io;
use thiserror::Error;

use crate::domain::DomainError;

/// IO-level errors for CSV input and per-key output files
#[derive(Error, Debug)]
pub enum IoError {
    #[error("CSV async parsing error: {0}")]
    CsvAsync(#[from] csv_async::Error),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    #[error("Routing key cannot be used as a file name: {0:?}")]
    InvalidKey(String),

    /// Failure reported by a non-CSV input source feeding a session, e.g. a
    /// socket or message queue adapted into a `Stream<Item = Result<T, IoError>>`
    #[error("Upstream error: {0}")]
    Upstream(String),
}
