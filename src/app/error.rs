use std::io;
use thiserror::Error;

use crate::io::IoError;
use crate::streaming::DemuxError;

/// Top-level application errors unifying all layer errors
#[derive(Error, Debug)]
pub enum AppError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("CSV IO error: {0}")]
    CsvIo(#[from] IoError),

    #[error("Demultiplexer error: {0}")]
    Demux(#[from] DemuxError),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::streaming::Lifecycle;

    #[test]
    fn error_display_formats_correctly() {
        assert_eq!(
            AppError::FileNotFound("input.csv".to_string()).to_string(),
            "File not found: input.csv"
        );
        assert_eq!(
            AppError::InvalidArguments("missing file".to_string()).to_string(),
            "Invalid arguments: missing file"
        );
    }

    #[test]
    fn io_error_conversion() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let app_err = AppError::from(io_err);

        match app_err {
            AppError::Io(_) => {}
            _ => panic!("Expected Io error variant"),
        }
    }

    #[test]
    fn demux_error_conversion() {
        let demux_err = DemuxError::NotAccepting(Lifecycle::Destroyed);
        let app_err = AppError::from(demux_err);

        match app_err {
            AppError::Demux(DemuxError::NotAccepting(Lifecycle::Destroyed)) => {}
            _ => panic!("Expected Demux error variant"),
        }
    }
}
