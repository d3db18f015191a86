pub mod csv_reader;
pub mod csv_writer;
pub mod error;

// Re-export commonly used types
pub use csv_reader::CsvRecordStream;
pub use csv_writer::{KeySummary, split_endpoint, split_file_name, write_summary};
pub use error::IoError;
