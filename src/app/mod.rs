pub mod cli;
pub mod command;
pub mod error;

// Re-export commonly used types
pub use cli::{CliApp, Signal, Writers};
pub use command::{DemuxArgs, VALUE_FLAGS, count_endpoint, run_demux};
pub use error::AppError;
