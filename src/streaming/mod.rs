pub mod config;
pub mod demux;
pub mod error;
pub mod lifecycle;
pub mod remux;
pub mod session;

// Re-export commonly used types
pub use config::DemuxOptions;
pub use demux::Demultiplexer;
pub use error::{AbortOnError, DemuxError, ErrorPolicy, SilentSkip, SkipErrors};
pub use lifecycle::Lifecycle;
pub use remux::{RemuxStream, Remultiplexer, remultiplexer};
pub use session::{DemuxSession, DestroyHandle, SessionReport};
