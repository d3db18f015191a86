//! Prelude module for convenient imports
//!
//! Import everything you need with: `use demux::prelude::*;`

// Domain types
pub use crate::domain::{DomainError, KeyField, Record};

// Endpoint types
pub use crate::endpoint::{
    ChannelEndpoint, ChunkReceiver, DEFAULT_HIGH_WATER_MARK, Endpoint, EndpointError,
    EndpointFactory, Endpoints, Sink, Source, WriteStatus, pipelines,
};

// Routing types
pub use crate::routing::{Classifier, KeyStats, RoutingError, RoutingStats, RoutingTable};

// IO types
pub use crate::io::{CsvRecordStream, IoError, KeySummary, split_endpoint, write_summary};

// Streaming types
pub use crate::streaming::{
    AbortOnError, DemuxError, DemuxOptions, DemuxSession, Demultiplexer, DestroyHandle,
    ErrorPolicy, Lifecycle, RemuxStream, SessionReport, SilentSkip, SkipErrors,
};

// App types
pub use crate::app::{AppError, CliApp, DemuxArgs, VALUE_FLAGS, Writers, run_demux};
