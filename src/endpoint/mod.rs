pub mod channel;
pub mod capability;
pub mod error;
pub mod pipelines;
pub mod traits;

// Re-export commonly used types
pub use channel::{ChannelEndpoint, ChunkReceiver, DEFAULT_HIGH_WATER_MARK};
pub use capability::{Endpoint, Endpoints, Source};
pub use error::EndpointError;
pub use traits::{EndpointFactory, Sink, WriteStatus};
