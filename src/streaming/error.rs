use std::time::Duration;

use thiserror::Error;
use tracing::{error, warn};

use super::lifecycle::Lifecycle;
use crate::endpoint::EndpointError;
use crate::io::IoError;
use crate::routing::RoutingError;

/// Errors surfaced by the demultiplexer and its session driver
#[derive(Error, Debug)]
pub enum DemuxError {
    #[error("Routing error: {0}")]
    Routing(#[from] RoutingError),

    #[error("Endpoint error on key {key}: {source}")]
    Endpoint {
        key: String,
        #[source]
        source: EndpointError,
    },

    #[error("Input error: {0}")]
    Input(#[from] IoError),

    #[error("Demultiplexer is {0} and no longer accepts this operation")]
    NotAccepting(Lifecycle),

    #[error("Endpoints did not complete within {0:?}")]
    FlushTimeout(Duration),

    #[error("Cancelled: {0}")]
    Cancelled(String),
}

/// Policy for handling errors while routing a stream
///
/// Each method returns true to continue processing, false to abort.
/// Continuing past an endpoint error isolates that endpoint: it receives no
/// further chunks and its completion result is ignored.
pub trait ErrorPolicy: Send + Sync {
    /// Handle an error item from the input stream
    fn handle_input_error(&self, error: &IoError) -> bool;

    /// Handle a classification or construction failure for one chunk
    fn handle_routing_error(&self, error: &RoutingError) -> bool;

    /// Handle a runtime failure of one endpoint
    fn handle_endpoint_error(&self, key: &str, error: &EndpointError) -> bool;
}

/// Skip errors and continue processing, isolating failed endpoints (logs a warning)
#[derive(Debug, Clone, Copy, Default)]
pub struct SkipErrors;

impl ErrorPolicy for SkipErrors {
    fn handle_input_error(&self, error: &IoError) -> bool {
        warn!(error = %error, "Input error (skipping)");
        true
    }

    fn handle_routing_error(&self, error: &RoutingError) -> bool {
        warn!(error = %error, "Routing error (skipping chunk)");
        true
    }

    fn handle_endpoint_error(&self, key: &str, error: &EndpointError) -> bool {
        warn!(key, error = %error, "Endpoint error (isolating endpoint)");
        true
    }
}

/// Abort on first error
#[derive(Debug, Clone, Copy, Default)]
pub struct AbortOnError;

impl ErrorPolicy for AbortOnError {
    fn handle_input_error(&self, error: &IoError) -> bool {
        error!(error = %error, "Input error (aborting)");
        false
    }

    fn handle_routing_error(&self, error: &RoutingError) -> bool {
        error!(error = %error, "Routing error (aborting)");
        false
    }

    fn handle_endpoint_error(&self, key: &str, error: &EndpointError) -> bool {
        error!(key, error = %error, "Endpoint error (aborting)");
        false
    }
}

/// Silent error policy - skip errors without logging
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentSkip;

impl ErrorPolicy for SilentSkip {
    fn handle_input_error(&self, _error: &IoError) -> bool {
        true
    }

    fn handle_routing_error(&self, _error: &RoutingError) -> bool {
        true
    }

    fn handle_endpoint_error(&self, _key: &str, _error: &EndpointError) -> bool {
        true
    }
}
