use thiserror::Error;

use crate::domain::DomainError;
use crate::endpoint::EndpointError;

/// Routing-level errors for classification and endpoint construction
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RoutingError {
    #[error("Classification failed: {0}")]
    Classify(#[from] DomainError),

    #[error("Could not construct endpoints for key {key}: {source}")]
    Construction {
        key: String,
        #[source]
        source: EndpointError,
    },
}
