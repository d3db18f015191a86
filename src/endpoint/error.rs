use thiserror::Error;

/// Endpoint-level errors raised by constructed pipelines
///
/// Cloneable so a worker's outcome can be cached and reported more than once.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EndpointError {
    #[error("Endpoint {0} is closed")]
    Closed(String),

    #[error("Endpoint {0} was destroyed")]
    Destroyed(String),

    #[error("Endpoint {0} panicked")]
    Panicked(String),

    #[error("Endpoint {name} failed: {reason}")]
    Failed { name: String, reason: String },

    #[error("Endpoint construction failed: {0}")]
    Construct(String),
}

impl EndpointError {
    /// Wrap any displayable failure raised inside the named endpoint
    pub fn failed(name: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::Failed {
            name: name.into(),
            reason: reason.to_string(),
        }
    }
}
