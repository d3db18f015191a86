use async_trait::async_trait;

use super::capability::Endpoints;
use super::error::EndpointError;

/// Result of handing a chunk to an endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteStatus {
    /// The endpoint can take more chunks right away
    Accepted,
    /// The chunk was taken but the endpoint is at capacity;
    /// the writer should wait for `drained` before the next chunk
    Backpressured,
}

/// Write-capability of a constructed pipeline
#[async_trait]
pub trait Sink<T>: Send {
    /// Name used in diagnostics
    fn name(&self) -> &str {
        "endpoint"
    }

    /// Hand a chunk to the endpoint
    fn write(&mut self, chunk: T) -> Result<WriteStatus, EndpointError>;

    /// Resolve once a previously backpressured endpoint has capacity again
    async fn drained(&mut self);

    /// Signal that no further chunks will be written
    fn end(&mut self);

    /// Resolve once the endpoint has finished all of its work
    async fn completed(&mut self) -> Result<(), EndpointError>;

    /// Terminate immediately, dropping any buffered work
    fn destroy(&mut self);
}

/// Builds the endpoint set for a routing key on its first occurrence
pub trait EndpointFactory<T, O>: Send {
    /// Construct the endpoints for `key`; `chunk` is the first chunk routed to it
    fn construct(&mut self, key: &str, chunk: &T) -> Result<Endpoints<T, O>, EndpointError>;
}

impl<T, O, F, E> EndpointFactory<T, O> for F
where
    F: FnMut(&str, &T) -> Result<E, EndpointError> + Send,
    E: Into<Endpoints<T, O>>,
{
    fn construct(&mut self, key: &str, chunk: &T) -> Result<Endpoints<T, O>, EndpointError> {
        (self)(key, chunk).map(Into::into)
    }
}
