use futures::stream::BoxStream;
use futures::{Stream, StreamExt};

use super::traits::Sink;

/// Read-capability of a constructed pipeline
pub type Source<O> = BoxStream<'static, O>;

/// A constructed pipeline: a sink plus, optionally, the stream it produces
///
/// The capability is fixed at construction and checked once when the
/// endpoint is registered for a key.
pub struct Endpoint<T, O> {
    sink: Box<dyn Sink<T>>,
    source: Option<Source<O>>,
    readable: bool,
    failed: bool,
}

impl<T, O> Endpoint<T, O> {
    /// An endpoint that only consumes chunks
    pub fn write_only<S>(sink: S) -> Self
    where
        S: Sink<T> + 'static,
    {
        Self {
            sink: Box::new(sink),
            source: None,
            readable: false,
            failed: false,
        }
    }

    /// An endpoint that consumes chunks and produces its own output stream
    pub fn duplex<S, St>(sink: S, source: St) -> Self
    where
        S: Sink<T> + 'static,
        St: Stream<Item = O> + Send + 'static,
    {
        Self {
            sink: Box::new(sink),
            source: Some(source.boxed()),
            readable: true,
            failed: false,
        }
    }

    pub fn name(&self) -> &str {
        self.sink.name()
    }

    /// Whether the endpoint was built with a read-capability
    pub fn is_readable(&self) -> bool {
        self.readable
    }

    /// Whether the endpoint has been isolated after a runtime error
    pub fn is_failed(&self) -> bool {
        self.failed
    }

    pub(crate) fn mark_failed(&mut self) {
        self.failed = true;
    }

    pub(crate) fn take_source(&mut self) -> Option<Source<O>> {
        self.source.take()
    }

    pub(crate) fn sink_mut(&mut self) -> &mut dyn Sink<T> {
        self.sink.as_mut()
    }
}

impl<T, O> std::fmt::Debug for Endpoint<T, O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Endpoint")
            .field("name", &self.name())
            .field("readable", &self.readable)
            .field("failed", &self.failed)
            .finish()
    }
}

/// The normalized result of an endpoint factory
///
/// A single endpoint converts into a one-element set.
pub struct Endpoints<T, O>(Vec<Endpoint<T, O>>);

impl<T, O> Endpoints<T, O> {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_vec(self) -> Vec<Endpoint<T, O>> {
        self.0
    }
}

impl<T, O> From<Endpoint<T, O>> for Endpoints<T, O> {
    fn from(endpoint: Endpoint<T, O>) -> Self {
        Self(vec![endpoint])
    }
}

impl<T, O> From<Vec<Endpoint<T, O>>> for Endpoints<T, O> {
    fn from(endpoints: Vec<Endpoint<T, O>>) -> Self {
        Self(endpoints)
    }
}

impl<T, O> IntoIterator for Endpoints<T, O> {
    type Item = Endpoint<T, O>;
    type IntoIter = std::vec::IntoIter<Endpoint<T, O>>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::pipelines;

    #[tokio::test]
    async fn single_endpoint_normalizes_to_one_element() {
        let endpoint = pipelines::passthrough::<u32>("a", 4);
        let endpoints: Endpoints<u32, u32> = endpoint.into();
        assert_eq!(endpoints.len(), 1);
    }

    #[tokio::test]
    async fn capability_is_fixed_at_construction() {
        let mut duplex = pipelines::passthrough::<u32>("a", 4);
        assert!(duplex.is_readable());
        assert!(duplex.take_source().is_some());
        // Still readable after the source has been handed off
        assert!(duplex.is_readable());
        assert!(duplex.take_source().is_none());

        let write_only = pipelines::for_each::<u32, u32, _>("b", 4, |_| Ok(()));
        assert!(!write_only.is_readable());
        assert_eq!(write_only.name(), "b");
    }
}
