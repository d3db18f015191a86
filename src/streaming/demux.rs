use futures::future::join_all;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::config::DemuxOptions;
use super::error::{DemuxError, ErrorPolicy, SkipErrors};
use super::lifecycle::Lifecycle;
use super::remux::{RemuxStream, Remultiplexer, remultiplexer};
use crate::endpoint::{Endpoint, EndpointError, EndpointFactory, Endpoints, WriteStatus};
use crate::routing::{Classifier, RoutingError, RoutingStats, RoutingTable};

/// Routes each chunk to the endpoints of its key
///
/// Endpoints are built lazily by the factory the first time a key is seen.
/// Every endpoint of a key receives every chunk of that key, in submission
/// order. A submission resolves only after every endpoint that reported
/// backpressure has drained.
///
/// # Example
/// ```rust,ignore
/// let mut demux = Demultiplexer::new(
///     |key: &str, _first: &Record| Ok(pipelines::passthrough(key, 16)),
///     Classifier::by_field("type"),
///     DemuxOptions::default(),
/// );
/// let output = demux.output();
/// demux.submit(record).await?;
/// demux.finish().await?;
/// ```
pub struct Demultiplexer<T, O, P = SkipErrors> {
    classifier: Classifier<T>,
    table: RoutingTable<T, O>,
    remux: Remultiplexer<O>,
    output: Option<RemuxStream<O>>,
    options: DemuxOptions,
    policy: P,
    stats: RoutingStats,
    lifecycle: watch::Sender<Lifecycle>,
}

impl<T, O> Demultiplexer<T, O, SkipErrors>
where
    T: Clone + Send + 'static,
    O: Send + 'static,
{
    /// Create a demultiplexer from a factory closure
    pub fn new<F, E>(factory: F, classifier: Classifier<T>, options: DemuxOptions) -> Self
    where
        F: FnMut(&str, &T) -> Result<E, EndpointError> + Send + 'static,
        E: Into<Endpoints<T, O>>,
    {
        Self::with_factory(Box::new(factory), classifier, options)
    }

    /// Create a demultiplexer from any [`EndpointFactory`]
    pub fn with_factory(
        factory: Box<dyn EndpointFactory<T, O>>,
        classifier: Classifier<T>,
        options: DemuxOptions,
    ) -> Self {
        let stats = RoutingStats::new();
        let (remux, output) = remultiplexer(stats.clone());
        let (lifecycle, _) = watch::channel(Lifecycle::Open);
        debug!(
            classifier = classifier.describe(),
            remultiplex = options.remultiplex(),
            "Demultiplexer created"
        );
        Self {
            classifier,
            table: RoutingTable::new(factory),
            remux,
            output: Some(output),
            options,
            policy: SkipErrors,
            stats,
            lifecycle,
        }
    }
}

impl<T, O, P> Demultiplexer<T, O, P>
where
    T: Clone + Send + 'static,
    O: Send + 'static,
    P: ErrorPolicy,
{
    /// Replace the error policy (defaults to [`SkipErrors`])
    pub fn with_error_policy<Q: ErrorPolicy>(self, policy: Q) -> Demultiplexer<T, O, Q> {
        Demultiplexer {
            classifier: self.classifier,
            table: self.table,
            remux: self.remux,
            output: self.output,
            options: self.options,
            policy,
            stats: self.stats,
            lifecycle: self.lifecycle,
        }
    }

    /// Take the aggregate output
    ///
    /// Returns `None` on every call after the first. With remultiplexing
    /// disabled the output carries nothing and ends when the demultiplexer
    /// closes. Endpoint output is buffered until read, so it may be taken
    /// late or never.
    pub fn output(&mut self) -> Option<RemuxStream<O>> {
        self.output.take()
    }

    /// Observe lifecycle transitions
    pub fn lifecycle(&self) -> watch::Receiver<Lifecycle> {
        self.lifecycle.subscribe()
    }

    pub fn state(&self) -> Lifecycle {
        *self.lifecycle.borrow()
    }

    pub fn stats(&self) -> RoutingStats {
        self.stats.clone()
    }

    pub fn policy(&self) -> &P {
        &self.policy
    }

    pub fn options(&self) -> &DemuxOptions {
        &self.options
    }

    /// Number of keys seen so far
    pub fn key_count(&self) -> usize {
        self.table.len()
    }

    /// Number of endpoints across all keys
    pub fn endpoint_count(&self) -> usize {
        self.table.endpoint_count()
    }

    /// Route one chunk to every endpoint of its key
    ///
    /// A classification or construction failure fails this submission only;
    /// the next chunk for the same key attempts construction again.
    pub async fn submit(&mut self, chunk: T) -> Result<(), DemuxError> {
        let state = self.state();
        if state != Lifecycle::Open {
            return Err(DemuxError::NotAccepting(state));
        }

        let key = self.classifier.route(&chunk).map_err(RoutingError::from)?;

        let remultiplex = self.options.remultiplex();
        let remux = &mut self.remux;
        let endpoints = self.table.ensure(&key, &chunk, |key, endpoint| {
            register_endpoint(remux, remultiplex, key, endpoint);
        })?;
        self.stats.record_routed(&key);

        let mut saturated = vec![false; endpoints.len()];
        for (idx, endpoint) in endpoints.iter_mut().enumerate() {
            if endpoint.is_failed() {
                continue;
            }
            match endpoint.sink_mut().write(chunk.clone()) {
                Ok(WriteStatus::Accepted) => {}
                Ok(WriteStatus::Backpressured) => saturated[idx] = true,
                Err(source) => {
                    if !self.policy.handle_endpoint_error(&key, &source) {
                        return Err(DemuxError::Endpoint { key, source });
                    }
                    endpoint.mark_failed();
                }
            }
        }

        let waits: Vec<_> = endpoints
            .iter_mut()
            .zip(saturated)
            .filter(|(_, saturated)| *saturated)
            .map(|(endpoint, _)| endpoint.sink_mut().drained())
            .collect();
        if !waits.is_empty() {
            debug!(key = %key, endpoints = waits.len(), "Waiting for endpoints to drain");
            join_all(waits).await;
        }
        Ok(())
    }

    /// End every endpoint and wait for all of them to complete
    ///
    /// Resolves once the last endpoint completes, then closes the aggregate
    /// output. With no keys seen it resolves immediately. Calling it again
    /// after a successful finish is a no-op.
    pub async fn finish(&mut self) -> Result<(), DemuxError> {
        match self.state() {
            Lifecycle::Closed => return Ok(()),
            Lifecycle::Destroyed => return Err(DemuxError::NotAccepting(Lifecycle::Destroyed)),
            Lifecycle::Open | Lifecycle::Ending => {}
        }
        self.set_state(Lifecycle::Ending);
        info!(
            keys = self.table.len(),
            endpoints = self.table.endpoint_count(),
            "Ending all endpoints"
        );

        for (_, endpoint) in self.table.iter_mut() {
            endpoint.sink_mut().end();
        }

        let completions = join_all(self.table.iter_mut().map(|(key, endpoint)| async move {
            let failed = endpoint.is_failed();
            let result = endpoint.sink_mut().completed().await;
            (key.to_owned(), failed, result)
        }));
        let outcome = match self.options.flush_timeout() {
            Some(limit) => tokio::time::timeout(limit, completions)
                .await
                .map_err(|_| limit),
            None => Ok(completions.await),
        };
        let results = match outcome {
            Ok(results) => results,
            Err(limit) => {
                warn!(timeout = ?limit, "Endpoints did not complete in time");
                return self.destroy(Some(DemuxError::FlushTimeout(limit)));
            }
        };

        let mut failure = None;
        for (key, failed, result) in results {
            let Err(source) = result else { continue };
            if failed {
                debug!(key = %key, error = %source, "Isolated endpoint completed with error");
                continue;
            }
            if !self.policy.handle_endpoint_error(&key, &source) && failure.is_none() {
                failure = Some(DemuxError::Endpoint { key, source });
            }
        }
        if let Some(error) = failure {
            return self.destroy(Some(error));
        }

        self.remux.close();
        self.set_state(Lifecycle::Closed);
        info!(
            keys = self.table.len(),
            chunks = self.stats.total_routed(),
            "Demultiplexer closed"
        );
        Ok(())
    }

    /// Tear down every endpoint immediately
    ///
    /// Returns `error` back so callers can propagate the triggering failure.
    /// Destroying after a successful finish only releases resources; the
    /// lifecycle stays `Closed`.
    pub fn destroy(&mut self, error: Option<DemuxError>) -> Result<(), DemuxError> {
        let endpoints = self.table.endpoint_count();
        for (_, endpoint) in self.table.iter_mut() {
            endpoint.sink_mut().destroy();
        }
        self.remux.abort();
        if !self.state().is_terminal() {
            self.set_state(Lifecycle::Destroyed);
        }

        match error {
            Some(error) => {
                warn!(endpoints, error = %error, "Demultiplexer destroyed");
                Err(error)
            }
            None => {
                info!(endpoints, "Demultiplexer destroyed");
                Ok(())
            }
        }
    }

    fn set_state(&self, next: Lifecycle) {
        self.lifecycle.send_if_modified(|state| {
            if *state == next {
                return false;
            }
            debug!(from = %state, to = %next, "Lifecycle transition");
            *state = next;
            true
        });
    }
}

/// What became of a newly constructed endpoint's output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Registration {
    /// Merged into the aggregate output
    Subscribed,
    /// Readable, but remultiplexing is off or the output is gone
    Discarded,
    /// Write-only while remultiplexing; reported with a warning
    WriteOnly,
    /// Write-only with remultiplexing off
    Unread,
}

/// Hook a newly constructed endpoint's output up to the aggregate output
fn register_endpoint<T, O: Send + 'static>(
    remux: &mut Remultiplexer<O>,
    remultiplex: bool,
    key: &str,
    endpoint: &mut Endpoint<T, O>,
) -> Registration {
    if !endpoint.is_readable() {
        if !remultiplex {
            return Registration::Unread;
        }
        warn!(
            key,
            endpoint = endpoint.name(),
            "Endpoint is write-only; nothing from it reaches the aggregate output"
        );
        return Registration::WriteOnly;
    }

    let subscribed = match endpoint.take_source() {
        Some(source) => remultiplex && remux.subscribe(key, source),
        None => false,
    };
    if subscribed {
        Registration::Subscribed
    } else {
        debug!(key, endpoint = endpoint.name(), "Endpoint output discarded");
        Registration::Discarded
    }
}

impl<T, O, P> std::fmt::Debug for Demultiplexer<T, O, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Demultiplexer")
            .field("classifier", &self.classifier.describe())
            .field("keys", &self.table.len())
            .field("state", &*self.lifecycle.borrow())
            .field("options", &self.options)
            .finish()
    }
}
