use std::sync::{Arc, Mutex, PoisonError};

use futures::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::demux::Demultiplexer;
use super::error::{DemuxError, ErrorPolicy};
use super::remux::RemuxStream;
use crate::io::IoError;

/// Tears a running session down from outside
///
/// Cloneable; any clone may trigger teardown. The first reason wins.
#[derive(Clone, Default)]
pub struct DestroyHandle {
    token: CancellationToken,
    reason: Arc<Mutex<Option<DemuxError>>>,
}

impl DestroyHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request teardown; `error` is what the session reports (`None` for a clean cancel)
    pub fn destroy(&self, error: Option<DemuxError>) {
        if self.token.is_cancelled() {
            return;
        }
        if let Some(error) = error {
            let mut reason = self.reason.lock().unwrap_or_else(PoisonError::into_inner);
            reason.get_or_insert(error);
        }
        self.token.cancel();
    }

    pub fn is_destroyed(&self) -> bool {
        self.token.is_cancelled()
    }

    async fn destroyed(&self) {
        self.token.cancelled().await
    }

    fn take_reason(&self) -> Option<DemuxError> {
        self.reason
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

impl std::fmt::Debug for DestroyHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DestroyHandle")
            .field("destroyed", &self.is_destroyed())
            .finish()
    }
}

/// Summary of a session run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionReport {
    /// Distinct routing keys seen
    pub keys: usize,
    /// Endpoints constructed across all keys
    pub endpoints: usize,
    /// Chunks handed to endpoints
    pub chunks_routed: u64,
    /// Input error items skipped per the error policy
    pub input_errors: u64,
    /// Chunks dropped because they could not be classified or their endpoints not built
    pub routing_errors: u64,
    /// The run ended through a clean destroy rather than by reaching end of input
    pub cancelled: bool,
}

impl SessionReport {
    /// Whether the whole input was routed and every endpoint completed
    pub fn is_complete(&self) -> bool {
        !self.cancelled
    }
}

/// Drives a demultiplexer from an input stream
///
/// Pulls one item at a time, submits it, and waits for the submission to
/// resolve before pulling the next. When the input ends the demultiplexer is
/// finished. A [`DestroyHandle`] interrupts any of these waits.
pub struct DemuxSession<T, O, P> {
    demux: Demultiplexer<T, O, P>,
    handle: DestroyHandle,
    input_errors: u64,
    routing_errors: u64,
}

impl<T, O, P> DemuxSession<T, O, P>
where
    T: Clone + Send + 'static,
    O: Send + 'static,
    P: ErrorPolicy,
{
    pub fn new(demux: Demultiplexer<T, O, P>) -> Self {
        Self {
            demux,
            handle: DestroyHandle::new(),
            input_errors: 0,
            routing_errors: 0,
        }
    }

    /// Attach an existing handle, e.g. one shared with a signal listener
    pub fn with_destroy_handle(mut self, handle: DestroyHandle) -> Self {
        self.handle = handle;
        self
    }

    pub fn destroy_handle(&self) -> DestroyHandle {
        self.handle.clone()
    }

    /// Take the aggregate output of the underlying demultiplexer
    pub fn output(&mut self) -> Option<RemuxStream<O>> {
        self.demux.output()
    }

    pub fn demux(&self) -> &Demultiplexer<T, O, P> {
        &self.demux
    }

    /// Consume the session and return the demultiplexer
    pub fn into_demux(self) -> Demultiplexer<T, O, P> {
        self.demux
    }

    /// Route every item of `input`, then finish
    ///
    /// Error items are passed to the error policy; so are chunks that fail
    /// to route. A policy refusal destroys the demultiplexer and returns the
    /// error. A clean destroy through the handle returns a report marked
    /// cancelled.
    pub async fn run<S>(&mut self, mut input: S) -> Result<SessionReport, DemuxError>
    where
        S: Stream<Item = Result<T, IoError>> + Unpin,
    {
        debug!("Session started");
        loop {
            let next = tokio::select! {
                biased;
                _ = self.handle.destroyed() => return self.teardown(),
                next = input.next() => next,
            };

            let chunk = match next {
                None => break,
                Some(Ok(chunk)) => chunk,
                Some(Err(e)) => {
                    if !self.demux.policy().handle_input_error(&e) {
                        return self.abort(DemuxError::Input(e));
                    }
                    self.input_errors += 1;
                    continue;
                }
            };

            let submitted = tokio::select! {
                biased;
                _ = self.handle.destroyed() => return self.teardown(),
                submitted = self.demux.submit(chunk) => submitted,
            };
            match submitted {
                Ok(()) => {}
                Err(DemuxError::Routing(e)) if self.demux.policy().handle_routing_error(&e) => {
                    self.routing_errors += 1;
                }
                Err(e) => return self.abort(e),
            }
        }

        debug!("Input exhausted, finishing");
        tokio::select! {
            biased;
            _ = self.handle.destroyed() => return self.teardown(),
            finished = self.demux.finish() => finished?,
        }

        let report = self.report(false);
        info!(
            keys = report.keys,
            chunks = report.chunks_routed,
            input_errors = report.input_errors,
            routing_errors = report.routing_errors,
            "Session complete"
        );
        Ok(report)
    }

    /// Teardown requested through the handle
    fn teardown(&mut self) -> Result<SessionReport, DemuxError> {
        let reason = self.handle.take_reason();
        debug!(with_error = reason.is_some(), "Session destroyed");
        self.demux.destroy(reason)?;
        Ok(self.report(true))
    }

    fn abort(&mut self, error: DemuxError) -> Result<SessionReport, DemuxError> {
        self.demux.destroy(Some(error))?;
        Ok(self.report(true))
    }

    fn report(&self, cancelled: bool) -> SessionReport {
        SessionReport {
            keys: self.demux.key_count(),
            endpoints: self.demux.endpoint_count(),
            chunks_routed: self.demux.stats().total_routed(),
            input_errors: self.input_errors,
            routing_errors: self.routing_errors,
            cancelled,
        }
    }
}
