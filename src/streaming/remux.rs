use std::pin::Pin;
use std::task::{Context, Poll};

use futures::stream::{Stream, StreamExt};
use pin_project_lite::pin_project;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tracing::{debug, trace};

use crate::endpoint::Source;
use crate::routing::RoutingStats;

pin_project! {
    /// Endpoint output that counts every item against its routing key
    struct CountedSource<S> {
        #[pin]
        inner: S,
        key: String,
        stats: RoutingStats,
    }
}

impl<S: Stream> Stream for CountedSource<S> {
    type Item = S::Item;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.project();
        match this.inner.poll_next(cx) {
            Poll::Ready(Some(item)) => {
                this.stats.record_emitted(this.key);
                Poll::Ready(Some(item))
            }
            Poll::Ready(None) => {
                debug!(key = %this.key, "Endpoint output ended");
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

/// Registration side of the aggregate output
///
/// Every subscribed source is drained by its own forwarding task into the
/// paired [`RemuxStream`], so an endpoint never waits on the aggregate
/// output. Items buffer until the output is read. Once closed, the stream
/// ends after every subscribed source has ended.
pub struct Remultiplexer<O> {
    forward: Option<mpsc::UnboundedSender<O>>,
    pumps: Vec<AbortHandle>,
    stats: RoutingStats,
}

/// The aggregate output: items from every subscribed endpoint, interleaved in
/// the order they become available
pub struct RemuxStream<O> {
    merged: mpsc::UnboundedReceiver<O>,
}

/// Create a connected registration handle and aggregate output
pub fn remultiplexer<O: Send + 'static>(stats: RoutingStats) -> (Remultiplexer<O>, RemuxStream<O>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        Remultiplexer {
            forward: Some(tx),
            pumps: Vec::new(),
            stats,
        },
        RemuxStream { merged: rx },
    )
}

impl<O: Send + 'static> Remultiplexer<O> {
    /// Merge `source` into the aggregate output
    ///
    /// Returns false if the output has been closed or dropped; the source is
    /// dropped in that case. Must be called within a tokio runtime.
    pub fn subscribe(&mut self, key: &str, source: Source<O>) -> bool {
        let Some(forward) = &self.forward else {
            return false;
        };
        if forward.is_closed() {
            trace!(key, "Aggregate output dropped; discarding endpoint output");
            return false;
        }

        let mut counted = CountedSource {
            inner: source,
            key: key.to_owned(),
            stats: self.stats.clone(),
        };
        let forward = forward.clone();
        let pump = tokio::spawn(async move {
            while let Some(item) = counted.next().await {
                // Keep draining after the output is dropped so the endpoint completes
                let _ = forward.send(item);
            }
        });
        self.pumps.push(pump.abort_handle());
        true
    }

    /// No further sources will be subscribed
    pub fn close(&mut self) {
        if self.forward.take().is_some() {
            debug!(sources = self.pumps.len(), "Remultiplexer closed");
        }
    }

    /// Close and stop forwarding from every subscribed source
    pub fn abort(&mut self) {
        self.close();
        for pump in self.pumps.drain(..) {
            pump.abort();
        }
    }

    pub fn is_closed(&self) -> bool {
        self.forward.is_none()
    }

    /// Number of sources merged so far
    pub fn subscribed(&self) -> usize {
        self.pumps.len()
    }
}

impl<O> Stream for RemuxStream<O> {
    type Item = O;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<O>> {
        // Ends once the remultiplexer is closed and every forwarding task is done
        self.get_mut().merged.poll_recv(cx)
    }
}
