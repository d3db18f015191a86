use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use futures::FutureExt;
use tokio::sync::{Notify, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::error::EndpointError;
use super::traits::{Sink, WriteStatus};

/// Buffered chunks at which a channel endpoint reports backpressure
pub const DEFAULT_HIGH_WATER_MARK: usize = 16;

/// Shared count of chunks written but not yet taken by the worker
#[derive(Default)]
struct BufferGauge {
    buffered: AtomicUsize,
    receiver_gone: AtomicBool,
    drained: Notify,
}

impl BufferGauge {
    fn is_drained(&self) -> bool {
        self.buffered.load(Ordering::Acquire) == 0 || self.receiver_gone.load(Ordering::Acquire)
    }
}

/// Input side handed to a channel endpoint's worker
pub struct ChunkReceiver<T> {
    rx: mpsc::UnboundedReceiver<T>,
    gauge: Arc<BufferGauge>,
}

impl<T> ChunkReceiver<T> {
    /// Next chunk, or `None` once the endpoint has been ended
    pub async fn recv(&mut self) -> Option<T> {
        let chunk = self.rx.recv().await?;
        if self.gauge.buffered.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.gauge.drained.notify_waiters();
        }
        Some(chunk)
    }
}

impl<T> Drop for ChunkReceiver<T> {
    fn drop(&mut self) {
        // A finished or aborted worker never drains again; release waiters
        self.gauge.receiver_gone.store(true, Ordering::Release);
        self.gauge.drained.notify_waiters();
    }
}

/// An endpoint whose work runs on its own tokio task
///
/// Writes never block: chunks are queued and `write` reports
/// [`WriteStatus::Backpressured`] once the queue reaches the high water mark.
/// `drained` resolves when the worker has emptied the queue.
pub struct ChannelEndpoint<T> {
    name: String,
    tx: Option<mpsc::UnboundedSender<T>>,
    gauge: Arc<BufferGauge>,
    high_water_mark: usize,
    worker: Option<JoinHandle<Result<(), EndpointError>>>,
    outcome: Option<Result<(), EndpointError>>,
}

impl<T: Send + 'static> ChannelEndpoint<T> {
    /// Spawn `worker` on a new task, feeding it every chunk written to the endpoint
    pub fn spawn<F, Fut>(name: impl Into<String>, high_water_mark: usize, worker: F) -> Self
    where
        F: FnOnce(ChunkReceiver<T>) -> Fut,
        Fut: Future<Output = Result<(), EndpointError>> + Send + 'static,
    {
        let name = name.into();
        let (tx, rx) = mpsc::unbounded_channel();
        let gauge = Arc::new(BufferGauge::default());
        let receiver = ChunkReceiver {
            rx,
            gauge: Arc::clone(&gauge),
        };

        let work = worker(receiver);
        let worker_name = name.clone();
        let handle = tokio::spawn(async move {
            debug!(endpoint = %worker_name, "Endpoint worker started");
            let result = work.await;
            match &result {
                Ok(()) => debug!(endpoint = %worker_name, "Endpoint worker stopped"),
                Err(e) => warn!(endpoint = %worker_name, error = %e, "Endpoint worker failed"),
            }
            result
        });

        Self {
            name,
            tx: Some(tx),
            gauge,
            high_water_mark: high_water_mark.max(1),
            worker: Some(handle),
            outcome: None,
        }
    }

    /// Chunks written but not yet taken by the worker
    pub fn buffered(&self) -> usize {
        self.gauge.buffered.load(Ordering::Acquire)
    }

    pub fn high_water_mark(&self) -> usize {
        self.high_water_mark
    }

    /// The worker's result if it has already exited, without waiting
    fn finished_outcome(&mut self) -> Option<Result<(), EndpointError>> {
        if self.outcome.is_none() {
            let handle = self.worker.as_mut()?;
            if !handle.is_finished() {
                return None;
            }
            let joined = handle.now_or_never()?;
            self.worker = None;
            self.outcome = Some(self.join_outcome(joined));
        }
        self.outcome.clone()
    }

    fn join_outcome(
        &self,
        joined: Result<Result<(), EndpointError>, tokio::task::JoinError>,
    ) -> Result<(), EndpointError> {
        match joined {
            Ok(result) => result,
            Err(e) if e.is_cancelled() => Err(EndpointError::Destroyed(self.name.clone())),
            Err(_) => Err(EndpointError::Panicked(self.name.clone())),
        }
    }
}

#[async_trait]
impl<T: Send + 'static> Sink<T> for ChannelEndpoint<T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn write(&mut self, chunk: T) -> Result<WriteStatus, EndpointError> {
        let Some(tx) = self.tx.as_ref() else {
            return Err(EndpointError::Closed(self.name.clone()));
        };

        // Charge the gauge before sending so the worker never decrements first
        let buffered = self.gauge.buffered.fetch_add(1, Ordering::AcqRel) + 1;
        if tx.send(chunk).is_err() {
            self.gauge.buffered.fetch_sub(1, Ordering::AcqRel);
            let closed = EndpointError::Closed(self.name.clone());
            return Err(match self.finished_outcome() {
                Some(Err(e)) => e,
                _ => closed,
            });
        }

        if buffered < self.high_water_mark {
            Ok(WriteStatus::Accepted)
        } else {
            Ok(WriteStatus::Backpressured)
        }
    }

    async fn drained(&mut self) {
        loop {
            let notified = self.gauge.drained.notified();
            if self.gauge.is_drained() {
                return;
            }
            notified.await;
        }
    }

    fn end(&mut self) {
        if self.tx.take().is_some() {
            debug!(endpoint = %self.name, "Endpoint input ended");
        }
    }

    async fn completed(&mut self) -> Result<(), EndpointError> {
        if let Some(handle) = self.worker.as_mut() {
            // Await by reference so a cancelled wait leaves the handle abortable
            let joined = handle.await;
            self.worker = None;
            self.outcome = Some(self.join_outcome(joined));
        }
        self.outcome.clone().unwrap_or(Ok(()))
    }

    fn destroy(&mut self) {
        self.tx = None;
        if let Some(handle) = self.worker.take() {
            handle.abort();
            debug!(endpoint = %self.name, "Endpoint worker aborted");
        }
        if self.outcome.is_none() {
            self.outcome = Some(Err(EndpointError::Destroyed(self.name.clone())));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::sync::oneshot;

    /// Worker that waits for a release signal before consuming anything
    fn gated_endpoint(
        hwm: usize,
    ) -> (
        ChannelEndpoint<u32>,
        oneshot::Sender<()>,
        mpsc::UnboundedReceiver<u32>,
    ) {
        let (release_tx, release_rx) = oneshot::channel::<()>();
        let (seen_tx, seen_rx) = mpsc::unbounded_channel();
        let endpoint = ChannelEndpoint::spawn("gated", hwm, move |mut input| async move {
            let _ = release_rx.await;
            while let Some(chunk) = input.recv().await {
                let _ = seen_tx.send(chunk);
            }
            Ok(())
        });
        (endpoint, release_tx, seen_rx)
    }

    #[tokio::test]
    async fn reports_backpressure_at_high_water_mark() {
        let (mut endpoint, _release, _seen) = gated_endpoint(2);

        assert_eq!(endpoint.write(1).unwrap(), WriteStatus::Accepted);
        assert_eq!(endpoint.write(2).unwrap(), WriteStatus::Backpressured);
        assert_eq!(endpoint.buffered(), 2);
    }

    #[tokio::test]
    async fn drained_resolves_once_worker_catches_up() {
        let (mut endpoint, release, mut seen) = gated_endpoint(1);
        assert_eq!(endpoint.write(7).unwrap(), WriteStatus::Backpressured);

        // Not drained while the worker is gated
        let pending = tokio::time::timeout(Duration::from_millis(20), endpoint.drained()).await;
        assert!(pending.is_err());

        release.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(1), endpoint.drained())
            .await
            .expect("endpoint should drain");
        assert_eq!(seen.recv().await, Some(7));
        assert_eq!(endpoint.buffered(), 0);
    }

    #[tokio::test]
    async fn end_then_completed_preserves_order() {
        let (mut endpoint, release, mut seen) = gated_endpoint(8);
        for i in 0..5 {
            endpoint.write(i).unwrap();
        }
        endpoint.end();
        release.send(()).unwrap();

        endpoint.completed().await.unwrap();

        let mut received = Vec::new();
        while let Ok(v) = seen.try_recv() {
            received.push(v);
        }
        assert_eq!(received, vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn write_after_end_is_closed() {
        let (mut endpoint, _release, _seen) = gated_endpoint(4);
        endpoint.end();
        assert_eq!(
            endpoint.write(1),
            Err(EndpointError::Closed("gated".to_string()))
        );
    }

    #[tokio::test]
    async fn worker_error_surfaces_on_completed_and_write() {
        let mut endpoint = ChannelEndpoint::<u32>::spawn("failing", 4, |mut input| async move {
            input.recv().await;
            Err(EndpointError::failed("failing", "bad chunk"))
        });

        endpoint.write(1).unwrap();
        let outcome = endpoint.completed().await;
        assert_eq!(outcome, Err(EndpointError::failed("failing", "bad chunk")));

        // The worker is gone; later writes report its failure
        assert_eq!(
            endpoint.write(2),
            Err(EndpointError::failed("failing", "bad chunk"))
        );
    }

    #[tokio::test]
    async fn destroy_aborts_stuck_worker() {
        let (mut endpoint, _release, _seen) = gated_endpoint(1);
        endpoint.write(1).unwrap();

        endpoint.destroy();

        assert_eq!(
            endpoint.completed().await,
            Err(EndpointError::Destroyed("gated".to_string()))
        );
        assert!(endpoint.write(2).is_err());
        // A destroyed endpoint never blocks a drain wait
        tokio::time::timeout(Duration::from_secs(1), endpoint.drained())
            .await
            .expect("destroyed endpoint should not block");
    }

    #[tokio::test]
    async fn panicking_worker_reports_panic() {
        let mut endpoint = ChannelEndpoint::<u32>::spawn("panics", 4, |mut input| async move {
            input.recv().await;
            panic!("worker blew up");
        });
        endpoint.write(1).unwrap();

        assert_eq!(
            endpoint.completed().await,
            Err(EndpointError::Panicked("panics".to_string()))
        );
    }

    #[tokio::test]
    async fn zero_high_water_mark_is_clamped() {
        let (endpoint, _release, _seen) = gated_endpoint(0);
        assert_eq!(endpoint.high_water_mark(), 1);
    }
}
