//! Ready-made endpoint constructors built on [`ChannelEndpoint`].
//!
//! Duplex pipelines emit through a bounded channel with the same capacity as
//! their input high water mark. Output that nobody subscribed to is discarded
//! so the worker still runs to completion.

use futures::stream::{self, Stream};
use tokio::sync::mpsc;

use super::channel::ChannelEndpoint;
use super::capability::Endpoint;
use super::error::EndpointError;

/// Turn a bounded receiver into an endpoint source
pub fn receiver_stream<O: Send + 'static>(rx: mpsc::Receiver<O>) -> impl Stream<Item = O> + Send {
    stream::unfold(rx, |mut rx| async move { rx.recv().await.map(|item| (item, rx)) })
}

/// Re-emits every chunk unchanged
pub fn passthrough<T>(name: impl Into<String>, high_water_mark: usize) -> Endpoint<T, T>
where
    T: Send + 'static,
{
    map(name, high_water_mark, Ok)
}

/// Emits `f(chunk)` for every chunk; an error stops the endpoint
pub fn map<T, O, F>(name: impl Into<String>, high_water_mark: usize, mut f: F) -> Endpoint<T, O>
where
    T: Send + 'static,
    O: Send + 'static,
    F: FnMut(T) -> Result<O, EndpointError> + Send + 'static,
{
    let capacity = high_water_mark.max(1);
    let (out_tx, out_rx) = mpsc::channel(capacity);
    let sink = ChannelEndpoint::spawn(name, capacity, move |mut input| async move {
        while let Some(chunk) = input.recv().await {
            let out = f(chunk)?;
            // Unsubscribed output is discarded
            let _ = out_tx.send(out).await;
        }
        Ok(())
    });
    Endpoint::duplex(sink, receiver_stream(out_rx))
}

/// Consumes every chunk with `f`; produces nothing
pub fn for_each<T, O, F>(
    name: impl Into<String>,
    high_water_mark: usize,
    mut f: F,
) -> Endpoint<T, O>
where
    T: Send + 'static,
    F: FnMut(T) -> Result<(), EndpointError> + Send + 'static,
{
    let sink = ChannelEndpoint::spawn(name, high_water_mark, move |mut input| async move {
        while let Some(chunk) = input.recv().await {
            f(chunk)?;
        }
        Ok(())
    });
    Endpoint::write_only(sink)
}

/// Folds every chunk into an accumulator and emits it once the input ends
///
/// A reducer error ends the endpoint with that error; nothing is emitted.
pub fn reduce<T, R, F>(
    name: impl Into<String>,
    high_water_mark: usize,
    initial: R,
    mut f: F,
) -> Endpoint<T, R>
where
    T: Send + 'static,
    R: Send + 'static,
    F: FnMut(R, T) -> Result<R, EndpointError> + Send + 'static,
{
    let (out_tx, out_rx) = mpsc::channel(1);
    let sink = ChannelEndpoint::spawn(name, high_water_mark, move |mut input| async move {
        let mut acc = initial;
        while let Some(chunk) = input.recv().await {
            acc = f(acc, chunk)?;
        }
        let _ = out_tx.send(acc).await;
        Ok(())
    });
    Endpoint::duplex(sink, receiver_stream(out_rx))
}
