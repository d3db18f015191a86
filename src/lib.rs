//! Dynamic stream demultiplexing.
//!
//! A [`Demultiplexer`](streaming::Demultiplexer) classifies each incoming
//! chunk to a routing key, lazily builds that key's endpoints through a
//! factory, writes the chunk to all of them with backpressure, and can merge
//! what the endpoints produce back into a single output stream.

pub mod app;
pub mod domain;
pub mod endpoint;
pub mod io;
pub mod prelude;
pub mod routing;
pub mod streaming;
