use std::time::Duration;

/// Demultiplexer options
///
/// # Example
/// ```rust,ignore
/// let options = DemuxOptions::default()
///     .with_remultiplex(false)
///     .with_flush_timeout(Duration::from_secs(30));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DemuxOptions {
    remultiplex: bool,
    flush_timeout: Option<Duration>,
}

impl Default for DemuxOptions {
    fn default() -> Self {
        Self {
            remultiplex: true,
            flush_timeout: None,
        }
    }
}

impl DemuxOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge endpoint outputs into the demultiplexer's own output (defaults to true)
    pub fn with_remultiplex(mut self, enabled: bool) -> Self {
        self.remultiplex = enabled;
        self
    }

    /// Bound the wait for endpoint completion during `finish` (defaults to no bound)
    ///
    /// On expiry the demultiplexer is destroyed and `finish` fails with
    /// `DemuxError::FlushTimeout`.
    pub fn with_flush_timeout(mut self, timeout: Duration) -> Self {
        self.flush_timeout = Some(timeout);
        self
    }

    pub fn remultiplex(&self) -> bool {
        self.remultiplex
    }

    pub fn flush_timeout(&self) -> Option<Duration> {
        self.flush_timeout
    }
}
