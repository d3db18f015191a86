use std::fmt;

/// Lifecycle of a demultiplexer
///
/// `Open` -> `Ending` -> `Closed` on the graceful path; any state can move to
/// `Destroyed` except `Closed`, which is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lifecycle {
    /// Accepting chunks
    Open,
    /// Input ended; waiting for every endpoint to complete
    Ending,
    /// Every endpoint completed
    Closed,
    /// Forcibly torn down
    Destroyed,
}

impl Lifecycle {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Closed | Self::Destroyed)
    }
}

impl fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Open => "open",
            Self::Ending => "ending",
            Self::Closed => "closed",
            Self::Destroyed => "destroyed",
        };
        f.write_str(name)
    }
}
