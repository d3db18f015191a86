pub mod classifier;
pub mod error;
pub mod stats;
pub mod table;

// Re-export commonly used types
pub use classifier::Classifier;
pub use error::RoutingError;
pub use stats::{KeyStats, RoutingStats};
pub use table::RoutingTable;
