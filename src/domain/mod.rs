pub mod error;
pub mod record;

// Re-export commonly used types
pub use error::DomainError;
pub use record::{KeyField, Record};
