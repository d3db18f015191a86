use std::fmt;

use crate::domain::{DomainError, KeyField};

type Extract<T> = Box<dyn Fn(&T) -> Result<String, DomainError> + Send + Sync>;

/// Derives the routing key of a chunk
///
/// Either reads a named field (`by_field`) or applies an arbitrary function
/// (`by_fn`). Classification must be pure: the same chunk always yields the
/// same key.
pub struct Classifier<T> {
    description: String,
    extract: Extract<T>,
}

impl<T> Classifier<T> {
    /// Classify with an arbitrary function
    pub fn by_fn<F>(f: F) -> Self
    where
        F: Fn(&T) -> String + Send + Sync + 'static,
    {
        Self {
            description: "fn".to_string(),
            extract: Box::new(move |chunk| Ok(f(chunk))),
        }
    }

    /// Routing key for `chunk`
    pub fn route(&self, chunk: &T) -> Result<String, DomainError> {
        (self.extract)(chunk)
    }

    /// Human-readable form, e.g. `field:type`
    pub fn describe(&self) -> &str {
        &self.description
    }
}

impl<T: KeyField> Classifier<T> {
    /// Classify by the value of a named field
    pub fn by_field(name: impl Into<String>) -> Self {
        let name = name.into();
        let description = format!("field:{name}");
        Self {
            description,
            extract: Box::new(move |chunk| {
                chunk
                    .key_field(&name)
                    .ok_or_else(|| DomainError::MissingKeyField(name.clone()))
            }),
        }
    }
}

impl<T> fmt::Debug for Classifier<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Classifier")
            .field("by", &self.description)
            .finish()
    }
}
