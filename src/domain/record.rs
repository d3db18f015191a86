use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use super::error::DomainError;

/// Read access to named fields, used by field-based classification
pub trait KeyField {
    /// Value of the named field, if the chunk has one
    fn key_field(&self, name: &str) -> Option<String>;
}

impl KeyField for HashMap<String, String> {
    fn key_field(&self, name: &str) -> Option<String> {
        self.get(name).cloned()
    }
}

impl KeyField for BTreeMap<String, String> {
    fn key_field(&self, name: &str) -> Option<String> {
        self.get(name).cloned()
    }
}

/// A CSV row paired with the header row it was read under
///
/// Headers are shared between all records of one input, so cloning a record
/// for fan-out only copies its values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    headers: Arc<Vec<String>>,
    values: Vec<String>,
}

impl Record {
    /// Build a record, rejecting rows whose width differs from the headers
    pub fn new(headers: Arc<Vec<String>>, values: Vec<String>) -> Result<Self, DomainError> {
        if headers.len() != values.len() {
            return Err(DomainError::RecordShape {
                headers: headers.len(),
                values: values.len(),
            });
        }
        Ok(Self { headers, values })
    }

    /// Convenience constructor for tests and demos
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let (headers, values): (Vec<String>, Vec<String>) = pairs
            .into_iter()
            .map(|(h, v)| (h.to_string(), v.to_string()))
            .unzip();
        Self {
            headers: Arc::new(headers),
            values,
        }
    }

    /// Look up a value by column name
    pub fn get(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .position(|h| h == name)
            .map(|idx| self.values[idx].as_str())
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn values(&self) -> &[String] {
        &self.values
    }
}

impl KeyField for Record {
    fn key_field(&self, name: &str) -> Option<String> {
        self.get(name).map(str::to_string)
    }
}
