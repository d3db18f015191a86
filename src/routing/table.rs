use std::collections::HashMap;
use std::collections::hash_map::Entry;

use tracing::debug;

use super::error::RoutingError;
use crate::endpoint::{Endpoint, EndpointFactory};

/// Routing key -> endpoints, populated lazily through the factory
///
/// An entry is created on the first chunk for its key and lives as long as
/// the table. The factory is invoked at most once per key that constructed
/// successfully; a failed construction leaves no entry, so the next chunk
/// for that key tries again.
pub struct RoutingTable<T, O> {
    factory: Box<dyn EndpointFactory<T, O>>,
    routes: HashMap<String, Vec<Endpoint<T, O>>>,
}

impl<T, O> RoutingTable<T, O> {
    pub fn new(factory: Box<dyn EndpointFactory<T, O>>) -> Self {
        Self {
            factory,
            routes: HashMap::new(),
        }
    }

    /// Endpoints for `key`, constructing them from `chunk` on first sight
    ///
    /// `register` runs once for every newly constructed endpoint before it is
    /// stored.
    pub fn ensure<R>(
        &mut self,
        key: &str,
        chunk: &T,
        mut register: R,
    ) -> Result<&mut Vec<Endpoint<T, O>>, RoutingError>
    where
        R: FnMut(&str, &mut Endpoint<T, O>),
    {
        match self.routes.entry(key.to_owned()) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                let mut endpoints = self
                    .factory
                    .construct(key, chunk)
                    .map_err(|source| RoutingError::Construction {
                        key: key.to_owned(),
                        source,
                    })?
                    .into_vec();

                debug!(key, endpoints = endpoints.len(), "Constructed endpoints for new key");
                for endpoint in endpoints.iter_mut() {
                    register(key, endpoint);
                }
                Ok(entry.insert(endpoints))
            }
        }
    }

    /// Number of keys with registered endpoints
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Number of endpoints across all keys
    pub fn endpoint_count(&self) -> usize {
        self.routes.values().map(Vec::len).sum()
    }

    /// Every registered endpoint paired with its key
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&str, &mut Endpoint<T, O>)> {
        self.routes.iter_mut().flat_map(|(key, endpoints)| {
            endpoints
                .iter_mut()
                .map(move |endpoint| (key.as_str(), endpoint))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::{EndpointError, pipelines};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_table(calls: Arc<AtomicUsize>) -> RoutingTable<u32, u32> {
        RoutingTable::new(Box::new(move |key: &str, _chunk: &u32| {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok::<_, EndpointError>(pipelines::passthrough(format!("{key}/pass"), 4))
        }))
    }

    #[tokio::test]
    async fn constructs_once_per_key() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut table = counting_table(Arc::clone(&calls));

        for chunk in [1, 2, 3] {
            table.ensure("a", &chunk, |_, _| {}).unwrap();
        }
        table.ensure("b", &4, |_, _| {}).unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(table.len(), 2);
        assert_eq!(table.endpoint_count(), 2);
        let mut keys: Vec<String> = table.iter_mut().map(|(key, _)| key.to_string()).collect();
        keys.sort();
        assert_eq!(keys, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn register_runs_only_for_new_endpoints() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut table = counting_table(calls);
        let mut registered = Vec::new();

        table
            .ensure("a", &1, |key, endpoint| {
                registered.push((key.to_string(), endpoint.name().to_string()))
            })
            .unwrap();
        table
            .ensure("a", &2, |key, _| registered.push((key.to_string(), String::new())))
            .unwrap();

        assert_eq!(registered, vec![("a".to_string(), "a/pass".to_string())]);
    }

    #[tokio::test]
    async fn factory_may_return_several_endpoints() {
        let mut table: RoutingTable<u32, u32> =
            RoutingTable::new(Box::new(|key: &str, _chunk: &u32| {
                Ok::<_, EndpointError>(vec![
                    pipelines::passthrough(format!("{key}/one"), 4),
                    pipelines::passthrough(format!("{key}/two"), 4),
                ])
            }));

        let endpoints = table.ensure("k", &1, |_, _| {}).unwrap();
        assert_eq!(endpoints.len(), 2);

        let names: Vec<_> = table.iter_mut().map(|(_, e)| e.name().to_string()).collect();
        assert_eq!(names.len(), 2);
        assert!(names.contains(&"k/one".to_string()));
    }

    #[test]
    fn failed_construction_leaves_no_entry() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&attempts);
        let mut table: RoutingTable<u32, u32> =
            RoutingTable::new(Box::new(move |_key: &str, _chunk: &u32| {
                counter.fetch_add(1, Ordering::SeqCst);
                Err::<Vec<Endpoint<u32, u32>>, _>(EndpointError::Construct(
                    "refused".to_string(),
                ))
            }));

        let err = table.ensure("a", &1, |_, _| {}).unwrap_err();
        assert!(matches!(err, RoutingError::Construction { ref key, .. } if key == "a"));
        assert!(table.is_empty());

        // Retried on the next chunk for the same key
        assert!(table.ensure("a", &2, |_, _| {}).is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }
}
