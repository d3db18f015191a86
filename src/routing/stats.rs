use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;

#[derive(Default)]
struct KeyCounters {
    routed: AtomicU64,
    emitted: AtomicU64,
}

/// Per-key counters shared between the demultiplexer and observers
///
/// Cheap to clone; every clone sees the same counters. Updates take a brief
/// per-shard lock only when a key is seen for the first time.
#[derive(Clone, Default)]
pub struct RoutingStats {
    keys: Arc<DashMap<String, KeyCounters>>,
}

/// Point-in-time counters for one key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyStats {
    pub key: String,
    /// Chunks routed into the key's endpoints
    pub routed: u64,
    /// Chunks the key's endpoints produced into the aggregate output
    pub emitted: u64,
}

impl RoutingStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_routed(&self, key: &str) {
        self.with_counters(key, |c| c.routed.fetch_add(1, Ordering::Relaxed));
    }

    pub fn record_emitted(&self, key: &str) {
        self.with_counters(key, |c| c.emitted.fetch_add(1, Ordering::Relaxed));
    }

    fn with_counters(&self, key: &str, update: impl FnOnce(&KeyCounters) -> u64) {
        if let Some(counters) = self.keys.get(key) {
            update(counters.value());
            return;
        }
        update(self.keys.entry(key.to_owned()).or_default().value());
    }

    pub fn routed(&self, key: &str) -> u64 {
        self.keys
            .get(key)
            .map(|c| c.routed.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    pub fn emitted(&self, key: &str) -> u64 {
        self.keys
            .get(key)
            .map(|c| c.emitted.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    pub fn total_routed(&self) -> u64 {
        self.keys
            .iter()
            .map(|entry| entry.value().routed.load(Ordering::Relaxed))
            .sum()
    }

    pub fn key_count(&self) -> usize {
        self.keys.len()
    }

    /// All keys, sorted
    pub fn snapshot(&self) -> Vec<KeyStats> {
        let mut stats: Vec<KeyStats> = self
            .keys
            .iter()
            .map(|entry| KeyStats {
                key: entry.key().clone(),
                routed: entry.value().routed.load(Ordering::Relaxed),
                emitted: entry.value().emitted.load(Ordering::Relaxed),
            })
            .collect();
        stats.sort_by(|a, b| a.key.cmp(&b.key));
        stats
    }
}

impl std::fmt::Debug for RoutingStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoutingStats")
            .field("keys", &self.key_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn counts_per_key() {
        let stats = RoutingStats::new();
        stats.record_routed("a");
        stats.record_routed("a");
        stats.record_routed("b");
        stats.record_emitted("a");

        assert_eq!(stats.routed("a"), 2);
        assert_eq!(stats.routed("b"), 1);
        assert_eq!(stats.emitted("a"), 1);
        assert_eq!(stats.emitted("b"), 0);
        assert_eq!(stats.routed("missing"), 0);
        assert_eq!(stats.total_routed(), 3);
        assert_eq!(stats.key_count(), 2);
    }

    #[test]
    fn snapshot_is_sorted_by_key() {
        let stats = RoutingStats::new();
        for key in ["c", "a", "b"] {
            stats.record_routed(key);
        }

        let keys: Vec<_> = stats.snapshot().into_iter().map(|s| s.key).collect();
        assert_eq!(keys, vec!["a", "b", "c"]);
    }

    #[test]
    fn clones_share_counters() {
        let stats = RoutingStats::new();
        let observer = stats.clone();
        stats.record_routed("a");
        assert_eq!(observer.routed("a"), 1);
    }

    #[test]
    fn concurrent_updates_to_same_key() {
        let stats = RoutingStats::new();
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let stats = stats.clone();
                thread::spawn(move || {
                    for _ in 0..500 {
                        stats.record_routed("shared");
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(stats.routed("shared"), 2000);
    }
}
