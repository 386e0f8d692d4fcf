//! TTL cache for computed metrics.
//!
//! Readers load an immutable snapshot without locking. Writers serialise on
//! one mutex, copy the snapshot, modify it and swap it in. Every
//! invalidation bumps an epoch; a result computed under an older epoch is
//! not stored, so a computation that raced a mutation never lands in the
//! cache.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use parking_lot::Mutex;
use tracing::debug;

use crate::metrics::AdvancedMetrics;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub tenant_id: String,
    pub graph_id: String,
    pub algorithms: String,
}

impl CacheKey {
    pub fn new(tenant_id: &str, graph_id: &str, algorithms: &str) -> Self {
        Self {
            tenant_id: tenant_id.to_string(),
            graph_id: graph_id.to_string(),
            algorithms: algorithms.to_string(),
        }
    }
}

/// Invalidation generation observed for one `(tenant, graph)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Epoch {
    global: u64,
    tenant: u64,
    graph: u64,
}

struct CacheEntry {
    metrics: AdvancedMetrics,
    inserted_at: Instant,
}

type Snapshot = HashMap<CacheKey, Arc<CacheEntry>>;

#[derive(Default)]
struct Epochs {
    global: u64,
    tenants: HashMap<String, u64>,
    graphs: HashMap<(String, String), u64>,
}

impl Epochs {
    fn of(&self, tenant_id: &str, graph_id: &str) -> Epoch {
        Epoch {
            global: self.global,
            tenant: self.tenants.get(tenant_id).copied().unwrap_or(0),
            graph: self
                .graphs
                .get(&(tenant_id.to_string(), graph_id.to_string()))
                .copied()
                .unwrap_or(0),
        }
    }
}

pub struct MetricsCache {
    snapshot: ArcSwap<Snapshot>,
    writer: Mutex<Epochs>,
    ttl: Duration,
    max_entries: usize,
    enabled: bool,
}

impl MetricsCache {
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            snapshot: ArcSwap::from_pointee(HashMap::new()),
            writer: Mutex::new(Epochs::default()),
            ttl,
            max_entries,
            enabled: max_entries > 0,
        }
    }

    /// A cache that never stores anything.
    pub fn disabled() -> Self {
        Self { enabled: false, ..Self::new(Duration::ZERO, 0) }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn len(&self) -> usize {
        self.snapshot.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fresh entry for `key`, if any.
    pub fn get(&self, key: &CacheKey) -> Option<AdvancedMetrics> {
        if !self.enabled {
            return None;
        }
        let snapshot = self.snapshot.load();
        let entry = snapshot.get(key)?;
        if entry.inserted_at.elapsed() > self.ttl {
            return None;
        }
        Some(entry.metrics.clone())
    }

    /// Epoch to pass back to [`Self::insert`] once the computation is done.
    pub fn epoch(&self, tenant_id: &str, graph_id: &str) -> Epoch {
        self.writer.lock().of(tenant_id, graph_id)
    }

    /// Store `metrics` unless the pair was invalidated since `epoch` was
    /// taken. Returns whether the entry was stored.
    pub fn insert(&self, key: CacheKey, metrics: AdvancedMetrics, epoch: Epoch) -> bool {
        if !self.enabled {
            return false;
        }
        let epochs = self.writer.lock();
        if epochs.of(&key.tenant_id, &key.graph_id) != epoch {
            debug!(
                tenant_id = %key.tenant_id,
                graph_id = %key.graph_id,
                "Discarding stale analytics result"
            );
            return false;
        }

        let mut next: Snapshot = (**self.snapshot.load()).clone();
        next.retain(|_, e| e.inserted_at.elapsed() <= self.ttl);
        while next.len() >= self.max_entries {
            let oldest = next.iter().min_by_key(|(_, e)| e.inserted_at).map(|(k, _)| k.clone());
            match oldest {
                Some(k) => {
                    next.remove(&k);
                }
                None => break,
            }
        }
        next.insert(key, Arc::new(CacheEntry { metrics, inserted_at: Instant::now() }));
        self.snapshot.store(Arc::new(next));
        true
    }

    /// Drop every entry of one graph.
    pub fn invalidate_graph(&self, tenant_id: &str, graph_id: &str) {
        let mut epochs = self.writer.lock();
        *epochs.graphs.entry((tenant_id.to_string(), graph_id.to_string())).or_insert(0) += 1;
        self.remove_where(|k| k.tenant_id == tenant_id && k.graph_id == graph_id);
    }

    /// Drop every entry of one tenant.
    pub fn invalidate_tenant(&self, tenant_id: &str) {
        let mut epochs = self.writer.lock();
        *epochs.tenants.entry(tenant_id.to_string()).or_insert(0) += 1;
        self.remove_where(|k| k.tenant_id == tenant_id);
    }

    pub fn clear(&self) {
        let mut epochs = self.writer.lock();
        epochs.global += 1;
        self.snapshot.store(Arc::new(HashMap::new()));
    }

    // Caller holds the writer lock.
    fn remove_where(&self, matches: impl Fn(&CacheKey) -> bool) {
        let current = self.snapshot.load();
        if !current.keys().any(&matches) {
            return;
        }
        let next: Snapshot = current
            .iter()
            .filter(|(k, _)| !matches(k))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        self.snapshot.store(Arc::new(next));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithms::AlgorithmOutput;

    fn metrics(graph_id: &str) -> AdvancedMetrics {
        AdvancedMetrics::new(graph_id, 0, 0, vec!["degree".into()], AlgorithmOutput::default())
    }

    fn key(tenant: &str, graph: &str) -> CacheKey {
        CacheKey::new(tenant, graph, "degree")
    }

    #[test]
    fn stores_and_serves_entries() {
        let cache = MetricsCache::new(Duration::from_secs(60), 8);
        let epoch = cache.epoch("t", "g");
        assert!(cache.insert(key("t", "g"), metrics("g"), epoch));
        assert_eq!(cache.get(&key("t", "g")).unwrap().graph_id, "g");
        assert!(cache.get(&key("t", "other")).is_none());
    }

    #[test]
    fn result_computed_before_invalidation_is_discarded() {
        let cache = MetricsCache::new(Duration::from_secs(60), 8);
        let epoch = cache.epoch("t", "g");
        cache.invalidate_graph("t", "g");
        assert!(!cache.insert(key("t", "g"), metrics("g"), epoch));
        assert!(cache.is_empty());

        let epoch = cache.epoch("t", "g");
        cache.invalidate_tenant("t");
        assert!(!cache.insert(key("t", "g"), metrics("g"), epoch));
    }

    #[test]
    fn invalidation_is_scoped() {
        let cache = MetricsCache::new(Duration::from_secs(60), 8);
        for (t, g) in [("t", "a"), ("t", "b"), ("u", "a")] {
            let epoch = cache.epoch(t, g);
            cache.insert(key(t, g), metrics(g), epoch);
        }

        cache.invalidate_graph("t", "a");
        assert!(cache.get(&key("t", "a")).is_none());
        assert!(cache.get(&key("t", "b")).is_some());

        cache.invalidate_tenant("t");
        assert!(cache.get(&key("t", "b")).is_none());
        assert!(cache.get(&key("u", "a")).is_some());

        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn expired_entries_are_not_served() {
        let cache = MetricsCache::new(Duration::ZERO, 8);
        let epoch = cache.epoch("t", "g");
        cache.insert(key("t", "g"), metrics("g"), epoch);
        std::thread::sleep(Duration::from_millis(5));
        assert!(cache.get(&key("t", "g")).is_none());
    }

    #[test]
    fn oldest_entry_is_evicted_at_capacity() {
        let cache = MetricsCache::new(Duration::from_secs(60), 2);
        for g in ["a", "b", "c"] {
            let epoch = cache.epoch("t", g);
            cache.insert(key("t", g), metrics(g), epoch);
            std::thread::sleep(Duration::from_millis(2));
        }
        assert_eq!(cache.len(), 2);
        assert!(cache.get(&key("t", "a")).is_none());
        assert!(cache.get(&key("t", "c")).is_some());
    }

    #[test]
    fn disabled_cache_stores_nothing() {
        let cache = MetricsCache::disabled();
        let epoch = cache.epoch("t", "g");
        assert!(!cache.insert(key("t", "g"), metrics("g"), epoch));
        assert!(cache.get(&key("t", "g")).is_none());
    }
}
