use parking_lot::RwLock;
use std::collections::HashMap;
use std::time::{Duration, Instant};

pub const HEADER_TTL: Duration = Duration::from_secs(60);
pub const CHAIN_TTL: Duration = Duration::from_secs(5 * 60);

/// Read-mostly map whose entries expire `ttl` after insertion.
///
/// `get` hands out clones so callers can mutate their copy freely.
/// Expired entries are ignored on read. Writes sweep them out at most once
/// per `ttl`, so the map never holds more than two TTL windows of keys.
#[derive(Debug)]
pub struct TtlCache<V> {
    ttl: Duration,
    inner: RwLock<Entries<V>>,
}

#[derive(Debug)]
struct Entries<V> {
    map: HashMap<String, (V, Instant)>,
    last_sweep: Instant,
}

impl<V> Entries<V> {
    fn sweep(&mut self, ttl: Duration) -> usize {
        let before = self.map.len();
        self.map.retain(|_, (_, created)| created.elapsed() < ttl);
        self.last_sweep = Instant::now();
        before - self.map.len()
    }

    fn store(&mut self, ttl: Duration, key: String, value: V) {
        if self.last_sweep.elapsed() >= ttl {
            self.sweep(ttl);
        }
        self.map.insert(key, (value, Instant::now()));
    }
}

impl<V: Clone> TtlCache<V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            inner: RwLock::new(Entries {
                map: HashMap::new(),
                last_sweep: Instant::now(),
            }),
        }
    }

    pub fn get(&self, key: &str) -> Option<V> {
        let inner = self.inner.read();
        inner
            .map
            .get(key)
            .filter(|(_, created)| created.elapsed() < self.ttl)
            .map(|(value, _)| value.clone())
    }

    pub fn insert(&self, key: impl Into<String>, value: V) {
        self.inner.write().store(self.ttl, key.into(), value);
    }

    /// Returns the cached value or stores and returns a fresh one.
    pub fn get_or_insert_with(&self, key: &str, make: impl FnOnce() -> V) -> V {
        if let Some(v) = self.get(key) {
            return v;
        }

        let mut inner = self.inner.write();
        if let Some((v, created)) = inner.map.get(key) {
            if created.elapsed() < self.ttl {
                return v.clone();
            }
        }
        let value = make();
        inner.store(self.ttl, key.to_string(), value.clone());
        value
    }

    /// Drops expired entries now. Returns how many went.
    pub fn purge(&self) -> usize {
        self.inner.write().sweep(self.ttl)
    }

    /// Entries held, expired ones not yet swept included.
    pub fn len(&self) -> usize {
        self.inner.read().map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
