#![deny(clippy::all)]

use crate::domain::CacheConfig;
use std::sync::Arc;
use std::time::Duration;

// Ports are the pluggable extension points for underlying store implementations

/// Port for creating a store from configuration
/// This allows different storage backends to be plugged in
pub trait StorageFactory<V>: Send + Sync + 'static {
    /// Create a new cache store from configuration
    fn create_from_config(&self, config: &CacheConfig) -> Arc<dyn CacheStore<V>>;
}

/// Port for keyed TTL storage.
///
/// Every operation is synchronous and infallible: a miss is `None`, never an
/// error. Implementations must be safe to call from many tasks at once.
pub trait CacheStore<V>: Send + Sync + 'static {
    /// Insert or overwrite `key`. `None` applies the store's default TTL.
    fn set(&self, key: &str, value: V, ttl: Option<Duration>);

    /// Fresh value for `key`, if any. A stale entry found here is removed.
    fn get(&self, key: &str) -> Option<V>;

    /// Remove `key`; returns whether an entry was present.
    fn delete(&self, key: &str) -> bool;

    /// Remove everything; returns how many entries were dropped.
    fn clear(&self) -> usize;

    /// Remove every stale entry; returns how many were dropped.
    fn cleanup(&self) -> usize;

    /// Remove every entry whose key starts with `prefix`.
    fn invalidate_prefix(&self, prefix: &str) -> usize;

    /// Whether `key` holds a fresh value. Does not remove stale entries.
    fn contains(&self, key: &str) -> bool;

    /// Number of entries currently held, stale ones included.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn default_ttl(&self) -> Duration;
}
