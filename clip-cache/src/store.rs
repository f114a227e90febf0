use crate::domain::{CacheConfig, CacheEntry, DEFAULT_TTL};
use crate::events::{
    publish, now_timestamp, CacheEvent, EntryDeletedEvent, EntryExpiredEvent, EntryStoredEvent,
    StoreClearedEvent, StoreSweptEvent,
};
use crate::ports::CacheStore;
use dashmap::DashMap;
use std::fmt::Debug;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::Instant;

/// DashMap-backed store with per-entry TTL and lazy expiration.
///
/// Stale entries are dropped when a read finds them, or by [`CacheStore::cleanup`]
/// which is meant to be driven by the sweeper. No capacity bound is applied.
pub struct TtlStore<V> {
    name: String,
    default_ttl: Duration,
    entries: DashMap<String, CacheEntry<V>>,
    event_broadcaster: Option<broadcast::Sender<CacheEvent>>,
}

impl<V> TtlStore<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub fn new(name: impl Into<String>, default_ttl: Duration) -> Self {
        Self {
            name: name.into(),
            default_ttl,
            entries: DashMap::new(),
            event_broadcaster: None,
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.name.clone(), config.default_ttl)
    }

    pub fn with_event_broadcaster(mut self, broadcaster: broadcast::Sender<CacheEvent>) -> Self {
        self.event_broadcaster = Some(broadcaster);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Remaining lifetime of a fresh entry.
    pub fn ttl_of(&self, key: &str) -> Option<Duration> {
        let now = Instant::now();
        self.entries
            .get(key)
            .filter(|entry| entry.is_fresh_at(now))
            .map(|entry| entry.remaining_ttl())
    }

    fn emit(&self, event: CacheEvent) {
        publish(self.event_broadcaster.as_ref(), event);
    }
}

impl<V> Default for TtlStore<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new("clip-cache", DEFAULT_TTL)
    }
}

impl<V> CacheStore<V> for TtlStore<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn set(&self, key: &str, value: V, ttl: Option<Duration>) {
        let ttl = ttl.unwrap_or(self.default_ttl);
        self.entries
            .insert(key.to_owned(), CacheEntry::new(value, ttl));

        tracing::trace!("[{}] stored '{}' for {:?}", self.name, key, ttl);
        self.emit(CacheEvent::Stored(EntryStoredEvent {
            cache_name: self.name.clone(),
            key: key.to_owned(),
            ttl_ms: ttl.as_millis() as u64,
            timestamp: now_timestamp(),
        }));
    }

    fn get(&self, key: &str) -> Option<V> {
        let now = Instant::now();

        match self.entries.get(key) {
            None => return None,
            Some(entry) if entry.is_fresh_at(now) => return Some(entry.value.clone()),
            Some(_) => {}
        }

        // Only drop it if it is still stale; a writer may have replaced it
        // between releasing the read guard and taking the write lock.
        if self
            .entries
            .remove_if(key, |_, entry| !entry.is_fresh_at(now))
            .is_some()
        {
            tracing::trace!("[{}] expired '{}' on read", self.name, key);
            self.emit(CacheEvent::Expired(EntryExpiredEvent {
                cache_name: self.name.clone(),
                key: key.to_owned(),
                timestamp: now_timestamp(),
            }));
        }
        None
    }

    fn delete(&self, key: &str) -> bool {
        let existed = self.entries.remove(key).is_some();
        if existed {
            tracing::debug!("[{}] deleted '{}'", self.name, key);
            self.emit(CacheEvent::Deleted(EntryDeletedEvent {
                cache_name: self.name.clone(),
                key: key.to_owned(),
                timestamp: now_timestamp(),
            }));
        }
        existed
    }

    fn clear(&self) -> usize {
        let mut removed = 0;
        self.entries.retain(|_, _| {
            removed += 1;
            false
        });

        tracing::debug!("[{}] cleared {} entries", self.name, removed);
        self.emit(CacheEvent::Cleared(StoreClearedEvent {
            cache_name: self.name.clone(),
            removed,
            timestamp: now_timestamp(),
        }));
        removed
    }

    fn cleanup(&self) -> usize {
        let now = Instant::now();
        let mut removed = 0;
        self.entries.retain(|_, entry| {
            let fresh = entry.is_fresh_at(now);
            if !fresh {
                removed += 1;
            }
            fresh
        });

        if removed > 0 {
            self.emit(CacheEvent::Swept(StoreSweptEvent {
                cache_name: self.name.clone(),
                removed,
                timestamp: now_timestamp(),
            }));
        }
        removed
    }

    fn invalidate_prefix(&self, prefix: &str) -> usize {
        let mut removed = Vec::new();
        self.entries.retain(|key, _| {
            if key.starts_with(prefix) {
                removed.push(key.clone());
                false
            } else {
                true
            }
        });

        tracing::debug!(
            "[{}] invalidated {} entries under '{}'",
            self.name,
            removed.len(),
            prefix
        );
        let count = removed.len();
        for key in removed {
            self.emit(CacheEvent::Deleted(EntryDeletedEvent {
                cache_name: self.name.clone(),
                key,
                timestamp: now_timestamp(),
            }));
        }
        count
    }

    fn contains(&self, key: &str) -> bool {
        self.entries
            .get(key)
            .is_some_and(|entry| entry.is_fresh())
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn default_ttl(&self) -> Duration {
        self.default_ttl
    }
}

impl<V> Debug for TtlStore<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TtlStore")
            .field("name", &self.name)
            .field("default_ttl", &self.default_ttl)
            .field("entry_count", &self.entries.len())
            .finish()
    }
}
