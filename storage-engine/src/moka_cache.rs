use clip_cache::events::{
    publish, now_timestamp, CacheEvent, EntryDeletedEvent, EntryExpiredEvent, EntryStoredEvent,
    StoreClearedEvent, StoreSweptEvent,
};
use clip_cache::{CacheStore, EvictionPolicy};
use moka::Expiry;
use moka::notification::RemovalCause;
use moka::sync::Cache;
use std::fmt::Debug;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;

#[derive(Clone)]
struct Timed<V> {
    value: V,
    ttl: Duration,
}

/// Expires each entry after the TTL it was written with. Overwrites restart
/// the clock with the new TTL; reads leave it alone.
struct PerEntryTtl;

impl<V> Expiry<String, Timed<V>> for PerEntryTtl {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &Timed<V>,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &Timed<V>,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// Moka-based store with per-entry TTL and a hard entry cap.
/// Lock-free and concurrent; evicts in LRU or TinyLFU order once full.
///
/// Expirations surface as events when moka runs its maintenance, which
/// `cleanup`, `clear` and `len` trigger.
pub struct MokaStore<V>
where
    V: Clone + Send + Sync + 'static,
{
    name: String,
    default_ttl: Duration,
    cache: Cache<String, Timed<V>>,
    event_broadcaster: Option<broadcast::Sender<CacheEvent>>,
}

impl<V> MokaStore<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub fn new(
        name: String,
        max_entries: u64,
        eviction: EvictionPolicy,
        default_ttl: Duration,
        event_broadcaster: Option<broadcast::Sender<CacheEvent>>,
    ) -> Self {
        let policy = match eviction {
            EvictionPolicy::Lru => moka::policy::EvictionPolicy::lru(),
            EvictionPolicy::TinyLfu => moka::policy::EvictionPolicy::tiny_lfu(),
        };

        let listener_name = name.clone();
        let listener_events = event_broadcaster.clone();
        let cache: Cache<String, Timed<V>> = Cache::builder()
            .name(&name)
            .max_capacity(max_entries)
            .eviction_policy(policy)
            .expire_after(PerEntryTtl)
            .eviction_listener(move |key: Arc<String>, _value, cause| match cause {
                RemovalCause::Size => {
                    tracing::debug!("[{}] evicted '{}' at capacity", listener_name, key);
                }
                RemovalCause::Expired => publish(
                    listener_events.as_ref(),
                    CacheEvent::Expired(EntryExpiredEvent {
                        cache_name: listener_name.clone(),
                        key: key.to_string(),
                        timestamp: now_timestamp(),
                    }),
                ),
                // Explicit removals publish from the calling method
                _ => {}
            })
            .build();

        Self {
            name,
            default_ttl,
            cache,
            event_broadcaster,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn emit(&self, event: CacheEvent) {
        publish(self.event_broadcaster.as_ref(), event);
    }

    fn emit_deleted(&self, key: &str) {
        self.emit(CacheEvent::Deleted(EntryDeletedEvent {
            cache_name: self.name.clone(),
            key: key.to_owned(),
            timestamp: now_timestamp(),
        }));
    }
}

impl<V> CacheStore<V> for MokaStore<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn set(&self, key: &str, value: V, ttl: Option<Duration>) {
        let ttl = ttl.unwrap_or(self.default_ttl);
        self.cache.insert(key.to_owned(), Timed { value, ttl });
        self.emit(CacheEvent::Stored(EntryStoredEvent {
            cache_name: self.name.clone(),
            key: key.to_owned(),
            ttl_ms: ttl.as_millis() as u64,
            timestamp: now_timestamp(),
        }));
    }

    fn get(&self, key: &str) -> Option<V> {
        // Either never stored, evicted, or past its TTL
        self.cache.get(key).map(|timed| timed.value)
    }

    fn delete(&self, key: &str) -> bool {
        let existed = self.cache.remove(key).is_some();
        if existed {
            self.emit_deleted(key);
        }
        existed
    }

    fn clear(&self) -> usize {
        self.cache.run_pending_tasks();
        let removed = self.cache.entry_count() as usize;
        self.cache.invalidate_all();
        self.cache.run_pending_tasks();

        tracing::debug!("[{}] cleared {} entries", self.name, removed);
        self.emit(CacheEvent::Cleared(StoreClearedEvent {
            cache_name: self.name.clone(),
            removed,
            timestamp: now_timestamp(),
        }));
        removed
    }

    fn cleanup(&self) -> usize {
        let before = self.cache.entry_count();
        self.cache.run_pending_tasks();
        let removed = before.saturating_sub(self.cache.entry_count()) as usize;

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
        let doomed: Vec<Arc<String>> = self
            .cache
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .map(|(key, _)| key)
            .collect();

        doomed
            .iter()
            .filter(|key| self.cache.remove(key.as_str()).is_some())
            .inspect(|key| self.emit_deleted(key.as_str()))
            .count()
    }

    fn contains(&self, key: &str) -> bool {
        self.cache.contains_key(key)
    }

    /// Entry count after applying pending maintenance, so evictions and
    /// expirations are reflected.
    fn len(&self) -> usize {
        self.cache.run_pending_tasks();
        self.cache.entry_count() as usize
    }

    fn default_ttl(&self) -> Duration {
        self.default_ttl
    }
}

impl<V> Debug for MokaStore<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MokaStore")
            .field("name", &self.name)
            .field("entry_count", &self.cache.entry_count())
            .field("weighted_size", &self.cache.weighted_size())
            .finish()
    }
}
