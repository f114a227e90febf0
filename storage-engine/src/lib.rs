pub mod moka_cache;

use clip_cache::events::CacheEvent;
use clip_cache::{CacheConfig, CacheStore, CapacityPolicy, StorageFactory, TtlStore};
use std::sync::Arc;
use tokio::sync::broadcast;

pub use moka_cache::MokaStore;

/// Picks the store implementation for a [`CacheConfig`]: the DashMap
/// [`TtlStore`] when unbounded, [`MokaStore`] when an entry cap is set.
#[derive(Clone, Debug, Default)]
pub struct DefaultStorageFactory {
    events: Option<broadcast::Sender<CacheEvent>>,
}

impl DefaultStorageFactory {
    /// Stores built by this factory publish their [`CacheEvent`]s on `events`.
    pub fn with_events(events: broadcast::Sender<CacheEvent>) -> Self {
        Self {
            events: Some(events),
        }
    }
}

impl<V> StorageFactory<V> for DefaultStorageFactory
where
    V: Clone + Send + Sync + 'static,
{
    fn create_from_config(&self, config: &CacheConfig) -> Arc<dyn CacheStore<V>> {
        match config.capacity {
            CapacityPolicy::Unbounded => {
                tracing::info!(
                    "Cache '{}': unbounded store, default TTL {:?}",
                    config.name,
                    config.default_ttl
                );
                let store: TtlStore<V> = TtlStore::from_config(config);
                match &self.events {
                    Some(events) => Arc::new(store.with_event_broadcaster(events.clone())),
                    None => Arc::new(store),
                }
            }
            CapacityPolicy::Bounded {
                max_entries,
                eviction,
            } => {
                tracing::info!(
                    "Cache '{}': bounded store, {} entries max, {:?} eviction, default TTL {:?}",
                    config.name,
                    max_entries,
                    eviction,
                    config.default_ttl
                );
                Arc::new(MokaStore::new(
                    config.name.clone(),
                    max_entries,
                    eviction,
                    config.default_ttl,
                    self.events.clone(),
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clip_cache::EvictionPolicy;
    use std::time::Duration;

    #[test]
    fn test_factory_builds_store_for_each_policy() {
        let unbounded: Arc<dyn CacheStore<String>> =
            DefaultStorageFactory::default().create_from_config(&CacheConfig::new("unbounded"));
        let bounded: Arc<dyn CacheStore<String>> = DefaultStorageFactory::default().create_from_config(
            &CacheConfig::new("bounded")
                .with_default_ttl(Duration::from_secs(5))
                .with_capacity(CapacityPolicy::Bounded {
                    max_entries: 100,
                    eviction: EvictionPolicy::Lru,
                }),
        );

        for store in [&unbounded, &bounded] {
            store.set("k", "v".to_string(), None);
            assert_eq!(store.get("k"), Some("v".to_string()));
            assert!(store.delete("k"));
            assert_eq!(store.get("k"), None);
        }

        assert_eq!(bounded.default_ttl(), Duration::from_secs(5));
        assert_eq!(unbounded.default_ttl(), clip_cache::domain::DEFAULT_TTL);
    }

    #[test]
    fn test_factory_attaches_event_channel() {
        let (tx, mut rx) = broadcast::channel(16);
        let factory = DefaultStorageFactory::with_events(tx);
        let bounded_config = CacheConfig::new("bounded").with_capacity(CapacityPolicy::Bounded {
            max_entries: 10,
            eviction: EvictionPolicy::TinyLfu,
        });

        let unbounded: Arc<dyn CacheStore<String>> =
            factory.create_from_config(&CacheConfig::new("unbounded"));
        let bounded: Arc<dyn CacheStore<String>> = factory.create_from_config(&bounded_config);

        unbounded.set("dashboard:CREATOR:u1", "a".to_string(), None);
        bounded.set("dashboard:CREATOR:u2", "b".to_string(), None);

        let first = rx.try_recv().unwrap();
        assert_eq!(first.cache_name(), "unbounded");
        assert_eq!(first.key(), Some("dashboard:CREATOR:u1"));
        let second = rx.try_recv().unwrap();
        assert_eq!(second.cache_name(), "bounded");
        assert_eq!(second.key(), Some("dashboard:CREATOR:u2"));
    }
}
