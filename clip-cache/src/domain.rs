use serde::Serialize;
pub use shared::config::EvictionPolicy;
use shared::config::Config;
use std::time::Duration;
use tokio::time::Instant;

pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_FETCH_TTL: Duration = Duration::from_secs(60);
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// A stored value together with the moment it was written and how long it
/// stays visible. The TTL is fixed at insertion and never refreshed by reads.
#[derive(Clone, Debug)]
pub struct CacheEntry<V> {
    pub value: V,
    pub stored_at: Instant,
    pub ttl: Duration,
}

impl<V> CacheEntry<V> {
    pub fn new(value: V, ttl: Duration) -> Self {
        Self {
            value,
            stored_at: Instant::now(),
            ttl,
        }
    }

    /// Visible while `now - stored_at <= ttl`.
    pub fn is_fresh_at(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.stored_at) <= self.ttl
    }

    pub fn is_fresh(&self) -> bool {
        self.is_fresh_at(Instant::now())
    }

    pub fn remaining_ttl(&self) -> Duration {
        self.ttl
            .saturating_sub(Instant::now().saturating_duration_since(self.stored_at))
    }
}

/// How the store bounds its memory.
///
/// `Unbounded` relies on TTL expiry plus the periodic sweep alone; a flood of
/// distinct keys written once and never read again grows the map until the
/// next sweep. `Bounded` caps the entry count and evicts in the given order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum CapacityPolicy {
    #[default]
    Unbounded,
    Bounded {
        max_entries: u64,
        eviction: EvictionPolicy,
    },
}

#[derive(Clone, Debug)]
pub struct CacheConfig {
    pub name: String,              // used in logs and events
    pub default_ttl: Duration,     // applied by set() when no ttl is given
    pub fetch_ttl: Duration,       // applied by read-through when no ttl is given
    pub sweep_interval: Duration,  // period of the cleanup task
    pub capacity: CapacityPolicy,  // default: unbounded
    pub single_flight: bool,       // collapse concurrent misses on one key
}

impl CacheConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    pub fn with_fetch_ttl(mut self, ttl: Duration) -> Self {
        self.fetch_ttl = ttl;
        self
    }

    pub fn with_capacity(mut self, capacity: CapacityPolicy) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn with_single_flight(mut self, enabled: bool) -> Self {
        self.single_flight = enabled;
        self
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            name: "clip-cache".to_string(),
            default_ttl: DEFAULT_TTL,
            fetch_ttl: DEFAULT_FETCH_TTL,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            capacity: CapacityPolicy::Unbounded,
            single_flight: true,
        }
    }
}

impl From<&Config> for CacheConfig {
    fn from(config: &Config) -> Self {
        let capacity = match config.max_entries {
            Some(max_entries) => CapacityPolicy::Bounded {
                max_entries,
                eviction: config.eviction,
            },
            None => CapacityPolicy::Unbounded,
        };

        Self {
            name: config.name.clone(),
            default_ttl: config.default_ttl,
            fetch_ttl: config.fetch_ttl,
            sweep_interval: config.sweep_interval,
            capacity,
            single_flight: config.single_flight,
        }
    }
}

/// Point-in-time counters for a read-through cache.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub fetches: u64,
    pub coalesced: u64,
    pub fetch_errors: u64,
    pub entries: usize,
}

impl CacheStats {
    pub fn hit_ratio(&self) -> f64 {
        let lookups = self.hits + self.misses;
        if lookups == 0 {
            0.0
        } else {
            self.hits as f64 / lookups as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_entry_fresh_until_ttl_inclusive() {
        let entry = CacheEntry::new("v", Duration::from_millis(100));
        let stored = entry.stored_at;

        assert!(entry.is_fresh_at(stored));
        assert!(entry.is_fresh_at(stored + Duration::from_millis(100)));
        assert!(!entry.is_fresh_at(stored + Duration::from_millis(101)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_remaining_ttl_counts_down() {
        let entry = CacheEntry::new(1u8, Duration::from_secs(5));
        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(entry.remaining_ttl(), Duration::from_secs(3));

        tokio::time::advance(Duration::from_secs(10)).await;
        assert_eq!(entry.remaining_ttl(), Duration::ZERO);
    }

    #[test]
    fn test_config_from_env_settings() {
        let settings = Config {
            max_entries: Some(50),
            eviction: EvictionPolicy::Lru,
            single_flight: false,
            ..Config::default()
        };

        let config = CacheConfig::from(&settings);
        assert_eq!(
            config.capacity,
            CapacityPolicy::Bounded {
                max_entries: 50,
                eviction: EvictionPolicy::Lru
            }
        );
        assert!(!config.single_flight);
        assert_eq!(config.default_ttl, DEFAULT_TTL);
    }

    #[test]
    fn test_hit_ratio() {
        let stats = CacheStats {
            hits: 3,
            misses: 1,
            ..CacheStats::default()
        };
        assert!((stats.hit_ratio() - 0.75).abs() < f64::EPSILON);
        assert_eq!(CacheStats::default().hit_ratio(), 0.0);
    }
}
