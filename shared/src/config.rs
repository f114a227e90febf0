use std::time::Duration;
use tracing::warn;

/// Order in which a bounded store evicts once full.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EvictionPolicy {
    Lru,
    TinyLfu,
}

impl TryFrom<&str> for EvictionPolicy {
    type Error = &'static str;

    fn try_from(value: &str) -> std::result::Result<Self, Self::Error> {
        match value.trim().to_ascii_lowercase().as_str() {
            "lru" => Ok(EvictionPolicy::Lru),
            "tinylfu" | "tiny_lfu" | "tiny-lfu" => Ok(EvictionPolicy::TinyLfu),
            _ => Err("Invalid eviction policy value"),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Config {
    pub name: String,
    pub default_ttl: Duration,
    pub fetch_ttl: Duration,
    pub sweep_interval: Duration,
    pub max_entries: Option<u64>,
    pub eviction: EvictionPolicy,
    pub single_flight: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            name: Self::DEFAULT_NAME.to_string(),
            default_ttl: Duration::from_millis(Self::DEFAULT_TTL_MS),
            fetch_ttl: Duration::from_millis(Self::DEFAULT_FETCH_TTL_MS),
            sweep_interval: Duration::from_millis(Self::DEFAULT_SWEEP_INTERVAL_MS),
            max_entries: None,
            eviction: EvictionPolicy::TinyLfu,
            single_flight: true,
        }
    }
}

impl Config {
    const DEFAULT_NAME: &str = "clip-cache";
    const DEFAULT_TTL_MS: u64 = 5 * 60 * 1000;
    const DEFAULT_FETCH_TTL_MS: u64 = 60 * 1000;
    const DEFAULT_SWEEP_INTERVAL_MS: u64 = 60 * 1000;

    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build a config from an arbitrary variable source. Invalid values are
    /// logged and replaced by their defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let millis = |var: &str, default: Duration| -> Duration {
            match lookup(var) {
                None => default,
                Some(raw) => match raw.trim().parse::<u64>() {
                    Ok(ms) => Duration::from_millis(ms),
                    Err(_) => {
                        warn!("{var}={raw:?} is not a millisecond count, using {default:?}");
                        default
                    }
                },
            }
        };

        let sweep_interval = match millis("CLIP_CACHE_SWEEP_INTERVAL_MS", defaults.sweep_interval) {
            d if d.is_zero() => {
                warn!("CLIP_CACHE_SWEEP_INTERVAL_MS must be positive, using default");
                defaults.sweep_interval
            }
            d => d,
        };

        let max_entries = lookup("CLIP_CACHE_MAX_ENTRIES").and_then(|raw| {
            match raw.trim().parse::<u64>() {
                Ok(0) => {
                    warn!("CLIP_CACHE_MAX_ENTRIES=0 ignored, cache stays unbounded");
                    None
                }
                Ok(n) => Some(n),
                Err(_) => {
                    warn!("CLIP_CACHE_MAX_ENTRIES={raw:?} is not a number, cache stays unbounded");
                    None
                }
            }
        });

        let eviction = match lookup("CLIP_CACHE_EVICTION") {
            None => defaults.eviction,
            Some(raw) => EvictionPolicy::try_from(raw.as_str()).unwrap_or_else(|_| {
                warn!("unknown eviction policy '{raw}', using tinylfu");
                defaults.eviction
            }),
        };

        let single_flight = match lookup("CLIP_CACHE_SINGLE_FLIGHT") {
            None => defaults.single_flight,
            Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                other => {
                    warn!("CLIP_CACHE_SINGLE_FLIGHT={other:?} is not a boolean, using true");
                    defaults.single_flight
                }
            },
        };

        Self {
            name: lookup("CLIP_CACHE_NAME").unwrap_or(defaults.name),
            default_ttl: millis("CLIP_CACHE_DEFAULT_TTL_MS", defaults.default_ttl),
            fetch_ttl: millis("CLIP_CACHE_FETCH_TTL_MS", defaults.fetch_ttl),
            sweep_interval,
            max_entries,
            eviction,
            single_flight,
        }
    }

    pub fn is_bounded(&self) -> bool {
        self.max_entries.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| vars.get(name).cloned()
    }

    #[test]
    fn test_defaults_when_nothing_set() {
        let config = Config::from_lookup(|_| None);
        assert_eq!(config.name, "clip-cache");
        assert_eq!(config.default_ttl, Duration::from_secs(300));
        assert_eq!(config.fetch_ttl, Duration::from_secs(60));
        assert_eq!(config.sweep_interval, Duration::from_secs(60));
        assert_eq!(config.max_entries, None);
        assert_eq!(config.eviction, EvictionPolicy::TinyLfu);
        assert!(config.single_flight);
        assert!(!config.is_bounded());
    }

    #[test]
    fn test_reads_all_variables() {
        let config = Config::from_lookup(lookup_from(&[
            ("CLIP_CACHE_NAME", "dashboards"),
            ("CLIP_CACHE_DEFAULT_TTL_MS", "1000"),
            ("CLIP_CACHE_FETCH_TTL_MS", "250"),
            ("CLIP_CACHE_SWEEP_INTERVAL_MS", "500"),
            ("CLIP_CACHE_MAX_ENTRIES", "10000"),
            ("CLIP_CACHE_EVICTION", "LRU"),
            ("CLIP_CACHE_SINGLE_FLIGHT", "off"),
        ]));

        assert_eq!(config.name, "dashboards");
        assert_eq!(config.default_ttl, Duration::from_millis(1000));
        assert_eq!(config.fetch_ttl, Duration::from_millis(250));
        assert_eq!(config.sweep_interval, Duration::from_millis(500));
        assert_eq!(config.max_entries, Some(10000));
        assert_eq!(config.eviction, EvictionPolicy::Lru);
        assert!(!config.single_flight);
        assert!(config.is_bounded());
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = Config::from_lookup(lookup_from(&[
            ("CLIP_CACHE_DEFAULT_TTL_MS", "five minutes"),
            ("CLIP_CACHE_SWEEP_INTERVAL_MS", "0"),
            ("CLIP_CACHE_MAX_ENTRIES", "lots"),
            ("CLIP_CACHE_EVICTION", "fifo"),
            ("CLIP_CACHE_SINGLE_FLIGHT", "maybe"),
        ]));

        assert_eq!(config.default_ttl, Duration::from_secs(300));
        assert_eq!(config.sweep_interval, Duration::from_secs(60));
        assert_eq!(config.max_entries, None);
        assert_eq!(config.eviction, EvictionPolicy::TinyLfu);
        assert!(config.single_flight);
    }

    #[test]
    fn test_eviction_policy_parse() {
        assert_eq!(EvictionPolicy::try_from("LRU"), Ok(EvictionPolicy::Lru));
        assert_eq!(EvictionPolicy::try_from(" tiny-lfu "), Ok(EvictionPolicy::TinyLfu));
        assert!(EvictionPolicy::try_from("sieve").is_err());
    }

    #[test]
    fn test_zero_max_entries_means_unbounded() {
        let config = Config::from_lookup(lookup_from(&[("CLIP_CACHE_MAX_ENTRIES", "0")]));
        assert_eq!(config.max_entries, None);
    }
}
