use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CacheEvent {
    Stored(EntryStoredEvent),
    Deleted(EntryDeletedEvent),
    Expired(EntryExpiredEvent),
    Cleared(StoreClearedEvent),
    Swept(StoreSweptEvent),
}

impl CacheEvent {
    pub fn cache_name(&self) -> &str {
        match self {
            CacheEvent::Stored(e) => &e.cache_name,
            CacheEvent::Deleted(e) => &e.cache_name,
            CacheEvent::Expired(e) => &e.cache_name,
            CacheEvent::Cleared(e) => &e.cache_name,
            CacheEvent::Swept(e) => &e.cache_name,
        }
    }

    /// Key the event refers to, if it concerns a single entry.
    pub fn key(&self) -> Option<&str> {
        match self {
            CacheEvent::Stored(e) => Some(&e.key),
            CacheEvent::Deleted(e) => Some(&e.key),
            CacheEvent::Expired(e) => Some(&e.key),
            CacheEvent::Cleared(_) | CacheEvent::Swept(_) => None,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            CacheEvent::Stored(_) => "stored",
            CacheEvent::Deleted(_) => "deleted",
            CacheEvent::Expired(_) => "expired",
            CacheEvent::Cleared(_) => "cleared",
            CacheEvent::Swept(_) => "swept",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryStoredEvent {
    pub cache_name: String,
    pub key: String,
    pub ttl_ms: u64,
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryDeletedEvent {
    pub cache_name: String,
    pub key: String,
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryExpiredEvent {
    pub cache_name: String,
    pub key: String,
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreClearedEvent {
    pub cache_name: String,
    pub removed: usize,
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreSweptEvent {
    pub cache_name: String,
    pub removed: usize,
    pub timestamp: i64,
}

/// Milliseconds since the UNIX epoch
pub fn now_timestamp() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Sends an event if anyone is listening. A channel with no receivers is not
/// an error for the cache.
pub fn publish(broadcaster: Option<&broadcast::Sender<CacheEvent>>, event: CacheEvent) {
    let Some(broadcaster) = broadcaster else {
        return;
    };

    let kind = event.kind();
    match broadcaster.send(event) {
        Ok(subscriber_count) => {
            tracing::trace!("Broadcasted {kind} event to {subscriber_count} subscriber(s)");
        }
        Err(_) => {
            tracing::trace!("No subscribers for {kind} event");
        }
    }
}
