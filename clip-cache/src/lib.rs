//! In-process TTL response cache.
//!
//! [`store::TtlStore`] keeps short-lived values keyed by string, each with its
//! own deadline. [`read_through::ReadThrough`] wraps async fetches with
//! read-through caching and single-flight de-duplication, and
//! [`sweeper::spawn_sweeper`] purges stale entries on a timer.

pub mod domain;
pub mod events;
pub mod keys;
pub mod ports;
pub mod read_through;
pub mod store;
pub mod sweeper;

pub use domain::{CacheConfig, CacheEntry, CacheStats, CapacityPolicy, EvictionPolicy};
pub use ports::{CacheStore, StorageFactory};
pub use read_through::ReadThrough;
pub use store::TtlStore;
pub use sweeper::spawn_sweeper;
