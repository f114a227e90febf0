use crate::domain::{CacheConfig, CacheStats};
use crate::ports::CacheStore;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures::future::{BoxFuture, FutureExt, Shared};
use std::fmt::Debug;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::oneshot;

/// Resolves to `None` only when the fetch task panicked before producing a result.
type Flight<V, E> = Shared<BoxFuture<'static, Option<Result<V, E>>>>;

#[derive(Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    fetches: AtomicU64,
    coalesced: AtomicU64,
    fetch_errors: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// A key's slot in the in-flight table, owned by the task running its fetch.
///
/// [`FlightSlot::complete`] vacates the slot before waking the waiters. If the
/// fetch panics instead, `Drop` vacates it and the waiters see a closed channel.
struct FlightSlot<V, E> {
    key: String,
    in_flight: Arc<DashMap<String, Flight<V, E>>>,
    sender: Option<oneshot::Sender<Result<V, E>>>,
}

impl<V, E> FlightSlot<V, E> {
    fn complete(mut self, result: Result<V, E>) {
        self.in_flight.remove(&self.key);
        if let Some(sender) = self.sender.take() {
            // Every waiter may be gone; the result is already stored.
            let _ = sender.send(result);
        }
    }
}

impl<V, E> Drop for FlightSlot<V, E> {
    fn drop(&mut self) {
        if self.sender.is_some() {
            self.in_flight.remove(&self.key);
        }
    }
}

/// Read-through cache in front of a [`CacheStore`].
///
/// A hit returns the stored value. A miss runs the caller's fetch, stores a
/// successful result and returns it; a failure is returned as-is and nothing
/// is stored, so the next call fetches again.
///
/// With single-flight enabled (the default) concurrent misses on the same key
/// join one in-progress fetch and all receive its result, success or failure.
/// The fetch runs on its own task, so it completes and caches its result even
/// if every caller waiting on it is dropped. With single-flight disabled every
/// missing caller fetches on its own and the last write to land wins.
pub struct ReadThrough<V, E> {
    store: Arc<dyn CacheStore<V>>,
    in_flight: Arc<DashMap<String, Flight<V, E>>>,
    fetch_ttl: Duration,
    single_flight: bool,
    counters: Arc<Counters>,
}

impl<V, E> Clone for ReadThrough<V, E> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            in_flight: self.in_flight.clone(),
            fetch_ttl: self.fetch_ttl,
            single_flight: self.single_flight,
            counters: self.counters.clone(),
        }
    }
}

impl<V, E> ReadThrough<V, E>
where
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    pub fn new(store: Arc<dyn CacheStore<V>>, config: &CacheConfig) -> Self {
        Self {
            store,
            in_flight: Arc::new(DashMap::new()),
            fetch_ttl: config.fetch_ttl,
            single_flight: config.single_flight,
            counters: Arc::new(Counters::default()),
        }
    }

    pub fn store(&self) -> &Arc<dyn CacheStore<V>> {
        &self.store
    }

    /// Return the fresh value for `key`, or run `fetch` and cache what it
    /// produces for `ttl` (the configured fetch TTL when `None`).
    ///
    /// Must be called from within a Tokio runtime when single-flight is on.
    ///
    /// # Panics
    ///
    /// Panics if the shared fetch for `key` panicked.
    pub async fn get_or_fetch<F, Fut>(
        &self,
        key: &str,
        ttl: Option<Duration>,
        fetch: F,
    ) -> Result<V, E>
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
    {
        if let Some(value) = self.store.get(key) {
            Counters::bump(&self.counters.hits);
            return Ok(value);
        }

        let ttl = ttl.unwrap_or(self.fetch_ttl);

        if !self.single_flight {
            Counters::bump(&self.counters.misses);
            return self.fetch_and_store(key, ttl, fetch()).await;
        }

        let (flight, sender) = match self.in_flight.entry(key.to_owned()) {
            Entry::Occupied(occupied) => {
                Counters::bump(&self.counters.misses);
                Counters::bump(&self.counters.coalesced);
                tracing::debug!("joining in-flight fetch for '{key}'");
                (occupied.get().clone(), None)
            }
            Entry::Vacant(vacant) => {
                // A flight for this key may have finished between our miss and
                // taking the slot; its result is in the store by now.
                if let Some(value) = self.store.get(key) {
                    Counters::bump(&self.counters.hits);
                    return Ok(value);
                }
                Counters::bump(&self.counters.misses);
                let (sender, receiver) = oneshot::channel();
                let flight: Flight<V, E> = receiver.map(Result::ok).boxed().shared();
                vacant.insert(flight.clone());
                (flight, Some(sender))
            }
        };

        // The table's shard lock is released here, so `fetch` may call back
        // into this cache.
        if let Some(sender) = sender {
            self.launch(key.to_owned(), ttl, sender, fetch);
        }

        match flight.await {
            Some(result) => result,
            None => panic!("fetch for '{key}' panicked"),
        }
    }

    /// Drop the cached value for `key`. Does not affect a fetch in progress.
    pub fn invalidate(&self, key: &str) -> bool {
        self.store.delete(key)
    }

    pub fn invalidate_prefix(&self, prefix: &str) -> usize {
        self.store.invalidate_prefix(prefix)
    }

    /// Keys with a fetch currently in progress.
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            fetches: self.counters.fetches.load(Ordering::Relaxed),
            coalesced: self.counters.coalesced.load(Ordering::Relaxed),
            fetch_errors: self.counters.fetch_errors.load(Ordering::Relaxed),
            entries: self.store.len(),
        }
    }

    async fn fetch_and_store<Fut>(&self, key: &str, ttl: Duration, fut: Fut) -> Result<V, E>
    where
        Fut: Future<Output = Result<V, E>>,
    {
        Counters::bump(&self.counters.fetches);
        match fut.await {
            Ok(value) => {
                self.store.set(key, value.clone(), Some(ttl));
                Ok(value)
            }
            Err(err) => {
                Counters::bump(&self.counters.fetch_errors);
                Err(err)
            }
        }
    }

    /// Runs the fetch for a newly registered flight on its own task. The task
    /// stores a successful result, vacates the slot and then wakes the waiters.
    fn launch<F, Fut>(
        &self,
        key: String,
        ttl: Duration,
        sender: oneshot::Sender<Result<V, E>>,
        fetch: F,
    ) where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
    {
        let slot = FlightSlot {
            key,
            in_flight: self.in_flight.clone(),
            sender: Some(sender),
        };
        let fut = fetch();
        let store = self.store.clone();
        let counters = self.counters.clone();
        Counters::bump(&counters.fetches);

        tokio::spawn(async move {
            let result = fut.await;
            match &result {
                Ok(value) => store.set(&slot.key, value.clone(), Some(ttl)),
                Err(_) => {
                    Counters::bump(&counters.fetch_errors);
                    tracing::debug!("fetch for '{}' failed, nothing cached", slot.key);
                }
            }
            slot.complete(result);
        });
    }
}

impl<V, E> Debug for ReadThrough<V, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadThrough")
            .field("fetch_ttl", &self.fetch_ttl)
            .field("single_flight", &self.single_flight)
            .field("in_flight", &self.in_flight.len())
            .finish()
    }
}
