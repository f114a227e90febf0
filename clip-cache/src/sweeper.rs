use crate::ports::CacheStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Spawn a task that calls [`CacheStore::cleanup`] every `period` until
/// `shutdown` is cancelled. The first sweep happens one period after start.
pub fn spawn_sweeper<V>(
    store: Arc<dyn CacheStore<V>>,
    period: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()>
where
    V: Send + Sync + 'static,
{
    let first_sweep = time::Instant::now() + period;

    tokio::spawn(async move {
        let mut ticker = time::interval_at(first_sweep, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!("Cache sweeper started, interval {:?}", period);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    let removed = store.cleanup();
                    if removed > 0 {
                        tracing::debug!(
                            "Sweep removed {} stale entries, {} remain",
                            removed,
                            store.len()
                        );
                    }
                }
            }
        }

        tracing::info!("Cache sweeper stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::TtlStore;
    use tokio::time::advance;

    async fn settle() {
        for _ in 0..5 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_removes_stale_entries_on_tick() {
        let store = Arc::new(TtlStore::<u32>::new("test", Duration::from_secs(60)));
        store.set("short", 1, Some(Duration::from_millis(500)));
        store.set("long", 2, Some(Duration::from_secs(30)));

        let shutdown = CancellationToken::new();
        let handle = spawn_sweeper(
            store.clone() as Arc<dyn CacheStore<u32>>,
            Duration::from_secs(1),
            shutdown.clone(),
        );

        // Nothing is stale before the first tick
        advance(Duration::from_millis(400)).await;
        settle().await;
        assert_eq!(store.len(), 2);

        // The short entry expires, and the tick at 1s sweeps it without a read
        advance(Duration::from_millis(700)).await;
        settle().await;
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("long"), Some(2));

        shutdown.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_stops_on_cancel() {
        let store: Arc<dyn CacheStore<u32>> =
            Arc::new(TtlStore::new("test", Duration::from_secs(60)));
        let shutdown = CancellationToken::new();
        let handle = spawn_sweeper(store, Duration::from_secs(1), shutdown.clone());

        shutdown.cancel();
        handle.await.unwrap();
    }
}
