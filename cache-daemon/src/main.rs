use clip_cache::events::CacheEvent;
use clip_cache::{spawn_sweeper, CacheConfig, CacheStore, ReadThrough, StorageFactory};
use serde_json::Value;
use shared::config::Config;
use std::sync::Arc;
use std::time::Duration;
use storage_engine::DefaultStorageFactory;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Cache handle shared with request handlers.
type ResponseCache = ReadThrough<Value, shared::Error>;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting cache daemon");

    // Load environment variables
    match dotenvy::dotenv() {
        Ok(_) => info!("Loaded environment variables from .env file"),
        Err(_) => info!("No .env file found, using system environment variables"),
    }

    let config = Config::from_env();
    let cache_config = CacheConfig::from(&config);

    // ============================================
    // STEP 1: Build the process-wide store once
    // ============================================
    let (events_tx, events_rx) = broadcast::channel::<CacheEvent>(1024);
    let store: Arc<dyn CacheStore<Value>> =
        DefaultStorageFactory::with_events(events_tx).create_from_config(&cache_config);
    let cache: ResponseCache = ReadThrough::new(store.clone(), &cache_config);

    info!(
        "Cache '{}' ready (single-flight: {}, fetch TTL {:?})",
        cache_config.name, cache_config.single_flight, cache_config.fetch_ttl
    );

    // ============================================
    // STEP 2: Spawn background maintenance
    // ============================================
    let shutdown = CancellationToken::new();
    let sweeper = spawn_sweeper(store, cache_config.sweep_interval, shutdown.clone());
    let reporter = spawn_stats_reporter(cache, cache_config.sweep_interval, shutdown.clone());
    let event_log = spawn_event_logger(events_rx, shutdown.clone());

    // ============================================
    // STEP 3: Wait for shutdown signal
    // ============================================
    shutdown_signal().await;
    shutdown.cancel();

    let _ = tokio::join!(sweeper, reporter, event_log);

    info!("Cache daemon shut down");
    Ok(())
}

fn spawn_stats_reporter(
    cache: ResponseCache,
    period: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    let stats = cache.stats();
                    match serde_json::to_string(&stats) {
                        Ok(json) => info!(
                            "cache stats {} (hit ratio {:.2}, in flight {})",
                            json,
                            stats.hit_ratio(),
                            cache.in_flight()
                        ),
                        Err(e) => tracing::warn!("Failed to encode cache stats: {}", e),
                    }
                }
            }
        }
    })
}

fn spawn_event_logger(
    mut events: broadcast::Receiver<CacheEvent>,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                received = events.recv() => match received {
                    Ok(event) => match serde_json::to_string(&event) {
                        Ok(json) => tracing::debug!("cache event {}", json),
                        Err(e) => tracing::warn!("Failed to encode cache event: {}", e),
                    },
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!("Event log fell behind, skipped {} events", skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
            }
        }
    })
}

// Graceful shutdown handler
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received terminate signal");
        },
    }

    info!("Shutting down gracefully...");
}
