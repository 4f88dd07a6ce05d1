//! Process entrypoint: wires storage/cache/lock/bus backends per
//! configuration, starts the snapshot backfiller, and serves the
//! HTTP/WebSocket transport until asked to shut down.

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gametables::auth::{StaticTokenVerifier, TokenVerifier};
use gametables::background::SnapshotBackfiller;
use gametables::bus::TableBus;
use gametables::cache::{in_memory::InMemorySnapshotCache, SnapshotCache};
use gametables::config::{CacheBackend, Settings, StorageBackend};
use gametables::locks::{in_memory::InMemoryTaskLock, TaskLock};
use gametables::registry::Registry;
use gametables::repository::mock::InMemoryTableRepository;
use gametables::repository::{GameEventRepository, GameTableRepository};
use gametables::table::TableManager;
use gametables::transport::{build_router, AppState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli_path = std::env::args().nth(1);
    let settings = Settings::load(cli_path.as_deref())?;

    let default_filter = if settings.log_filter.is_empty() { "info".to_string() } else { settings.log_filter.clone() };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_env("GAMETABLES_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    let (repository, events): (Arc<dyn GameTableRepository>, Arc<dyn GameEventRepository>) = match settings.storage.backend {
        #[cfg(feature = "sqlite")]
        StorageBackend::Sqlite => {
            let pool = sqlx::SqlitePool::connect(&settings.storage.sqlite_path).await?;
            let repo = gametables::repository::sqlite::SqliteTableRepository::new(pool);
            repo.init().await?;
            let repo = Arc::new(repo);
            (repo.clone(), repo)
        }
        #[cfg(not(feature = "sqlite"))]
        StorageBackend::Sqlite => {
            return Err("storage.backend = sqlite requires the `sqlite` feature".into());
        }
        StorageBackend::InMemory => {
            let repo = Arc::new(InMemoryTableRepository::new());
            (repo.clone(), repo)
        }
    };

    let cache: Arc<dyn SnapshotCache> = match settings.cache.backend {
        #[cfg(feature = "redis")]
        CacheBackend::Redis => {
            let redis_url = settings.cache.redis_url.clone().ok_or("cache.backend = redis requires cache.redis_url")?;
            let client = redis::Client::open(redis_url)?;
            let manager = redis::aio::ConnectionManager::new(client).await?;
            Arc::new(gametables::cache::redis_backed::RedisSnapshotCache::new(manager))
        }
        #[cfg(not(feature = "redis"))]
        CacheBackend::Redis => {
            return Err("cache.backend = redis requires the `redis` feature".into());
        }
        CacheBackend::InMemory => Arc::new(InMemorySnapshotCache::new()),
    };

    let lock: Arc<dyn TaskLock> = match settings.cache.backend {
        #[cfg(feature = "redis")]
        CacheBackend::Redis => {
            let redis_url = settings.cache.redis_url.clone().ok_or("cache.backend = redis requires cache.redis_url")?;
            let client = redis::Client::open(redis_url)?;
            let manager = redis::aio::ConnectionManager::new(client).await?;
            Arc::new(gametables::locks::redis_backed::RedisTaskLock::new(manager))
        }
        _ => Arc::new(InMemoryTaskLock::new()),
    };

    let bus = Arc::new(TableBus::new());
    let registry = Arc::new(Registry::new());
    let manager = Arc::new(TableManager::new(repository.clone(), events.clone(), cache.clone(), bus, registry));

    let backfiller = SnapshotBackfiller::new(repository, events, cache, lock)
        .with_interval(std::time::Duration::from_secs(settings.game.backfill_interval_secs))
        .with_gap_threshold(settings.game.backfill_gap_threshold);
    backfiller.spawn();

    let verifier: Arc<dyn TokenVerifier> = Arc::new(StaticTokenVerifier);
    let state = AppState { manager, verifier };
    let router = build_router(state);

    let address = format!("{}:{}", settings.server.host, settings.server.port);
    let listener = tokio::net::TcpListener::bind(&address).await?;
    tracing::info!(%address, "gametables server listening");

    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
