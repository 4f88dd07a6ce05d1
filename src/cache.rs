//! Snapshot cache: serialized game states keyed by `(table_id, event_number)`
//! with nearest-prior lookup, so a historical state can be reconstructed by
//! replaying only the events after the closest snapshot at or below the
//! requested event number.
//!
//! The in-memory implementation backs the `standalone` profile, the
//! Redis-backed one (feature `redis`) backs `production`.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::GameState;
use crate::error::Result;

const SNAPSHOT_TTL_SECS: u64 = 6 * 60 * 60;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedSnapshot {
    pub event_number: u64,
    pub state: GameState,
    pub exact: bool,
}

/// A single `(event_number, state)` pair to persist in one batch; produced
/// in bulk by `get_game_state_snapshot`'s replay and by the background
/// backfill job.
#[derive(Debug, Clone)]
pub struct SnapshotEntry {
    pub table_id: Uuid,
    pub event_number: u64,
    pub state: GameState,
}

#[async_trait]
pub trait SnapshotCache: Send + Sync {
    /// Exact match if present; else the highest cached `event_number` that
    /// does not exceed `event_number`.
    async fn get_exact_or_nearest(&self, table_id: Uuid, event_number: u64) -> Result<Option<CachedSnapshot>>;
    async fn store(&self, entries: Vec<SnapshotEntry>) -> Result<()>;
}

pub mod in_memory {
    use std::collections::BTreeMap;
    use std::sync::Arc;

    use tokio::sync::RwLock;
    use tokio::time::Instant;

    use super::*;

    struct Entry {
        state: GameState,
        expires_at: Instant,
    }

    /// `BTreeMap<event_number, Entry>` per table, so nearest-prior lookup is
    /// `range(..=event_number).next_back()`. TTL is checked lazily on read;
    /// there is no background sweep (the backfill job re-populates hot
    /// tables often enough that stale entries are harmless until evicted).
    #[derive(Default)]
    pub struct InMemorySnapshotCache {
        tables: RwLock<std::collections::HashMap<Uuid, BTreeMap<u64, Entry>>>,
    }

    impl InMemorySnapshotCache {
        pub fn new() -> Self {
            Self::default()
        }
    }

    #[async_trait]
    impl SnapshotCache for InMemorySnapshotCache {
        async fn get_exact_or_nearest(&self, table_id: Uuid, event_number: u64) -> Result<Option<CachedSnapshot>> {
            let tables = self.tables.read().await;
            let Some(snapshots) = tables.get(&table_id) else {
                return Ok(None);
            };
            let now = Instant::now();
            let Some((&found_number, entry)) = snapshots.range(..=event_number).next_back() else {
                return Ok(None);
            };
            if entry.expires_at < now {
                return Ok(None);
            }
            Ok(Some(CachedSnapshot {
                event_number: found_number,
                state: entry.state.clone(),
                exact: found_number == event_number,
            }))
        }

        async fn store(&self, entries: Vec<SnapshotEntry>) -> Result<()> {
            let expires_at = Instant::now() + std::time::Duration::from_secs(SNAPSHOT_TTL_SECS);
            let mut tables = self.tables.write().await;
            for entry in entries {
                tables
                    .entry(entry.table_id)
                    .or_default()
                    .insert(entry.event_number, Entry { state: entry.state, expires_at });
            }
            Ok(())
        }
    }

    pub type SharedInMemorySnapshotCache = Arc<InMemorySnapshotCache>;

    #[cfg(test)]
    mod tests {
        use super::*;
        use crate::domain::{GameConfig, Seat};

        fn sample_state() -> GameState {
            GameState::new(GameConfig::default(), vec![Seat(1), Seat(2), Seat(3)], Seat(1))
        }

        #[tokio::test]
        async fn exact_hit_is_marked_exact() {
            let cache = InMemorySnapshotCache::new();
            let table_id = Uuid::new_v4();
            cache
                .store(vec![SnapshotEntry { table_id, event_number: 10, state: sample_state() }])
                .await
                .unwrap();
            let found = cache.get_exact_or_nearest(table_id, 10).await.unwrap().unwrap();
            assert!(found.exact);
            assert_eq!(found.event_number, 10);
        }

        #[tokio::test]
        async fn nearest_prior_when_no_exact_match() {
            let cache = InMemorySnapshotCache::new();
            let table_id = Uuid::new_v4();
            cache
                .store(vec![
                    SnapshotEntry { table_id, event_number: 10, state: sample_state() },
                    SnapshotEntry { table_id, event_number: 30, state: sample_state() },
                ])
                .await
                .unwrap();
            let found = cache.get_exact_or_nearest(table_id, 25).await.unwrap().unwrap();
            assert!(!found.exact);
            assert_eq!(found.event_number, 10);
        }

        #[tokio::test]
        async fn nothing_cached_below_requested_event_is_a_miss() {
            let cache = InMemorySnapshotCache::new();
            let table_id = Uuid::new_v4();
            cache
                .store(vec![SnapshotEntry { table_id, event_number: 30, state: sample_state() }])
                .await
                .unwrap();
            assert!(cache.get_exact_or_nearest(table_id, 5).await.unwrap().is_none());
        }
    }
}

#[cfg(feature = "redis")]
pub mod redis_backed {
    use redis::AsyncCommands;

    use super::*;
    use crate::error::AppError;

    fn snapshot_key(table_id: Uuid, event_number: u64) -> String {
        format!("game_state_snapshot:{table_id}:{event_number}")
    }

    fn index_key(table_id: Uuid) -> String {
        format!("index:zset:tableId:{table_id}")
    }

    /// Redis-backed cache matching §4.7: `SET`+`EXPIRE` per snapshot key, a
    /// secondary sorted set scored by event number for nearest-prior
    /// lookup via `ZREVRANGEBYSCORE ... LIMIT 0 1`.
    pub struct RedisSnapshotCache {
        manager: redis::aio::ConnectionManager,
    }

    impl RedisSnapshotCache {
        pub fn new(manager: redis::aio::ConnectionManager) -> Self {
            RedisSnapshotCache { manager }
        }
    }

    #[async_trait]
    impl SnapshotCache for RedisSnapshotCache {
        async fn get_exact_or_nearest(&self, table_id: Uuid, event_number: u64) -> Result<Option<CachedSnapshot>> {
            let mut conn = self.manager.clone();
            let exact_key = snapshot_key(table_id, event_number);
            let exact: Option<Vec<u8>> = conn.get(&exact_key).await.map_err(AppError::from)?;
            if let Some(bytes) = exact {
                let state: GameState = serde_json::from_slice(&bytes)?;
                return Ok(Some(CachedSnapshot { event_number, state, exact: true }));
            }

            let members: Vec<String> = conn
                .zrevrangebyscore_limit(index_key(table_id), event_number as f64, f64::NEG_INFINITY, 0, 1)
                .await
                .map_err(AppError::from)?;
            let Some(key) = members.into_iter().next() else {
                return Ok(None);
            };
            let Some(bytes): Option<Vec<u8>> = conn.get(&key).await.map_err(AppError::from)? else {
                return Ok(None);
            };
            let found_number = key
                .rsplit(':')
                .next()
                .and_then(|s| s.parse::<u64>().ok())
                .ok_or_else(|| AppError::internal("bad_snapshot_key", key.clone()))?;
            let state: GameState = serde_json::from_slice(&bytes)?;
            Ok(Some(CachedSnapshot { event_number: found_number, state, exact: false }))
        }

        async fn store(&self, entries: Vec<SnapshotEntry>) -> Result<()> {
            let mut conn = self.manager.clone();
            let mut pipe = redis::pipe();
            for entry in &entries {
                let key = snapshot_key(entry.table_id, entry.event_number);
                let bytes = serde_json::to_vec(&entry.state)?;
                pipe.set_ex(&key, bytes, SNAPSHOT_TTL_SECS).ignore();
                pipe.zadd(index_key(entry.table_id), key, entry.event_number as f64).ignore();
            }
            for table_id in entries.iter().map(|e| e.table_id).collect::<std::collections::HashSet<_>>() {
                pipe.expire(index_key(table_id), SNAPSHOT_TTL_SECS as i64).ignore();
            }
            pipe.query_async(&mut conn).await.map_err(AppError::from)?;
            Ok(())
        }
    }
}
