//! Periodic snapshot backfill: a `tokio::spawn`'d loop driven by
//! `tokio::time::interval` with `MissedTickBehavior::Skip`, logging what it
//! did instead of erroring the process on a single table's failure.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;

use crate::cache::{SnapshotCache, SnapshotEntry};
use crate::engine;
use crate::error::Result;
use crate::locks::TaskLock;
use crate::repository::{GameEventRepository, GameTableRepository, TableFilter};
use crate::table::TableStatus;

/// Reconstructs and caches every intermediate state for `table_id` across
/// `[start, end]`, skipping tables that have not started or whose backfill
/// is already in flight elsewhere (§4.9, §8 S6).
pub async fn backfill_snapshots(
    repository: &dyn GameTableRepository,
    events: &dyn GameEventRepository,
    cache: &dyn SnapshotCache,
    lock: &dyn TaskLock,
    table_id: Uuid,
    start: u64,
    end: u64,
) -> Result<usize> {
    let lock_key = format!("backfill:{table_id}:{start}:{end}");
    if !lock.set_lock(&lock_key, Duration::from_secs(60)).await? {
        return Ok(0);
    }

    let outcome = run_backfill(repository, events, cache, table_id, start, end).await;
    lock.release(&lock_key).await?;
    outcome
}

async fn run_backfill(
    repository: &dyn GameTableRepository,
    events_repo: &dyn GameEventRepository,
    cache: &dyn SnapshotCache,
    table_id: Uuid,
    start: u64,
    end: u64,
) -> Result<usize> {
    let table = repository.find_by_id(table_id).await?;
    if table.status == TableStatus::NotStarted {
        return Ok(0);
    }

    let cached = if start > 0 { cache.get_exact_or_nearest(table_id, start).await? } else { None };
    let (mut state, replay_from) = match cached {
        Some(found) => (found.state, found.event_number + 1),
        None => {
            let taken_seats = table.players.iter().map(|p| p.seat).collect::<Vec<_>>();
            let first_seat = *taken_seats
                .iter()
                .min()
                .ok_or_else(|| crate::error::AppError::internal("no_seats", "no seats taken"))?;
            (crate::domain::GameState::new(table.game_config, taken_seats, first_seat), 1)
        }
    };

    let pending = events_repo.find_many(table_id, Some(replay_from), Some(end)).await?;
    let mut snapshots = vec![SnapshotEntry { table_id, event_number: state.event_number, state: state.clone() }];
    for event in &pending {
        state = engine::apply_event(&state, event)?;
        snapshots.push(SnapshotEntry { table_id, event_number: state.event_number, state: state.clone() });
    }
    let count = snapshots.len();
    cache.store(snapshots).await?;
    Ok(count)
}

/// How large the gap between `lastEventSeq` and `replaySafeEventNumber`
/// must grow before a table is selected for backfill on the next sweep.
pub const DEFAULT_GAP_THRESHOLD: u64 = 50;

/// Periodic sweeper: scans all in-progress tables whose unreplayed gap
/// exceeds `gap_threshold` and backfills each one.
pub struct SnapshotBackfiller {
    repository: Arc<dyn GameTableRepository>,
    events: Arc<dyn GameEventRepository>,
    cache: Arc<dyn SnapshotCache>,
    lock: Arc<dyn TaskLock>,
    interval: Duration,
    gap_threshold: u64,
}

impl SnapshotBackfiller {
    pub fn new(
        repository: Arc<dyn GameTableRepository>,
        events: Arc<dyn GameEventRepository>,
        cache: Arc<dyn SnapshotCache>,
        lock: Arc<dyn TaskLock>,
    ) -> Self {
        SnapshotBackfiller {
            repository,
            events,
            cache,
            lock,
            interval: Duration::from_secs(30),
            gap_threshold: DEFAULT_GAP_THRESHOLD,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_gap_threshold(mut self, gap_threshold: u64) -> Self {
        self.gap_threshold = gap_threshold;
        self
    }

    /// Runs one sweep over every in-progress table, returning how many
    /// tables were backfilled (for tests and manual invocation).
    pub async fn sweep_once(&self) -> Result<usize> {
        let tables = self
            .repository
            .find_many(TableFilter {
                status: Some(vec![TableStatus::InProgress]),
                ..Default::default()
            })
            .await?;

        let mut backfilled = 0;
        for table in tables {
            let replay_safe = table.game_state.as_ref().map(|s| s.replay_safe_event_number).unwrap_or(0);
            if table.last_event_seq.saturating_sub(replay_safe) < self.gap_threshold {
                continue;
            }
            match backfill_snapshots(
                self.repository.as_ref(),
                self.events.as_ref(),
                self.cache.as_ref(),
                self.lock.as_ref(),
                table.id,
                replay_safe,
                table.last_event_seq,
            )
            .await
            {
                Ok(count) if count > 0 => {
                    backfilled += 1;
                    info!(table_id = %table.id, snapshots = count, "backfilled snapshot cache for table");
                }
                Ok(_) => {}
                Err(e) => warn!(table_id = %table.id, error = %e, "snapshot backfill failed"),
            }
        }
        Ok(backfilled)
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                if let Err(e) = self.sweep_once().await {
                    warn!(error = %e, "snapshot backfill sweep failed");
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::in_memory::InMemorySnapshotCache;
    use crate::domain::Seat;
    use crate::locks::in_memory::InMemoryTaskLock;
    use crate::repository::mock::InMemoryTableRepository;

    async fn seeded_repo() -> (Arc<InMemoryTableRepository>, Uuid) {
        let repo = Arc::new(InMemoryTableRepository::new());
        let table_id = repo
            .create(crate::table::Table::new(
                Uuid::new_v4(),
                "owner-1".into(),
                "five_hundred".into(),
                crate::domain::GameConfig::default(),
                crate::domain::TableConfig::default(),
                chrono::Utc::now(),
            ))
            .await
            .unwrap();
        (repo, table_id)
    }

    #[tokio::test]
    async fn backfill_skips_a_table_that_has_not_started() {
        let (repo, table_id) = seeded_repo().await;
        let cache = InMemorySnapshotCache::new();
        let lock = InMemoryTaskLock::new();
        let count = backfill_snapshots(repo.as_ref(), repo.as_ref(), &cache, &lock, table_id, 0, 10)
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn concurrent_backfill_calls_are_serialized_by_the_lock() {
        let (repo, table_id) = seeded_repo().await;
        repo.modify(
            table_id,
            Box::new(|table| {
                table.status = crate::table::TableStatus::InProgress;
                table.game_state = Some(crate::domain::GameState::new(
                    crate::domain::GameConfig::default(),
                    vec![Seat(1), Seat(2), Seat(3)],
                    Seat(1),
                ));
                Ok(())
            }),
        )
        .await
        .unwrap();

        let cache = InMemorySnapshotCache::new();
        let lock = Arc::new(InMemoryTaskLock::new());
        let first = backfill_snapshots(repo.as_ref(), repo.as_ref(), &cache, lock.as_ref(), table_id, 0, 0)
            .await
            .unwrap();
        assert!(first > 0);

        // Same (table,start,end) key while the lock is still held is a no-op.
        lock.set_lock(&format!("backfill:{table_id}:0:0"), Duration::from_secs(60)).await.unwrap();
        let second = backfill_snapshots(repo.as_ref(), repo.as_ref(), &cache, lock.as_ref(), table_id, 0, 0)
            .await
            .unwrap();
        assert_eq!(second, 0);
    }
}
