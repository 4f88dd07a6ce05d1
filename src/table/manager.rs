//! The Table Manager application service (C6): orchestrates commands
//! against the Table aggregate through the repository's row-locked
//! `modify`/`modify_during_game_action` primitives, then fans state out to
//! connected observers.

use std::collections::BTreeMap;
use std::sync::Arc;

use uuid::Uuid;

use crate::bus::{BusMessage, TableBus};
use crate::cache::{CachedSnapshot, SnapshotCache, SnapshotEntry};
use crate::domain::{Command, GameConfig, GameState, Seat, TableConfig};
use crate::engine;
use crate::error::{AppError, Result};
use crate::registry::Registry;
use crate::repository::{GameEventRepository, GameTableRepository, TableFilter};
use crate::table::aggregate::{Table, TableView};

pub struct TableManager {
    repository: Arc<dyn GameTableRepository>,
    events: Arc<dyn GameEventRepository>,
    cache: Arc<dyn SnapshotCache>,
    bus: Arc<TableBus>,
    registry: Arc<Registry>,
}

impl TableManager {
    pub fn new(
        repository: Arc<dyn GameTableRepository>,
        events: Arc<dyn GameEventRepository>,
        cache: Arc<dyn SnapshotCache>,
        bus: Arc<TableBus>,
        registry: Arc<Registry>,
    ) -> Self {
        TableManager { repository, events, cache, bus, registry }
    }

    pub async fn add_table(
        &self,
        owner_id: &str,
        game_name: &str,
        game_config: Option<GameConfig>,
        table_config: Option<TableConfig>,
    ) -> Result<Uuid> {
        let descriptor = self.registry.get(game_name)?;
        let table = Table::new(
            Uuid::new_v4(),
            owner_id.to_string(),
            game_name.to_string(),
            game_config.unwrap_or_else(descriptor.default_game_config),
            table_config.unwrap_or_else(descriptor.default_table_config),
            chrono::Utc::now(),
        );
        self.repository.create(table).await
    }

    pub async fn remove_table(&self, table_id: Uuid) -> Result<()> {
        self.repository.delete(table_id).await
    }

    /// The shared per-table broadcast bus, for transports that need to
    /// subscribe to a table's group directly (the WebSocket upgrade
    /// handler) rather than only publish through a manager method.
    pub fn bus(&self) -> &Arc<TableBus> {
        &self.bus
    }

    pub async fn get_table(&self, table_id: Uuid, viewer_user_id: Option<&str>) -> Result<TableView> {
        let table = self.repository.find_by_id(table_id).await?;
        Ok(table.to_view(viewer_user_id))
    }

    pub async fn find_tables(&self, filter: TableFilter) -> Result<Vec<TableView>> {
        let tables = self.repository.find_many(filter).await?;
        Ok(tables.into_iter().map(|t| t.to_view(None)).collect())
    }

    async fn after_modify(&self, table: &Table) {
        self.bus
            .publish(table.id, BusMessage::TableAction { table_status: table.status })
            .await;
    }

    /// Broadcasts one combined `game.action` message per §4.8: the events
    /// the command just raised, alongside the public and per-seat-private
    /// projections every subscriber redraws from, in a single message so no
    /// observer can see a projection update split from the events that
    /// caused it.
    async fn publish_events(&self, table: &Table, events: Vec<crate::domain::Event>) {
        let public_game_state = table.game_state.as_ref().map(|s| s.to_view(None));
        let mut private_game_states = BTreeMap::new();
        for player in &table.players {
            if let Some(user_id) = &player.user_id {
                if let Some(state) = &table.game_state {
                    private_game_states.insert(user_id.clone(), state.to_view(Some(player.seat)));
                }
            }
        }
        self.bus
            .publish(
                table.id,
                BusMessage::GameAction {
                    events,
                    public_game_state,
                    private_game_states,
                    table_status: table.status,
                },
            )
            .await;
    }

    pub async fn join_table(&self, table_id: Uuid, user_id: &str, screen_name: &str, preferred_seat: Option<Seat>) -> Result<TableView> {
        let owned_user_id = user_id.to_string();
        let owned_screen_name = screen_name.to_string();
        let table = self
            .repository
            .modify(
                table_id,
                Box::new(move |table| {
                    table.add_human_player(&owned_user_id, &owned_screen_name, preferred_seat)?;
                    Ok(())
                }),
            )
            .await?;
        self.after_modify(&table).await;
        Ok(table.to_view(Some(user_id)))
    }

    pub async fn leave_table(&self, table_id: Uuid, user_id: &str) -> Result<TableView> {
        let owned_user_id = user_id.to_string();
        let table = self
            .repository
            .modify(table_id, Box::new(move |table| table.remove_human_player(&owned_user_id)))
            .await?;
        self.after_modify(&table).await;
        Ok(table.to_view(None))
    }

    pub async fn add_bot_player(&self, table_id: Uuid, bot_kind: &str, initiated_by: &str, preferred_seat: Option<Seat>) -> Result<TableView> {
        let bot_kind = bot_kind.to_string();
        let initiated_by = initiated_by.to_string();
        let table = self
            .repository
            .modify(
                table_id,
                Box::new(move |table| {
                    table.add_bot_player(&bot_kind, &initiated_by, preferred_seat)?;
                    Ok(())
                }),
            )
            .await?;
        self.after_modify(&table).await;
        Ok(table.to_view(None))
    }

    pub async fn remove_bot_player(&self, table_id: Uuid, seat: Seat, initiated_by: &str) -> Result<TableView> {
        let initiated_by = initiated_by.to_string();
        let table = self
            .repository
            .modify(table_id, Box::new(move |table| table.remove_bot_player(seat, &initiated_by)))
            .await?;
        self.after_modify(&table).await;
        Ok(table.to_view(None))
    }

    pub async fn start_game(&self, table_id: Uuid, initiated_by: &str) -> Result<TableView> {
        let initiated_by = initiated_by.to_string();
        let (events, table) = self
            .repository
            .modify_during_game_action(table_id, Box::new(move |table| table.start_game(&initiated_by)))
            .await?;
        self.publish_events(&table, events).await;
        Ok(table.to_view(None))
    }

    pub async fn take_regular_turn(&self, table_id: Uuid, user_id: &str, command: Command) -> Result<TableView> {
        let user_id = user_id.to_string();
        let (events, table) = self
            .repository
            .modify_during_game_action(table_id, Box::new(move |table| table.take_regular_turn(&user_id, command)))
            .await
            .map_err(|e| {
                e.with_context(crate::error::ErrorContext {
                    table_id: Some(table_id),
                    user_id: None,
                    operation: Some("take_regular_turn".to_string()),
                })
            })?;
        self.publish_events(&table, events).await;
        Ok(table.to_view(None))
    }

    pub async fn take_automatic_turn(&self, table_id: Uuid, initiated_by: &str) -> Result<TableView> {
        let table_snapshot = self.repository.find_by_id(table_id).await?;
        let state = table_snapshot
            .game_state
            .as_ref()
            .ok_or_else(|| AppError::rules("game_not_in_progress", "the game has not started"))?;
        let active_seat = state.active_seat;
        let bot_kind = table_snapshot
            .players
            .iter()
            .find(|p| p.seat == active_seat)
            .and_then(|p| p.bot_kind.clone())
            .ok_or_else(|| AppError::rules("not_a_bot_turn", format!("seat {active_seat} is a human player")))?;
        let descriptor = self.registry.get(&table_snapshot.game_name)?;
        let strategy = descriptor.bot_strategy(&bot_kind)?;

        let initiated_by = initiated_by.to_string();
        let (events, table) = self
            .repository
            .modify_during_game_action(
                table_id,
                Box::new(move |table| table.take_automatic_turn(&initiated_by, strategy.as_ref())),
            )
            .await?;
        self.publish_events(&table, events).await;
        Ok(table.to_view(None))
    }

    pub async fn cancel_game(&self, table_id: Uuid, initiated_by: &str) -> Result<TableView> {
        let initiated_by = initiated_by.to_string();
        let (events, table) = self
            .repository
            .modify_during_game_action(table_id, Box::new(move |table| table.cancel_game(&initiated_by)))
            .await?;
        self.publish_events(&table, events).await;
        Ok(table.to_view(None))
    }

    pub async fn abort_game(&self, table_id: Uuid, initiated_by: &str, to_blame: Option<Seat>) -> Result<TableView> {
        let initiated_by = initiated_by.to_string();
        let (events, table) = self
            .repository
            .modify_during_game_action(table_id, Box::new(move |table| table.abort_game(&initiated_by, to_blame)))
            .await?;
        self.publish_events(&table, events).await;
        Ok(table.to_view(None))
    }

    /// Loads `table_id` and reconstructs its state as of `event_number`.
    /// Convenience wrapper around [`Self::get_game_state_snapshot`] for
    /// callers (the HTTP history endpoint) that only have the id, not an
    /// already-loaded `Table`.
    pub async fn get_game_state_snapshot_at(&self, table_id: Uuid, event_number: u64) -> Result<GameState> {
        let table = self.repository.find_by_id(table_id).await?;
        self.get_game_state_snapshot(&table, event_number).await
    }

    /// Reconstructs the game state as of `event_number`, using the cache's
    /// nearest-prior snapshot and replaying only the gap (§4.5, §8 S5).
    pub async fn get_game_state_snapshot(&self, table: &Table, event_number: u64) -> Result<GameState> {
        let replay_safe = table.game_state.as_ref().map(|s| s.replay_safe_event_number).unwrap_or(0);
        if event_number > replay_safe {
            return Err(AppError::rules(
                "event_number_too_large",
                format!("event {event_number} is beyond the replay-safe boundary {replay_safe}"),
            ));
        }

        let cached = self.cache.get_exact_or_nearest(table.id, event_number).await?;
        if let Some(CachedSnapshot { exact: true, state, .. }) = &cached {
            return Ok(state.clone());
        }

        let (mut state, from) = match cached {
            Some(found) => (found.state, found.event_number + 1),
            None => {
                let taken_seats = table.players.iter().map(|p| p.seat).collect::<Vec<_>>();
                let first_seat = *taken_seats.iter().min().ok_or_else(|| AppError::internal("no_seats", "no seats taken"))?;
                (GameState::new(table.game_config, taken_seats, first_seat), 1)
            }
        };

        let events = self.events.find_many(table.id, Some(from), Some(event_number)).await?;
        let mut snapshots = vec![SnapshotEntry { table_id: table.id, event_number: state.event_number, state: state.clone() }];
        for event in &events {
            if state.event_number + 1 != event.seq_number {
                return Err(AppError::internal(
                    "event_number_mismatch",
                    format!("expected event {}, got {}", state.event_number + 1, event.seq_number),
                ));
            }
            state = engine::apply_event(&state, event)?;
            snapshots.push(SnapshotEntry { table_id: table.id, event_number: state.event_number, state: state.clone() });
        }
        self.cache.store(snapshots).await?;
        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::TableBus;
    use crate::cache::in_memory::InMemorySnapshotCache;
    use crate::repository::mock::InMemoryTableRepository;

    fn manager() -> TableManager {
        let repository: Arc<InMemoryTableRepository> = Arc::new(InMemoryTableRepository::new());
        TableManager::new(
            repository.clone(),
            repository,
            Arc::new(InMemorySnapshotCache::new()),
            Arc::new(TableBus::new()),
            Arc::new(Registry::new()),
        )
    }

    #[tokio::test]
    async fn full_table_lifecycle_through_start_game() {
        let manager = manager();
        let table_id = manager.add_table("owner-1", "five_hundred", None, None).await.unwrap();
        manager.join_table(table_id, "u1", "Alice", Some(Seat(1))).await.unwrap();
        manager.join_table(table_id, "u2", "Bob", Some(Seat(2))).await.unwrap();
        manager.join_table(table_id, "u3", "Cara", Some(Seat(3))).await.unwrap();
        let view = manager.start_game(table_id, "owner-1").await.unwrap();
        assert_eq!(view.status, crate::table::TableStatus::InProgress);
        assert!(view.game_state.is_some());
    }

    #[tokio::test]
    async fn unknown_game_name_is_rejected_at_creation() {
        let manager = manager();
        let err = manager.add_table("owner-1", "chess", None, None).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn bot_can_take_automatic_turn_when_active() {
        let manager = manager();
        let table_id = manager.add_table("owner-1", "five_hundred", None, None).await.unwrap();
        manager.join_table(table_id, "owner-1", "Owner", Some(Seat(1))).await.unwrap();
        manager.add_bot_player(table_id, "random", "owner-1", Some(Seat(2))).await.unwrap();
        manager.add_bot_player(table_id, "random", "owner-1", Some(Seat(3))).await.unwrap();
        manager.start_game(table_id, "owner-1").await.unwrap();

        let table = manager.repository.find_by_id(table_id).await.unwrap();
        let active_seat = table.game_state.unwrap().active_seat;
        if active_seat != Seat(1) {
            let view = manager.take_automatic_turn(table_id, "owner-1").await.unwrap();
            assert!(view.game_state.is_some());
        }
    }

    #[tokio::test]
    async fn get_game_state_snapshot_rejects_events_past_the_replay_safe_boundary() {
        // Right after `start_game` no round has finished yet, so
        // `replaySafeEventNumber` is still 0: asking for event 1 must fail,
        // not silently replay into the still-live round (§4.5, §8 S5).
        let manager = manager();
        let table_id = manager.add_table("owner-1", "five_hundred", None, None).await.unwrap();
        manager.join_table(table_id, "u1", "Alice", Some(Seat(1))).await.unwrap();
        manager.join_table(table_id, "u2", "Bob", Some(Seat(2))).await.unwrap();
        manager.join_table(table_id, "u3", "Cara", Some(Seat(3))).await.unwrap();
        manager.start_game(table_id, "owner-1").await.unwrap();

        let table = manager.repository.find_by_id(table_id).await.unwrap();
        let err = manager.get_game_state_snapshot(&table, 1).await.unwrap_err();
        assert!(matches!(err, AppError::Rules { reason, .. } if reason == "event_number_too_large"));
    }

    #[tokio::test]
    async fn get_game_state_snapshot_returns_the_initial_state_at_event_zero() {
        let manager = manager();
        let table_id = manager.add_table("owner-1", "five_hundred", None, None).await.unwrap();
        manager.join_table(table_id, "u1", "Alice", Some(Seat(1))).await.unwrap();
        manager.join_table(table_id, "u2", "Bob", Some(Seat(2))).await.unwrap();
        manager.join_table(table_id, "u3", "Cara", Some(Seat(3))).await.unwrap();

        let table = manager.repository.find_by_id(table_id).await.unwrap();
        let state = manager.get_game_state_snapshot(&table, 0).await.unwrap();
        assert_eq!(state.event_number, 0);

        let cached = manager.cache.get_exact_or_nearest(table_id, 0).await.unwrap().unwrap();
        assert!(cached.exact);
    }
}
