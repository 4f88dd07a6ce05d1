//! The Table aggregate: players, seats, lifecycle status, wrapping the pure
//! rules engine. Table owns its own contiguous `last_event_seq` counter —
//! the repository's job is to persist events numbered to match it, not to
//! invent numbering of its own.

use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{Command, Event, GameConfig, GameState, GameStateView, Seat, TableConfig};
use crate::engine;
use crate::error::{AppError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableStatus {
    NotStarted,
    InProgress,
    Finished,
    Aborted,
    Cancelled,
}

/// A seat occupant. `user_id: None` marks a bot; `bot_kind: None` marks a
/// human. Exactly one of the two is ever set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub player_id: String,
    pub seat: Seat,
    pub screen_name: String,
    pub user_id: Option<String>,
    pub bot_kind: Option<String>,
}

impl Player {
    pub fn is_bot(&self) -> bool {
        self.bot_kind.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Table {
    pub id: Uuid,
    pub owner_id: String,
    pub game_name: String,
    pub game_config: GameConfig,
    pub table_config: TableConfig,
    pub players: Vec<Player>,
    pub status: TableStatus,
    pub game_state: Option<GameState>,
    pub last_event_seq: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Table {
    pub fn new(
        id: Uuid,
        owner_id: String,
        game_name: String,
        game_config: GameConfig,
        table_config: TableConfig,
        now: DateTime<Utc>,
    ) -> Self {
        Table {
            id,
            owner_id,
            game_name,
            game_config,
            table_config,
            players: Vec::new(),
            status: TableStatus::NotStarted,
            game_state: None,
            last_event_seq: 0,
            created_at: now,
            updated_at: now,
        }
    }

    fn require_not_started(&self) -> Result<()> {
        if self.status != TableStatus::NotStarted {
            return Err(AppError::rules(
                "table_already_started",
                "players and bots can only be added or removed before the game starts",
            ));
        }
        Ok(())
    }

    fn require_owner(&self, caller: &str) -> Result<()> {
        if self.owner_id != caller {
            return Err(AppError::rules(
                "not_owner",
                "only the table's owner may perform this action",
            ));
        }
        Ok(())
    }

    fn taken_seats(&self) -> Vec<Seat> {
        self.players.iter().map(|p| p.seat).collect()
    }

    fn free_seats(&self) -> Vec<Seat> {
        let taken = self.taken_seats();
        (1..=self.table_config.max_seats)
            .map(Seat)
            .filter(|s| !taken.contains(s))
            .collect()
    }

    fn pick_seat(&self, preferred: Option<Seat>) -> Result<Seat> {
        let free = self.free_seats();
        match preferred {
            Some(seat) => {
                if free.contains(&seat) {
                    Ok(seat)
                } else {
                    Err(AppError::rules("seat_taken", format!("seat {seat} is not free")))
                }
            }
            None => free
                .choose(&mut rand::thread_rng())
                .copied()
                .ok_or_else(|| AppError::rules("table_full", "no free seats remain")),
        }
    }

    pub fn add_human_player(
        &mut self,
        user_id: &str,
        screen_name: &str,
        preferred_seat: Option<Seat>,
    ) -> Result<&Player> {
        self.require_not_started()?;
        if self.players.iter().any(|p| p.user_id.as_deref() == Some(user_id)) {
            return Err(AppError::rules("already_seated", format!("{user_id} is already seated")));
        }
        let seat = self.pick_seat(preferred_seat)?;
        let player = Player {
            player_id: format!("human-{user_id}"),
            seat,
            screen_name: screen_name.to_string(),
            user_id: Some(user_id.to_string()),
            bot_kind: None,
        };
        self.players.push(player);
        Ok(self.players.last().unwrap())
    }

    pub fn add_bot_player(
        &mut self,
        bot_kind: &str,
        initiated_by: &str,
        preferred_seat: Option<Seat>,
    ) -> Result<&Player> {
        self.require_not_started()?;
        self.require_owner(initiated_by)?;
        if !self.table_config.bots_allowed {
            return Err(AppError::rules("bots_not_allowed", "this table does not allow bot players"));
        }
        let seat = self.pick_seat(preferred_seat)?;
        let player = Player {
            player_id: format!("bot-{}", Uuid::new_v4()),
            seat,
            screen_name: format!("Bot ({bot_kind})"),
            user_id: None,
            bot_kind: Some(bot_kind.to_string()),
        };
        self.players.push(player);
        Ok(self.players.last().unwrap())
    }

    pub fn remove_human_player(&mut self, user_id: &str) -> Result<()> {
        self.require_not_started()?;
        let before = self.players.len();
        self.players.retain(|p| p.user_id.as_deref() != Some(user_id));
        if self.players.len() == before {
            return Err(AppError::not_found(format!("no seated player for user {user_id}")));
        }
        Ok(())
    }

    pub fn remove_bot_player(&mut self, seat: Seat, initiated_by: &str) -> Result<()> {
        self.require_not_started()?;
        self.require_owner(initiated_by)?;
        let before = self.players.len();
        self.players.retain(|p| !(p.seat == seat && p.is_bot()));
        if self.players.len() == before {
            return Err(AppError::not_found(format!("no bot seated at {seat}")));
        }
        Ok(())
    }

    fn player_at(&self, seat: Seat) -> Option<&Player> {
        self.players.iter().find(|p| p.seat == seat)
    }

    fn require_in_progress(&self) -> Result<&GameState> {
        if self.status != TableStatus::InProgress {
            return Err(AppError::rules("game_not_in_progress", "the game has not started or has already ended"));
        }
        self.game_state
            .as_ref()
            .ok_or_else(|| AppError::internal("missing_game_state", "table is in_progress with no game state"))
    }

    /// Applies the outcome of a command cascade to table bookkeeping:
    /// updates `game_state`, advances `last_event_seq`, and reflects a
    /// `GameEnded` event into `status`.
    fn commit(&mut self, state: GameState, events: Vec<Event>) -> Vec<Event> {
        if let Some(last) = events.last() {
            self.last_event_seq = last.seq_number;
        }
        if let Some(ending) = &state.ending {
            self.status = match ending.reason {
                crate::domain::EndReason::Finished => TableStatus::Finished,
                crate::domain::EndReason::Cancelled => TableStatus::Cancelled,
                crate::domain::EndReason::Aborted => TableStatus::Aborted,
            };
        }
        self.game_state = Some(state);
        events
    }

    pub fn start_game(&mut self, initiated_by: &str) -> Result<Vec<Event>> {
        self.require_owner(initiated_by)?;
        if self.status != TableStatus::NotStarted {
            return Err(AppError::rules("table_already_started", "the game has already started"));
        }
        if (self.players.len() as u8) < self.table_config.min_seats {
            return Err(AppError::rules(
                "not_enough_players",
                format!("need at least {} players to start", self.table_config.min_seats),
            ));
        }
        let taken_seats = self.taken_seats();
        let first_seat = *taken_seats.iter().min().ok_or_else(|| AppError::internal("no_seats", "no seats taken"))?;
        let initial_state = GameState::new(self.game_config, taken_seats, first_seat);
        let (state, events) = engine::process_command(&initial_state, &Command::StartGame, self.last_event_seq + 1)?;
        self.status = TableStatus::InProgress;
        Ok(self.commit(state, events))
    }

    pub fn take_regular_turn(&mut self, user_id: &str, command: Command) -> Result<Vec<Event>> {
        let state = self.require_in_progress()?;
        let acting_seat = command_seat(&command);
        if let Some(seat) = acting_seat {
            match self.player_at(seat) {
                Some(player) if player.user_id.as_deref() == Some(user_id) => {}
                _ => {
                    return Err(AppError::rules(
                        "not_your_turn",
                        format!("{user_id} may not act on behalf of seat {seat}"),
                    ))
                }
            }
            if seat != state.active_seat {
                return Err(AppError::rules(
                    "not_your_turn",
                    format!("seat {} is active, not {seat}", state.active_seat),
                ));
            }
        }
        let (state, events) = engine::process_command(state, &command, self.last_event_seq + 1)?;
        Ok(self.commit(state, events))
    }

    /// `initiated_by` must be seated at the table (any seat, not just the
    /// owner — see the resolved Open Question in DESIGN.md); the active
    /// seat must be occupied by a bot, whose strategy produces the command.
    pub fn take_automatic_turn(
        &mut self,
        initiated_by: &str,
        strategy: &dyn crate::bot::BotStrategy,
    ) -> Result<Vec<Event>> {
        let state = self.require_in_progress()?;
        if !self.players.iter().any(|p| p.user_id.as_deref() == Some(initiated_by)) {
            return Err(AppError::rules("not_seated", format!("{initiated_by} is not seated at this table")));
        }
        let active_seat = state.active_seat;
        let active_player = self
            .player_at(active_seat)
            .ok_or_else(|| AppError::internal("empty_active_seat", format!("seat {active_seat} has no player")))?;
        if !active_player.is_bot() {
            return Err(AppError::rules("not_a_bot_turn", format!("seat {active_seat} is a human player")));
        }
        let command = strategy.create_command(state, active_seat)?;
        let (state, events) = engine::process_command(state, &command, self.last_event_seq + 1)?;
        Ok(self.commit(state, events))
    }

    pub fn cancel_game(&mut self, initiated_by: &str) -> Result<Vec<Event>> {
        self.require_owner(initiated_by)?;
        let state = self.require_in_progress()?;
        let (state, events) = engine::process_command(state, &Command::CancelGame, self.last_event_seq + 1)?;
        Ok(self.commit(state, events))
    }

    pub fn abort_game(&mut self, initiated_by: &str, to_blame: Option<Seat>) -> Result<Vec<Event>> {
        self.require_owner(initiated_by)?;
        let state = self.require_in_progress()?;
        let (state, events) =
            engine::process_command(state, &Command::AbortGame { to_blame }, self.last_event_seq + 1)?;
        Ok(self.commit(state, events))
    }

    /// Seat `viewer_user_id` occupies, if they are seated at all.
    pub fn seat_of(&self, user_id: &str) -> Option<Seat> {
        self.players.iter().find(|p| p.user_id.as_deref() == Some(user_id)).map(|p| p.seat)
    }

    /// Public table fields plus the caller's seat-private game-state
    /// projection, if they are seated.
    pub fn to_view(&self, viewer_user_id: Option<&str>) -> TableView {
        let viewer_seat = viewer_user_id.and_then(|uid| self.seat_of(uid));
        TableView {
            id: self.id,
            owner_id: self.owner_id.clone(),
            game_name: self.game_name.clone(),
            game_config: self.game_config,
            table_config: self.table_config,
            players: self.players.clone(),
            status: self.status,
            game_state: self.game_state.as_ref().map(|s| s.to_view(viewer_seat)),
            last_event_seq: self.last_event_seq,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// The client-facing projection of a `Table`: everyone sees the same
/// players/status, but `game_state` is masked per the viewer's own seat.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableView {
    pub id: Uuid,
    pub owner_id: String,
    pub game_name: String,
    pub game_config: GameConfig,
    pub table_config: TableConfig,
    pub players: Vec<Player>,
    pub status: TableStatus,
    pub game_state: Option<GameStateView>,
    pub last_event_seq: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn command_seat(command: &Command) -> Option<Seat> {
    match command {
        Command::MakeBid { seat, .. }
        | Command::GiveUp { seat }
        | Command::PassCards { seat, .. }
        | Command::PlayCard { seat, .. }
        | Command::TakeAutomaticTurn { seat } => Some(*seat),
        Command::StartGame | Command::CancelGame | Command::AbortGame { .. } => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_table() -> Table {
        Table::new(
            Uuid::new_v4(),
            "owner-1".into(),
            "five_hundred".into(),
            GameConfig::default(),
            TableConfig::default(),
            Utc::now(),
        )
    }

    #[test]
    fn add_human_player_assigns_preferred_seat() {
        let mut table = new_table();
        let player = table.add_human_player("u1", "Alice", Some(Seat(2))).unwrap();
        assert_eq!(player.seat, Seat(2));
        assert_eq!(player.player_id, "human-u1");
    }

    #[test]
    fn duplicate_human_player_is_rejected() {
        let mut table = new_table();
        table.add_human_player("u1", "Alice", Some(Seat(1))).unwrap();
        let err = table.add_human_player("u1", "Alice", Some(Seat(2))).unwrap_err();
        assert!(matches!(err, AppError::Rules { reason, .. } if reason == "already_seated"));
    }

    #[test]
    fn only_owner_can_add_a_bot() {
        let mut table = new_table();
        let err = table.add_bot_player("random", "not-owner", None).unwrap_err();
        assert!(matches!(err, AppError::Rules { reason, .. } if reason == "not_owner"));
    }

    #[test]
    fn start_game_requires_minimum_seats() {
        let mut table = new_table();
        table.add_human_player("u1", "Alice", Some(Seat(1))).unwrap();
        let err = table.start_game("owner-1").unwrap_err();
        assert!(matches!(err, AppError::Rules { reason, .. } if reason == "not_enough_players"));
    }

    #[test]
    fn start_game_deals_hands_and_moves_to_in_progress() {
        let mut table = new_table();
        table.add_human_player("u1", "Alice", Some(Seat(1))).unwrap();
        table.add_human_player("u2", "Bob", Some(Seat(2))).unwrap();
        table.add_human_player("u3", "Cara", Some(Seat(3))).unwrap();
        let events = table.start_game("owner-1").unwrap();
        assert!(!events.is_empty());
        assert_eq!(table.status, TableStatus::InProgress);
        assert_eq!(table.last_event_seq, events.last().unwrap().seq_number);
    }

    #[test]
    fn non_owner_cannot_start_game() {
        let mut table = new_table();
        table.add_human_player("u1", "Alice", Some(Seat(1))).unwrap();
        table.add_human_player("u2", "Bob", Some(Seat(2))).unwrap();
        table.add_human_player("u3", "Cara", Some(Seat(3))).unwrap();
        let err = table.start_game("u1").unwrap_err();
        assert!(matches!(err, AppError::Rules { reason, .. } if reason == "not_owner"));
    }

    #[test]
    fn take_regular_turn_rejects_wrong_seat() {
        let mut table = new_table();
        table.add_human_player("u1", "Alice", Some(Seat(1))).unwrap();
        table.add_human_player("u2", "Bob", Some(Seat(2))).unwrap();
        table.add_human_player("u3", "Cara", Some(Seat(3))).unwrap();
        table.start_game("owner-1").unwrap();
        let err = table
            .take_regular_turn("u2", Command::MakeBid { seat: Seat(2), bid: -1 })
            .unwrap_err();
        assert!(matches!(err, AppError::Rules { reason, .. } if reason == "not_your_turn"));
    }
}
