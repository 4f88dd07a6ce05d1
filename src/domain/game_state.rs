//! The full Five Hundred game state: the round in progress, archived round
//! results, the running summary, and game-over bookkeeping.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::config::GameConfig;
use super::ending::GameEnding;
use super::phase::Phase;
use super::round::Round;
use super::round_results::RoundResults;
use super::seat::Seat;
use super::seat_info::SeatInfoView;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameState {
    pub round: Round,
    pub results: Vec<RoundResults>,
    pub summary: BTreeMap<Seat, i32>,
    pub active_seat: Seat,
    pub ending: Option<GameEnding>,
    pub game_config: GameConfig,
    pub taken_seats: Vec<Seat>,
    pub turn_number: u64,
    pub event_number: u64,
    pub replay_safe_event_number: u64,
}

impl GameState {
    /// Initial state before the first `DeckShuffled` is applied: round 0,
    /// `Phase::Initializing`, every seat's summary at the game's starting
    /// points.
    pub fn new(game_config: GameConfig, taken_seats: Vec<Seat>, first_seat: Seat) -> Self {
        let summary = taken_seats
            .iter()
            .map(|&seat| (seat, super::config::GAME_STARTING_POINTS))
            .collect();
        GameState {
            round: Round::new(0, first_seat, &taken_seats),
            results: Vec::new(),
            summary,
            active_seat: first_seat,
            ending: None,
            game_config,
            taken_seats,
            turn_number: 0,
            event_number: 0,
            replay_safe_event_number: 0,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.ending.is_some() || self.round.phase == Phase::GameEnded
    }

    /// Project this state for a specific seat (`Some`) or for a spectator
    /// (`None`): the viewer's own hand, points and marriage history are
    /// visible; every other seat is masked to its hand size.
    pub fn to_view(&self, viewer: Option<Seat>) -> GameStateView {
        let seat_infos = self
            .round
            .seat_infos
            .iter()
            .map(|(&seat, info)| (seat, info.to_view(Some(seat) == viewer)))
            .collect();
        GameStateView {
            round_number: self.round.round_number,
            phase: self.round.phase,
            seat_infos,
            cards_on_board: self.round.cards_on_board.clone(),
            required_suit: self.round.required_suit,
            trump_suit: self.round.trump_suit,
            highest_bid: self.round.highest_bid,
            kitty_size: self.round.cards_to_take.len(),
            results: self.results.clone(),
            summary: self.summary.clone(),
            active_seat: self.active_seat,
            ending: self.ending.clone(),
            turn_number: self.turn_number,
            event_number: self.event_number,
        }
    }
}

/// The client-facing projection of `GameState`: masks other seats' hands,
/// points and marriage history behind `SeatInfoView`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameStateView {
    pub round_number: u32,
    pub phase: Phase,
    pub seat_infos: BTreeMap<Seat, SeatInfoView>,
    pub cards_on_board: BTreeMap<Seat, super::card::Card>,
    pub required_suit: Option<super::card::Suit>,
    pub trump_suit: Option<super::card::Suit>,
    pub highest_bid: Option<super::round::Bid>,
    pub kitty_size: usize,
    pub results: Vec<RoundResults>,
    pub summary: BTreeMap<Seat, i32>,
    pub active_seat: Seat,
    pub ending: Option<GameEnding>,
    pub turn_number: u64,
    pub event_number: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_state_starts_every_seat_at_game_starting_points() {
        let state = GameState::new(GameConfig::default(), vec![Seat(1), Seat(2), Seat(3)], Seat(1));
        assert_eq!(state.summary[&Seat(1)], super::super::config::GAME_STARTING_POINTS);
        assert!(!state.is_finished());
    }

    #[test]
    fn view_masks_other_seats() {
        let mut state = GameState::new(GameConfig::default(), vec![Seat(1), Seat(2), Seat(3)], Seat(1));
        state.round.seat_infos.get_mut(&Seat(1)).unwrap().points = 30;
        let view = state.to_view(Some(Seat(2)));
        assert_eq!(view.seat_infos[&Seat(1)].points, None);
        let own_view = state.to_view(Some(Seat(1)));
        assert_eq!(own_view.seat_infos[&Seat(1)].points, Some(30));
    }
}
