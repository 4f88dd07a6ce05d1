//! A single round/hand of play.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::card::{Card, Suit};
use super::phase::Phase;
use super::seat::Seat;
use super::seat_info::SeatInfo;
use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bid {
    pub seat: Seat,
    pub amount: i32,
}

/// A completed trick: the cards played in seat order and the seat that won
/// them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trick {
    pub winner: Seat,
    pub cards: Vec<(Seat, Card)>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Round {
    pub seat_infos: BTreeMap<Seat, SeatInfo>,
    pub cards_on_board: BTreeMap<Seat, Card>,
    pub tricks: Vec<Trick>,
    pub cards_to_take: Vec<Card>,
    pub required_suit: Option<Suit>,
    pub trump_suit: Option<Suit>,
    pub highest_bid: Option<Bid>,
    pub phase: Phase,
    pub round_number: u32,
    pub first_seat: Seat,
    pub is_marriage_announced: bool,
}

impl Round {
    pub fn new(round_number: u32, first_seat: Seat, taken_seats: &[Seat]) -> Self {
        let seat_infos = taken_seats
            .iter()
            .map(|&seat| (seat, SeatInfo::default()))
            .collect();
        Round {
            seat_infos,
            cards_on_board: BTreeMap::new(),
            tricks: Vec::new(),
            cards_to_take: Vec::new(),
            required_suit: None,
            trump_suit: None,
            highest_bid: None,
            phase: Phase::Initializing,
            round_number,
            first_seat,
            is_marriage_announced: false,
        }
    }

    pub fn active_seats(&self) -> Vec<Seat> {
        self.seat_infos.keys().copied().collect()
    }

    pub fn cards_on_board_count(&self) -> usize {
        self.cards_on_board.len()
    }

    pub fn declarer(&self) -> Option<Seat> {
        self.highest_bid.map(|b| b.seat)
    }

    /// Next seat with a right to act in the bidding round, or `None` when
    /// both neighbors of `active_seat` have already passed and bidding is
    /// finished.
    pub fn next_seat_to_bid(&self, active_seat: Seat) -> Result<Option<Seat>, AppError> {
        let active = self.active_seats();
        let next_seat = active_seat.next(&active)?;
        let prev_seat = active_seat.prev(&active)?;
        let next_bid = self.seat_infos.get(&next_seat).map(|i| i.bid).unwrap_or(0);
        let prev_bid = self.seat_infos.get(&prev_seat).map(|i| i.bid).unwrap_or(0);
        if next_bid >= 0 {
            Ok(Some(next_seat))
        } else if prev_bid >= 0 {
            Ok(Some(prev_seat))
        } else {
            Ok(None)
        }
    }

    pub fn all_hands_empty(&self) -> bool {
        self.seat_infos.values().all(|info| info.hand.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_seat_to_bid_stays_in_rotation_until_two_passes() {
        let mut round = Round::new(1, Seat(1), &[Seat(1), Seat(2), Seat(3)]);
        // Seat 1 bids, seat 2 hasn't acted yet: next is seat 2.
        round.seat_infos.get_mut(&Seat(1)).unwrap().bid = 60;
        assert_eq!(round.next_seat_to_bid(Seat(1)).unwrap(), Some(Seat(2)));

        // Seat 2 passes, seat 3 hasn't acted: next is seat 3.
        round.seat_infos.get_mut(&Seat(2)).unwrap().bid = -1;
        assert_eq!(round.next_seat_to_bid(Seat(2)).unwrap(), Some(Seat(3)));

        // Seat 3 also passes: both neighbors of seat 1 have passed -> done.
        round.seat_infos.get_mut(&Seat(3)).unwrap().bid = -1;
        assert_eq!(round.next_seat_to_bid(Seat(1)).unwrap(), None);
    }
}
