//! Events produced by the rules engine, applied to `GameState` to advance it.
//!
//! Each event carries a per-table monotonic `seq_number`; the tagged payload
//! is what `apply_event` matches on.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::card::Card;
use super::deck::Deck;
use super::ending::EndReason;
use super::seat::Seat;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    DeckShuffled { deck: Deck },
    BidMade { seat: Seat, bid: i32 },
    BiddingFinished { bid: Option<i32>, by: Option<Seat> },
    HiddenCardsTaken,
    DeclarerGaveUp,
    CardsPassed { to_next: Card, to_prev: Card },
    CardPlayed { seat: Seat, card: Card },
    MarriagePointsAdded { points: i32, seat: Seat },
    TrickTaken { seat: Seat, cards: Vec<Card> },
    RoundFinished {
        round_number: u32,
        declarer: Option<Seat>,
        given_up: bool,
        points: BTreeMap<Seat, i32>,
    },
    GameEnded { reason: EndReason, blamed_seat: Option<Seat> },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub seq_number: u64,
    #[serde(flatten)]
    pub kind: EventKind,
}

impl Event {
    pub fn new(seq_number: u64, kind: EventKind) -> Self {
        Event { seq_number, kind }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_serde_round_trip() {
        let event = Event::new(
            7,
            EventKind::BidMade {
                seat: Seat(1),
                bid: 80,
            },
        );
        let json = serde_json::to_string(&event).unwrap();
        let back: Event = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }
}
