//! Commands accepted by the engine, already validated against the caller's
//! identity and turn order by the table aggregate before reaching
//! `handle_command`.

use serde::{Deserialize, Serialize};

use super::card::Card;
use super::seat::Seat;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    MakeBid { seat: Seat, bid: i32 },
    GiveUp { seat: Seat },
    PassCards { seat: Seat, to_next: Card, to_prev: Card },
    PlayCard { seat: Seat, card: Card },
    StartGame,
    CancelGame,
    AbortGame { to_blame: Option<Seat> },
    TakeAutomaticTurn { seat: Seat },
}
