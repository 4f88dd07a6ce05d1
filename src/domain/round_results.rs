//! Archived per-round outcome, kept in `GameState::results` once a round
//! finishes.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::seat::Seat;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundResults {
    pub round_number: u32,
    pub declarer: Option<Seat>,
    pub winning_bid: Option<i32>,
    pub given_up: bool,
    pub seat_points: BTreeMap<Seat, i32>,
}
