//! Per-table game and table configuration, with Five Hundred defaults.

use serde::{Deserialize, Serialize};

pub const MIN_SEATS: u8 = 3;
pub const MAX_SEATS: u8 = 3;
pub const CARDS_IN_STARTING_HAND: usize = 7;
pub const CARDS_TO_TAKE: usize = 3;
pub const BID_STEP: i32 = 5;
pub const MIN_BID: i32 = 60;
pub const MAX_BID: i32 = 200;
pub const NOT_ALLOWED_TO_BID_THRESHOLD: i32 = 1000;
pub const MUST_BID_THRESHOLD: i32 = 880;
pub const LARGE_MARRIAGE_POINTS: i32 = 40;
pub const SMALL_MARRIAGE_POINTS: i32 = 20;
pub const GAME_STARTING_POINTS: i32 = 500;
pub const DEFAULT_GIVE_UP_POINTS: i32 = 50;
pub const EMPTY_HAND_SIZE: usize = 0;

/// Rules knobs for a single Five Hundred game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameConfig {
    pub max_rounds: u32,
    pub max_bid_no_marriage: i32,
    pub min_bid: i32,
    pub give_up_points: i32,
}

impl Default for GameConfig {
    fn default() -> Self {
        GameConfig {
            max_rounds: 10,
            max_bid_no_marriage: MAX_BID,
            min_bid: MIN_BID,
            give_up_points: DEFAULT_GIVE_UP_POINTS,
        }
    }
}

/// Table-level seating and lifecycle knobs, independent of game rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableConfig {
    pub automatic_start: bool,
    pub bots_allowed: bool,
    pub min_seats: u8,
    pub max_seats: u8,
}

impl Default for TableConfig {
    fn default() -> Self {
        TableConfig {
            automatic_start: false,
            bots_allowed: true,
            min_seats: MIN_SEATS,
            max_seats: MAX_SEATS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_five_hundred_constants() {
        let game = GameConfig::default();
        assert_eq!(game.min_bid, MIN_BID);
        let table = TableConfig::default();
        assert_eq!(table.min_seats, 3);
        assert_eq!(table.max_seats, 3);
    }
}
