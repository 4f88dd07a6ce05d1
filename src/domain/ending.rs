//! Game-over bookkeeping.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::seat::Seat;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    Finished,
    Cancelled,
    Aborted,
}

/// Finalized once the game transitions to `Phase::GameEnded`; `None` while
/// the game is in progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameEnding {
    pub reason: EndReason,
    pub blamed_seat: Option<Seat>,
    pub winners: Vec<Seat>,
    pub losers: Vec<Seat>,
    pub point_diffs: BTreeMap<Seat, i32>,
}

impl GameEnding {
    /// Winners are the seats with the lowest (closest-to-zero) summary;
    /// point diffs are each seat's summary minus the winning summary.
    pub fn from_summary(
        reason: EndReason,
        blamed_seat: Option<Seat>,
        summary: &BTreeMap<Seat, i32>,
    ) -> Self {
        let min = summary.values().copied().min().unwrap_or(0);
        let mut winners = Vec::new();
        let mut losers = Vec::new();
        let mut point_diffs = BTreeMap::new();
        for (&seat, &points) in summary {
            point_diffs.insert(seat, points - min);
            if points == min {
                winners.push(seat);
            } else {
                losers.push(seat);
            }
        }
        GameEnding {
            reason,
            blamed_seat,
            winners,
            losers,
            point_diffs,
        }
    }
}
