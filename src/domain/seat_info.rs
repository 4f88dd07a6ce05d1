//! Round-local per-seat state.

use serde::{Deserialize, Serialize};

use super::card::{Card, Suit};
use super::hand::Hand;

/// `bid`: 0 = undecided, -1 = passed, >0 = the seat's current bid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct SeatInfo {
    pub hand: Hand,
    pub bid: i32,
    pub points: i32,
    pub trick_count: u32,
    pub marriage_points: Vec<i32>,
}

impl SeatInfo {
    pub fn new(hand: Hand) -> Self {
        SeatInfo {
            hand,
            bid: 0,
            points: 0,
            trick_count: 0,
            marriage_points: Vec::new(),
        }
    }

    pub fn has_bid(&self) -> bool {
        self.bid != 0
    }

    pub fn has_passed(&self) -> bool {
        self.bid < 0
    }

    pub fn cards_allowed_to_play(&self, required_suit: Option<Suit>, trump_suit: Option<Suit>) -> Vec<Card> {
        self.hand.cards_allowed_to_play(required_suit, trump_suit)
    }

    /// Observers seated elsewhere see only the hand's size and the bid; a
    /// seat's own round points, marriage history, and actual hand cards stay
    /// private to everyone else until the round ends.
    pub fn to_view(&self, is_owner: bool) -> SeatInfoView {
        SeatInfoView {
            hand: is_owner.then(|| self.hand.clone()),
            hand_size: self.hand.len(),
            bid: self.bid,
            points: is_owner.then_some(self.points),
            trick_count: self.trick_count,
            marriage_points: is_owner.then(|| self.marriage_points.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeatInfoView {
    pub hand: Option<Hand>,
    pub hand_size: usize,
    pub bid: i32,
    pub points: Option<i32>,
    pub trick_count: u32,
    pub marriage_points: Option<Vec<i32>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_owner_view_masks_points_marriages_and_hand() {
        let mut info = SeatInfo::new(Hand::new(vec![]));
        info.points = 40;
        info.marriage_points.push(40);
        let view = info.to_view(false);
        assert_eq!(view.points, None);
        assert_eq!(view.marriage_points, None);
        assert_eq!(view.hand, None);
        let owner_view = info.to_view(true);
        assert_eq!(owner_view.points, Some(40));
        assert_eq!(owner_view.marriage_points, Some(vec![40]));
        assert_eq!(owner_view.hand, Some(info.hand.clone()));
    }
}
