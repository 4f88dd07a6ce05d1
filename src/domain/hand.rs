//! A player's hand: an ordered multiset of cards, always sorted.

use serde::{Deserialize, Serialize};

use super::card::Card;
use crate::error::AppError;

/// Sorted by (suit, descending strength) on every construction, matching the
/// original dataclass's `__post_init__` sort key.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Hand {
    cards: Vec<Card>,
}

impl Hand {
    pub fn new(cards: Vec<Card>) -> Self {
        let mut hand = Hand { cards };
        hand.sort();
        hand
    }

    fn sort(&mut self) {
        self.cards
            .sort_by(|a, b| a.suit.cmp(&b.suit).then(b.strength().cmp(&a.strength())));
    }

    pub fn cards(&self) -> &[Card] {
        &self.cards
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    pub fn contains(&self, card: Card) -> bool {
        self.cards.contains(&card)
    }

    pub fn with_added_cards(&self, cards: &[Card]) -> Self {
        let mut combined = self.cards.clone();
        combined.extend_from_slice(cards);
        Hand::new(combined)
    }

    /// Returns a new hand with `cards` removed. Fails with
    /// `card_not_in_hand` if any requested card is absent.
    pub fn without_cards(&self, cards: &[Card]) -> Result<Self, AppError> {
        for card in cards {
            if !self.cards.contains(card) {
                return Err(AppError::internal(
                    "card_not_in_hand",
                    format!("could not remove card from hand: {card} is not in the hand"),
                ));
            }
        }
        let remaining: Vec<Card> = self
            .cards
            .iter()
            .copied()
            .filter(|c| !cards.contains(c))
            .collect();
        Ok(Hand::new(remaining))
    }

    /// Cards legal to play given the required and trump suits:
    /// required-suit cards if held, else trump-suit cards if held, else any.
    pub fn cards_allowed_to_play(
        &self,
        required_suit: Option<super::card::Suit>,
        trump_suit: Option<super::card::Suit>,
    ) -> Vec<Card> {
        let (Some(required), Some(trump)) = (required_suit, trump_suit) else {
            return self.cards.clone();
        };
        let matching_required: Vec<Card> = self
            .cards
            .iter()
            .copied()
            .filter(|c| c.suit == required)
            .collect();
        if !matching_required.is_empty() {
            return matching_required;
        }
        let matching_trump: Vec<Card> = self.cards.iter().copied().filter(|c| c.suit == trump).collect();
        if !matching_trump.is_empty() {
            return matching_trump;
        }
        self.cards.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::card::{Rank, Suit};

    fn c(suit: Suit, rank: Rank) -> Card {
        Card::new(suit, rank)
    }

    #[test]
    fn sorts_by_suit_then_descending_strength() {
        let hand = Hand::new(vec![
            c(Suit::Heart, Rank::Nine),
            c(Suit::Club, Rank::Ace),
            c(Suit::Club, Rank::Jack),
        ]);
        assert_eq!(
            hand.cards(),
            &[
                c(Suit::Club, Rank::Ace),
                c(Suit::Club, Rank::Jack),
                c(Suit::Heart, Rank::Nine),
            ]
        );
    }

    #[test]
    fn remove_missing_card_fails() {
        let hand = Hand::new(vec![c(Suit::Club, Rank::Ace)]);
        let err = hand.without_cards(&[c(Suit::Spade, Rank::Nine)]).unwrap_err();
        assert!(matches!(err, AppError::Internal { reason, .. } if reason == "card_not_in_hand"));
    }

    #[test]
    fn cards_allowed_to_play_is_monotone_under_removal() {
        let hand = Hand::new(vec![
            c(Suit::Heart, Rank::Nine),
            c(Suit::Heart, Rank::King),
            c(Suit::Club, Rank::Ace),
        ]);
        let before = hand.cards_allowed_to_play(Some(Suit::Heart), Some(Suit::Club));
        let reduced = hand.without_cards(&[c(Suit::Heart, Rank::King)]).unwrap();
        let after = reduced.cards_allowed_to_play(Some(Suit::Heart), Some(Suit::Club));
        assert!(after.iter().all(|c| before.contains(c)));
        assert!(after.len() <= before.len());
    }

    #[test]
    fn falls_back_to_trump_then_any() {
        let hand = Hand::new(vec![c(Suit::Club, Rank::Ace), c(Suit::Spade, Rank::Nine)]);
        // No hearts held; trump is club -> only club offered.
        let allowed = hand.cards_allowed_to_play(Some(Suit::Heart), Some(Suit::Club));
        assert_eq!(allowed, vec![c(Suit::Club, Rank::Ace)]);

        let hand = Hand::new(vec![c(Suit::Spade, Rank::Nine)]);
        // Neither required nor trump held -> any card.
        let allowed = hand.cards_allowed_to_play(Some(Suit::Heart), Some(Suit::Club));
        assert_eq!(allowed, vec![c(Suit::Spade, Rank::Nine)]);
    }
}
