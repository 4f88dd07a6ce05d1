//! The 24-card Five Hundred deck: build, shuffle, destructive draw.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::card::{Card, Rank, Suit};

/// A 24-card deck (full suit × {9,J,Q,K,T,A}). Drawing pops from the back of
/// `cards`, so the deck remembers its initial post-shuffle order and is fully
/// reproducible from the `DeckShuffled` event's serialized `cards` field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deck {
    cards: Vec<Card>,
}

impl Deck {
    /// Build the canonical 24 cards in a fixed, unshuffled order.
    pub fn build() -> Self {
        let mut cards = Vec::with_capacity(24);
        for suit in Suit::ALL {
            for rank in Rank::ALL {
                cards.push(Card::new(suit, rank));
            }
        }
        Deck { cards }
    }

    /// Build and shuffle using the given RNG (seedable for tests).
    pub fn build_shuffled<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let mut deck = Self::build();
        deck.cards.shuffle(rng);
        deck
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    /// Destructively draw one card from the top (back of the vec).
    pub fn draw_one(&mut self) -> Option<Card> {
        self.cards.pop()
    }

    /// Destructively draw up to `count` cards from the top.
    pub fn draw_many(&mut self, count: usize) -> Vec<Card> {
        let take = count.min(self.cards.len());
        self.cards.split_off(self.cards.len() - take)
    }

    pub fn cards(&self) -> &[Card] {
        &self.cards
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn build_has_24_distinct_cards() {
        let deck = Deck::build();
        assert_eq!(deck.len(), 24);
        let mut seen = std::collections::HashSet::new();
        for card in deck.cards() {
            assert!(seen.insert(*card));
        }
    }

    #[test]
    fn draw_is_destructive_and_reproducible_from_shuffle() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut deck = Deck::build_shuffled(&mut rng);
        let snapshot = deck.clone();

        let kitty = deck.draw_many(3);
        assert_eq!(kitty.len(), 3);
        assert_eq!(deck.len(), 21);

        // Replaying the shuffle event (the snapshot) reproduces the same draw.
        let mut replay = snapshot;
        let replayed_kitty = replay.draw_many(3);
        assert_eq!(kitty, replayed_kitty);
    }

    #[test]
    fn draw_many_saturates_at_remaining_len() {
        let mut deck = Deck::build();
        let all = deck.draw_many(100);
        assert_eq!(all.len(), 24);
        assert!(deck.is_empty());
        assert!(deck.draw_one().is_none());
    }
}
