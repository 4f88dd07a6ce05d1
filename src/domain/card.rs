//! Card, suit, rank and strength primitives.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Suit {
    Heart,
    Diamond,
    Club,
    Spade,
}

impl Suit {
    pub fn symbol(self) -> char {
        match self {
            Suit::Heart => 'H',
            Suit::Diamond => 'D',
            Suit::Club => 'C',
            Suit::Spade => 'S',
        }
    }

    pub fn from_symbol(symbol: char) -> Result<Self, AppError> {
        match symbol.to_ascii_uppercase() {
            'H' => Ok(Suit::Heart),
            'D' => Ok(Suit::Diamond),
            'C' => Ok(Suit::Club),
            'S' => Ok(Suit::Spade),
            other => Err(AppError::parse(
                "card_suit",
                format!("could not parse card suit from input: {other}"),
            )),
        }
    }

    pub const ALL: [Suit; 4] = [Suit::Heart, Suit::Diamond, Suit::Club, Suit::Spade];
}

impl fmt::Display for Suit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Rank {
    Nine,
    Jack,
    Queen,
    King,
    Ten,
    Ace,
}

impl Rank {
    pub fn symbol(self) -> char {
        match self {
            Rank::Nine => '9',
            Rank::Jack => 'J',
            Rank::Queen => 'Q',
            Rank::King => 'K',
            Rank::Ten => 'T',
            Rank::Ace => 'A',
        }
    }

    pub fn from_symbol(symbol: char) -> Result<Self, AppError> {
        match symbol.to_ascii_uppercase() {
            '9' => Ok(Rank::Nine),
            'J' => Ok(Rank::Jack),
            'Q' => Ok(Rank::Queen),
            'K' => Ok(Rank::King),
            'T' => Ok(Rank::Ten),
            'A' => Ok(Rank::Ace),
            other => Err(AppError::parse(
                "card_rank",
                format!("could not parse card rank from input: {other}"),
            )),
        }
    }

    /// Card point value: 9:0, J:2, Q:3, K:4, T:10, A:11.
    pub fn points(self) -> u32 {
        match self {
            Rank::Nine => 0,
            Rank::Jack => 2,
            Rank::Queen => 3,
            Rank::King => 4,
            Rank::Ten => 10,
            Rank::Ace => 11,
        }
    }

    /// Trick-taking strength, ascending: 9 < J < Q < K < T < A.
    pub fn strength(self) -> u8 {
        match self {
            Rank::Nine => 1,
            Rank::Jack => 2,
            Rank::Queen => 3,
            Rank::King => 4,
            Rank::Ten => 5,
            Rank::Ace => 6,
        }
    }

    pub const ALL: [Rank; 6] = [
        Rank::Nine,
        Rank::Jack,
        Rank::Queen,
        Rank::King,
        Rank::Ten,
        Rank::Ace,
    ];
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

/// An immutable playing card. Textual form is `{rank}{suit}`, e.g. `"KC"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Card {
    pub suit: Suit,
    pub rank: Rank,
}

impl Card {
    pub fn new(suit: Suit, rank: Rank) -> Self {
        Self { suit, rank }
    }

    pub fn points(self) -> u32 {
        self.rank.points()
    }

    pub fn strength(self) -> u8 {
        self.rank.strength()
    }

    pub fn from_str_repr(s: &str) -> Result<Self, AppError> {
        let mut chars = s.chars();
        let rank = chars
            .next()
            .ok_or_else(|| AppError::parse("card_rank", "empty card string"))?;
        let suit = chars
            .next()
            .ok_or_else(|| AppError::parse("card_suit", "missing suit character"))?;
        Ok(Card {
            rank: Rank::from_symbol(rank)?,
            suit: Suit::from_symbol(suit)?,
        })
    }
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.rank, self.suit)
    }
}

impl Serialize for Card {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Card {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Card::from_str_repr(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_string_form() {
        let card = Card::new(Suit::Club, Rank::King);
        assert_eq!(card.to_string(), "KC");
        assert_eq!(Card::from_str_repr("KC").unwrap(), card);
    }

    #[test]
    fn rejects_unknown_symbols() {
        assert!(Card::from_str_repr("XY").is_err());
        assert!(Card::from_str_repr("K").is_err());
    }

    #[test]
    fn points_and_strength_match_spec_table() {
        assert_eq!(Rank::Nine.points(), 0);
        assert_eq!(Rank::Ace.points(), 11);
        assert!(Rank::Nine.strength() < Rank::Jack.strength());
        assert!(Rank::Ten.strength() < Rank::Ace.strength());
    }

    #[test]
    fn serde_round_trip() {
        let card = Card::new(Suit::Heart, Rank::Ten);
        let json = serde_json::to_string(&card).unwrap();
        assert_eq!(json, "\"TH\"");
        let back: Card = serde_json::from_str(&json).unwrap();
        assert_eq!(back, card);
    }
}
