//! Bot strategies: pure functions from a game state to the next command a
//! bot-controlled seat should submit. Strategies never mutate state or
//! touch the repository; the table aggregate applies whatever command they
//! return through the same `process_command` path a human's command takes.

use rand::seq::SliceRandom;
use rand::Rng;

use crate::domain::card::Card;
use crate::domain::config::{BID_STEP, MAX_BID, NOT_ALLOWED_TO_BID_THRESHOLD};
use crate::domain::phase::Phase;
use crate::domain::seat::Seat;
use crate::domain::game_state::GameState;
use crate::domain::Command;
use crate::error::{AppError, Result};

/// A named, pluggable bot strategy, looked up by [`crate::registry`] per
/// table so a future game could offer more than one kind of bot.
pub trait BotStrategy: Send + Sync {
    fn kind(&self) -> &'static str;

    /// Synthesize a legal command for `seat` given the current state. `seat`
    /// is assumed to already be `state.active_seat`; the caller
    /// (`Table::take_automatic_turn`) is responsible for that check.
    fn create_command(&self, state: &GameState, seat: Seat) -> Result<Command>;
}

/// The canonical strategy: legal-but-unweighted random choices, matching
/// `five_hundred_random_bot_strategy.py`.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomBotStrategy;

impl BotStrategy for RandomBotStrategy {
    fn kind(&self) -> &'static str {
        "random"
    }

    fn create_command(&self, state: &GameState, seat: Seat) -> Result<Command> {
        match state.round.phase {
            Phase::Bidding => Ok(bid_command(state, seat)),
            Phase::FormingHands => pass_cards_command(state, seat),
            Phase::PlayingCards => play_card_command(state, seat),
            Phase::Initializing | Phase::GameEnded => Err(AppError::internal(
                "no_bot_action",
                format!("no bot action is defined for phase {:?}", state.round.phase),
            )),
        }
    }
}

fn bid_command(state: &GameState, seat: Seat) -> Command {
    let summary_points = *state.summary.get(&seat).unwrap_or(&0);
    if summary_points >= NOT_ALLOWED_TO_BID_THRESHOLD {
        return Command::MakeBid { seat, bid: -1 };
    }

    let current_high = state.round.highest_bid.map(|b| b.amount).unwrap_or(0);
    let mut rng = rand::thread_rng();
    let pass_probability = (current_high as f64 / MAX_BID as f64) + 0.3;
    if rng.gen::<f64>() < pass_probability {
        return Command::MakeBid { seat, bid: -1 };
    }

    let lowest_allowed = (current_high + BID_STEP).max(crate::domain::config::MIN_BID);
    if lowest_allowed > MAX_BID {
        return Command::MakeBid { seat, bid: -1 };
    }
    let step_count = (MAX_BID - lowest_allowed) / BID_STEP;
    let chosen = lowest_allowed + rng.gen_range(0..=step_count) * BID_STEP;
    Command::MakeBid { seat, bid: chosen }
}

fn pass_cards_command(state: &GameState, seat: Seat) -> Result<Command> {
    let info = state
        .round
        .seat_infos
        .get(&seat)
        .ok_or_else(|| AppError::internal("unknown_seat", format!("no seat info for {seat}")))?;
    let cards: Vec<Card> = info.hand.cards().to_vec();
    if cards.len() < 2 {
        return Err(AppError::internal(
            "insufficient_cards_to_pass",
            format!("seat {seat} holds fewer than two cards while forming hands"),
        ));
    }
    let mut rng = rand::thread_rng();
    let mut indices: Vec<usize> = (0..cards.len()).collect();
    indices.shuffle(&mut rng);
    let (first, second) = (indices[0], indices[1]);
    Ok(Command::PassCards {
        seat,
        to_next: cards[first],
        to_prev: cards[second],
    })
}

fn play_card_command(state: &GameState, seat: Seat) -> Result<Command> {
    let info = state
        .round
        .seat_infos
        .get(&seat)
        .ok_or_else(|| AppError::internal("unknown_seat", format!("no seat info for {seat}")))?;
    let allowed = info.cards_allowed_to_play(state.round.required_suit, state.round.trump_suit);
    let mut rng = rand::thread_rng();
    let card = *allowed
        .choose(&mut rng)
        .ok_or_else(|| AppError::internal("no_legal_card", format!("seat {seat} has no legal card to play")))?;
    Ok(Command::PlayCard { seat, card })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::config::GameConfig;

    fn state_in_phase(phase: Phase) -> GameState {
        let mut state = GameState::new(GameConfig::default(), vec![Seat(1), Seat(2), Seat(3)], Seat(1));
        state.round.phase = phase;
        state
    }

    #[test]
    fn bidding_locked_out_seat_always_passes() {
        let mut state = state_in_phase(Phase::Bidding);
        state.summary.insert(Seat(1), crate::domain::config::NOT_ALLOWED_TO_BID_THRESHOLD);
        let strategy = RandomBotStrategy;
        let cmd = strategy.create_command(&state, Seat(1)).unwrap();
        assert!(matches!(cmd, Command::MakeBid { bid: -1, .. }));
    }

    #[test]
    fn bid_when_made_is_a_valid_multiple_of_step_in_range() {
        let state = state_in_phase(Phase::Bidding);
        let strategy = RandomBotStrategy;
        for _ in 0..50 {
            if let Command::MakeBid { bid, .. } = strategy.create_command(&state, Seat(1)).unwrap() {
                if bid >= 0 {
                    assert_eq!(bid % BID_STEP, 0);
                    assert!(bid >= crate::domain::config::MIN_BID && bid <= MAX_BID);
                }
            }
        }
    }

    #[test]
    fn play_card_only_chooses_from_allowed_cards() {
        use crate::domain::card::{Rank, Suit};
        use crate::domain::hand::Hand;
        let mut state = state_in_phase(Phase::PlayingCards);
        state.round.required_suit = Some(Suit::Heart);
        state.round.trump_suit = Some(Suit::Club);
        let hand = Hand::new(vec![
            Card::new(Suit::Heart, Rank::Nine),
            Card::new(Suit::Club, Rank::Ace),
            Card::new(Suit::Spade, Rank::King),
        ]);
        state.round.seat_infos.get_mut(&Seat(1)).unwrap().hand = hand;
        let strategy = RandomBotStrategy;
        let cmd = strategy.create_command(&state, Seat(1)).unwrap();
        match cmd {
            Command::PlayCard { card, .. } => assert_eq!(card, Card::new(Suit::Heart, Rank::Nine)),
            other => panic!("expected a play_card command, got {other:?}"),
        }
    }

    #[test]
    fn pass_cards_chooses_two_distinct_cards_from_hand() {
        let mut state = state_in_phase(Phase::FormingHands);
        let mut rng = rand::thread_rng();
        let hand = crate::domain::deck::Deck::build_shuffled(&mut rng);
        let _ = hand;
        let info = state.round.seat_infos.get_mut(&Seat(1)).unwrap();
        info.hand = crate::domain::hand::Hand::new(
            crate::domain::deck::Deck::build().cards()[0..10].to_vec(),
        );
        let strategy = RandomBotStrategy;
        let cmd = strategy.create_command(&state, Seat(1)).unwrap();
        match cmd {
            Command::PassCards { to_next, to_prev, .. } => assert_ne!(to_next, to_prev),
            other => panic!("expected a pass_cards command, got {other:?}"),
        }
    }
}
