//! The deterministic Five Hundred rules engine: `handle_command` validates a
//! command against the current state and produces one primary event;
//! `apply_event` is the pure reducer from `(state, event) -> state`;
//! `process_command` drives the cascade between the two via
//! `check_for_additional_events`, matching the original `process_command.py`
//! fixpoint loop.
//!
//! Every function here is pure: no IO, no clock, no randomness beyond an
//! injected RNG for `DeckShuffled`. The table aggregate (`crate::table`) is
//! the only caller, and it has already checked the acting user owns the
//! active seat before a command reaches [`process_command`].

use std::collections::BTreeMap;

use rand::Rng;

use crate::domain::card::Suit;
use crate::domain::config::{
    BID_STEP, CARDS_IN_STARTING_HAND, CARDS_TO_TAKE, LARGE_MARRIAGE_POINTS, MAX_BID, MIN_BID,
    MUST_BID_THRESHOLD, NOT_ALLOWED_TO_BID_THRESHOLD, SMALL_MARRIAGE_POINTS,
};
use crate::domain::deck::Deck;
use crate::domain::ending::{EndReason, GameEnding};
use crate::domain::event::{Event, EventKind};
use crate::domain::game_state::GameState;
use crate::domain::phase::Phase;
use crate::domain::round::Round;
use crate::domain::seat::Seat;
use crate::domain::seat_info::SeatInfo;
use crate::domain::Command;
use crate::error::{AppError, Result};

/// Validate `command` against `state` and produce the one primary event it
/// raises. Does not mutate `state`; callers apply the returned event via
/// [`apply_event`].
pub fn handle_command(state: &GameState, command: &Command) -> Result<EventKind> {
    match command {
        Command::StartGame => handle_start_game(),
        Command::MakeBid { seat, bid } => handle_make_bid(state, *seat, *bid),
        Command::GiveUp { seat } => handle_give_up(state, *seat),
        Command::PassCards { seat, to_next, to_prev } => {
            handle_pass_cards(state, *seat, *to_next, *to_prev)
        }
        Command::PlayCard { seat, card } => handle_play_card(state, *seat, *card),
        Command::CancelGame => Ok(EventKind::GameEnded {
            reason: EndReason::Cancelled,
            blamed_seat: None,
        }),
        Command::AbortGame { to_blame } => Ok(EventKind::GameEnded {
            reason: EndReason::Aborted,
            blamed_seat: *to_blame,
        }),
        Command::TakeAutomaticTurn { .. } => Err(AppError::internal(
            "not_a_game_command",
            "take_automatic_turn is resolved to a concrete command by the bot strategy before reaching the engine",
        )),
    }
}

fn handle_start_game() -> Result<EventKind> {
    let mut rng = rand::thread_rng();
    Ok(EventKind::DeckShuffled {
        deck: Deck::build_shuffled(&mut rng),
    })
}

fn handle_make_bid(state: &GameState, seat: Seat, bid: i32) -> Result<EventKind> {
    if state.round.phase != Phase::Bidding {
        return Err(AppError::rules(
            "not_bidding_phase",
            "cannot make bid: round is not in the bidding phase",
        ));
    }
    if seat != state.active_seat {
        return Err(AppError::internal(
            "seat_mismatch",
            format!("make_bid called for {seat} but active seat is {}", state.active_seat),
        ));
    }

    let summary_points = *state.summary.get(&seat).unwrap_or(&0);
    if summary_points >= NOT_ALLOWED_TO_BID_THRESHOLD && bid >= 0 {
        return Err(AppError::rules(
            "bidding_locked_out",
            format!("seat {seat} has reached {NOT_ALLOWED_TO_BID_THRESHOLD} points and may only pass"),
        ));
    }

    if bid >= 0 && bid % BID_STEP != 0 {
        return Err(AppError::rules(
            "invalid_bid_step",
            format!("bid must be a multiple of {BID_STEP}"),
        ));
    }
    if bid >= 0 && bid < MIN_BID {
        return Err(AppError::rules(
            "bid_too_low",
            format!("bid must be at least {MIN_BID}"),
        ));
    }
    if bid > MAX_BID {
        return Err(AppError::rules(
            "bid_too_high",
            format!("bid may not exceed {MAX_BID}"),
        ));
    }
    if bid >= 0 {
        if let Some(highest) = state.round.highest_bid {
            if bid <= highest.amount {
                return Err(AppError::rules(
                    "bid_not_higher",
                    format!("bid must exceed the current highest bid of {}", highest.amount),
                ));
            }
        }
    }

    Ok(EventKind::BidMade { seat, bid })
}

fn handle_give_up(state: &GameState, seat: Seat) -> Result<EventKind> {
    if !matches!(state.round.phase, Phase::FormingHands | Phase::PlayingCards) {
        return Err(AppError::rules(
            "not_playable_phase",
            "cannot give up outside forming-hands or playing-cards phases",
        ));
    }
    if state.round.declarer() != Some(seat) {
        return Err(AppError::rules(
            "not_declarer",
            format!("seat {seat} is not the declarer and cannot give up"),
        ));
    }
    Ok(EventKind::DeclarerGaveUp)
}

fn handle_pass_cards(
    state: &GameState,
    seat: Seat,
    to_next: crate::domain::card::Card,
    to_prev: crate::domain::card::Card,
) -> Result<EventKind> {
    if state.round.phase != Phase::FormingHands {
        return Err(AppError::rules(
            "not_forming_hands_phase",
            "cannot pass cards: round is not in the forming-hands phase",
        ));
    }
    if seat != state.active_seat {
        return Err(AppError::internal(
            "seat_mismatch",
            format!("pass_cards called for {seat} but active seat is {}", state.active_seat),
        ));
    }
    let info = state.round.seat_infos.get(&seat).ok_or_else(|| {
        AppError::internal("unknown_seat", format!("no seat info for {seat}"))
    })?;
    if info.hand.len() != CARDS_IN_STARTING_HAND + CARDS_TO_TAKE {
        return Err(AppError::rules(
            "hidden_cards_not_taken",
            "cannot pass cards before the declarer has taken the hidden cards",
        ));
    }
    if !info.hand.contains(to_next) || !info.hand.contains(to_prev) {
        return Err(AppError::rules(
            "card_not_in_hand",
            "cannot pass a card the active seat does not hold",
        ));
    }
    Ok(EventKind::CardsPassed { to_next, to_prev })
}

fn handle_play_card(state: &GameState, seat: Seat, card: crate::domain::card::Card) -> Result<EventKind> {
    if state.round.phase != Phase::PlayingCards {
        return Err(AppError::rules(
            "not_playing_cards_phase",
            "cannot play card: round is not in the playing-cards phase",
        ));
    }
    if seat != state.active_seat {
        return Err(AppError::internal(
            "seat_mismatch",
            format!("play_card called for {seat} but active seat is {}", state.active_seat),
        ));
    }
    let info = state.round.seat_infos.get(&seat).ok_or_else(|| {
        AppError::internal("unknown_seat", format!("no seat info for {seat}"))
    })?;
    if !info.hand.contains(card) {
        return Err(AppError::rules(
            "card_not_in_hand",
            format!("seat {seat} does not hold {card}"),
        ));
    }
    let allowed = info.cards_allowed_to_play(state.round.required_suit, state.round.trump_suit);
    if !allowed.contains(&card) {
        return Err(AppError::rules(
            "card_not_allowed_to_play",
            format!("{card} is not legal to play given the required/trump suit"),
        ));
    }
    Ok(EventKind::CardPlayed { seat, card })
}

/// Apply one event to `state`, producing the next state. Pure; the only
/// bookkeeping done outside the per-event reducer is stamping `event_number`.
pub fn apply_event(state: &GameState, event: &Event) -> Result<GameState> {
    let mut next = state.clone();
    next.event_number = event.seq_number;
    match &event.kind {
        EventKind::DeckShuffled { deck } => apply_deck_shuffled(next, deck.clone()),
        EventKind::BidMade { seat, bid } => apply_bid_made(next, *seat, *bid),
        EventKind::BiddingFinished { .. } => apply_bidding_finished(next),
        EventKind::HiddenCardsTaken => apply_hidden_cards_taken(next),
        EventKind::DeclarerGaveUp => apply_declarer_gave_up(next),
        EventKind::CardsPassed { to_next, to_prev } => apply_cards_passed(next, *to_next, *to_prev),
        EventKind::CardPlayed { seat, card } => apply_card_played(next, *seat, *card),
        EventKind::MarriagePointsAdded { points, seat } => apply_marriage_points(next, *points, *seat),
        EventKind::TrickTaken { seat, cards } => apply_trick_taken(next, *seat, cards),
        EventKind::RoundFinished {
            round_number,
            declarer,
            given_up,
            points,
        } => apply_round_finished(next, *round_number, *declarer, *given_up, points),
        EventKind::GameEnded { reason, blamed_seat } => apply_game_ended(next, *reason, *blamed_seat),
    }
}

fn apply_deck_shuffled(mut state: GameState, mut deck: Deck) -> Result<GameState> {
    let kitty = deck.draw_many(CARDS_TO_TAKE);
    for seat in state.round.active_seats() {
        let dealt = deck.draw_many(CARDS_IN_STARTING_HAND);
        let info = state.round.seat_infos.entry(seat).or_insert_with(SeatInfo::default);
        info.hand = info.hand.with_added_cards(&dealt);
    }
    state.round.cards_to_take = kitty;
    state.round.phase = Phase::Bidding;
    Ok(state)
}

fn apply_bid_made(mut state: GameState, seat: Seat, bid: i32) -> Result<GameState> {
    if bid > 0 {
        state.round.highest_bid = Some(crate::domain::round::Bid { seat, amount: bid });
    }
    if let Some(info) = state.round.seat_infos.get_mut(&seat) {
        info.bid = bid;
    }
    let next_seat = state.round.next_seat_to_bid(seat)?;
    state.active_seat = next_seat.unwrap_or(seat);
    state.turn_number += 1;
    Ok(state)
}

fn apply_bidding_finished(mut state: GameState) -> Result<GameState> {
    state.round.phase = Phase::FormingHands;
    Ok(state)
}

fn apply_hidden_cards_taken(mut state: GameState) -> Result<GameState> {
    let active = state.active_seat;
    let kitty = std::mem::take(&mut state.round.cards_to_take);
    let info = state
        .round
        .seat_infos
        .get_mut(&active)
        .ok_or_else(|| AppError::internal("unknown_seat", format!("no seat info for {active}")))?;
    info.hand = info.hand.with_added_cards(&kitty);
    Ok(state)
}

fn apply_declarer_gave_up(mut state: GameState) -> Result<GameState> {
    state.turn_number += 1;
    Ok(state)
}

fn apply_cards_passed(
    mut state: GameState,
    to_next: crate::domain::card::Card,
    to_prev: crate::domain::card::Card,
) -> Result<GameState> {
    let active = state.active_seat;
    let active_seats = state.round.active_seats();
    let next_seat = active.next(&active_seats)?;
    let prev_seat = active.prev(&active_seats)?;

    let active_hand = state
        .round
        .seat_infos
        .get(&active)
        .ok_or_else(|| AppError::internal("unknown_seat", format!("no seat info for {active}")))?
        .hand
        .without_cards(&[to_next, to_prev])?;

    if let Some(info) = state.round.seat_infos.get_mut(&active) {
        info.hand = active_hand;
    }
    if let Some(info) = state.round.seat_infos.get_mut(&next_seat) {
        info.hand = info.hand.with_added_cards(&[to_next]);
    }
    if let Some(info) = state.round.seat_infos.get_mut(&prev_seat) {
        info.hand = info.hand.with_added_cards(&[to_prev]);
    }
    state.round.phase = Phase::PlayingCards;
    Ok(state)
}

fn apply_card_played(mut state: GameState, seat: Seat, card: crate::domain::card::Card) -> Result<GameState> {
    let first_of_trick = state.round.cards_on_board.is_empty();
    if let Some(info) = state.round.seat_infos.get_mut(&seat) {
        info.hand = info.hand.without_cards(&[card])?;
    }
    state.round.cards_on_board.insert(seat, card);
    if first_of_trick {
        state.round.required_suit = Some(card.suit);
        if state.round.trump_suit.is_none() {
            state.round.trump_suit = Some(card.suit);
        }
    }
    let active_seats = state.round.active_seats();
    state.active_seat = seat.next(&active_seats)?;
    state.turn_number += 1;
    Ok(state)
}

fn apply_marriage_points(mut state: GameState, points: i32, seat: Seat) -> Result<GameState> {
    if let Some(info) = state.round.seat_infos.get_mut(&seat) {
        info.marriage_points.push(points);
        info.points += points;
    }
    state.round.is_marriage_announced = true;
    Ok(state)
}

fn apply_trick_taken(
    mut state: GameState,
    seat: Seat,
    cards: &[crate::domain::card::Card],
) -> Result<GameState> {
    let trick_points: u32 = cards.iter().map(|c| c.points()).sum();
    let trick: Vec<(Seat, crate::domain::card::Card)> =
        state.round.cards_on_board.iter().map(|(&s, &c)| (s, c)).collect();
    if let Some(info) = state.round.seat_infos.get_mut(&seat) {
        info.points += trick_points as i32;
        info.trick_count += 1;
    }
    state.round.tricks.push(crate::domain::round::Trick { winner: seat, cards: trick });
    state.round.cards_on_board.clear();
    state.round.required_suit = None;
    state.active_seat = seat;
    Ok(state)
}

fn apply_round_finished(
    mut state: GameState,
    round_number: u32,
    declarer: Option<Seat>,
    given_up: bool,
    points: &BTreeMap<Seat, i32>,
) -> Result<GameState> {
    for (seat, delta) in points {
        if let Some(summary) = state.summary.get_mut(seat) {
            *summary -= delta;
        }
    }
    let first_seat_updated = state.round.first_seat.next(&state.taken_seats)?;
    state.results.push(crate::domain::round_results::RoundResults {
        round_number,
        declarer,
        winning_bid: state.round.highest_bid.map(|b| b.amount),
        given_up,
        seat_points: points.clone(),
    });
    state.active_seat = first_seat_updated;
    state.round = Round::new(round_number + 1, first_seat_updated, &state.taken_seats);
    state.replay_safe_event_number = state.event_number;
    Ok(state)
}

fn apply_game_ended(mut state: GameState, reason: EndReason, blamed_seat: Option<Seat>) -> Result<GameState> {
    state.ending = Some(GameEnding::from_summary(reason, blamed_seat, &state.summary));
    state.round.phase = Phase::GameEnded;
    state.round.seat_infos.clear();
    state.round.cards_on_board.clear();
    state.round.cards_to_take.clear();
    state.round.required_suit = None;
    state.round.trump_suit = None;
    state.round.highest_bid = None;
    state.round.is_marriage_announced = false;
    state.replay_safe_event_number = state.event_number;
    Ok(state)
}

/// Run `command` through [`handle_command`], apply the resulting cascade of
/// events via [`apply_event`] and [`check_for_additional_events`], and
/// return every event raised alongside the final state. `seq_base` is the
/// sequence number of the first event in the cascade; subsequent events are
/// numbered contiguously.
pub fn process_command(state: &GameState, command: &Command, seq_base: u64) -> Result<(GameState, Vec<Event>)> {
    let primary = handle_command(state, command)?;
    let mut events = Vec::new();
    let mut current_state = state.clone();
    let mut current_kind = Some(primary);
    let mut seq = seq_base;

    while let Some(kind) = current_kind.take() {
        let event = Event::new(seq, kind);
        current_state = apply_event(&current_state, &event)?;
        let follow_up = check_for_additional_events(&current_state, &event.kind)?;
        events.push(event);
        seq += 1;
        current_kind = follow_up;
    }

    Ok((current_state, events))
}

/// The resolver: given the state produced by `last_event`, decide whether a
/// follow-up event is implied. Mirrors `check_for_additional_events` in the
/// original source, generalized to Rust's exhaustive `match`.
pub fn check_for_additional_events(state: &GameState, last_event: &EventKind) -> Result<Option<EventKind>> {
    match last_event {
        EventKind::BidMade { .. } => {
            // The turn has already advanced (see `apply_bid_made`): if it
            // landed back on the current highest bidder with nobody left
            // able to raise them, or if every seat has now passed, bidding
            // is over.
            let current_highest_bidder = state.round.highest_bid.map(|b| b.seat);
            let next_seat_to_bid = state.round.next_seat_to_bid(state.active_seat)?;
            let all_passed = state.round.seat_infos.values().all(|info| info.bid < 0);
            let highest_bidder_has_no_raiser =
                current_highest_bidder == Some(state.active_seat) && next_seat_to_bid.is_none();
            if highest_bidder_has_no_raiser || all_passed {
                Ok(Some(EventKind::BiddingFinished {
                    bid: state.round.highest_bid.map(|b| b.amount),
                    by: current_highest_bidder,
                }))
            } else {
                Ok(None)
            }
        }
        EventKind::BiddingFinished { .. } => {
            if state.round.highest_bid.is_none() {
                let points = state
                    .round
                    .active_seats()
                    .into_iter()
                    .map(|seat| (seat, 0))
                    .collect();
                Ok(Some(EventKind::RoundFinished {
                    round_number: state.round.round_number,
                    declarer: None,
                    given_up: false,
                    points,
                }))
            } else {
                Ok(Some(EventKind::HiddenCardsTaken))
            }
        }
        EventKind::DeclarerGaveUp => {
            let declarer = state.round.declarer();
            let points = points_per_seat(state, declarer, true);
            Ok(Some(EventKind::RoundFinished {
                round_number: state.round.round_number,
                declarer,
                given_up: true,
                points,
            }))
        }
        EventKind::CardPlayed { seat, card } => check_after_card_played(state, *seat, *card),
        EventKind::TrickTaken { .. } => {
            if state.round.all_hands_empty() {
                let declarer = state.round.declarer();
                let points = points_per_seat(state, declarer, false);
                Ok(Some(EventKind::RoundFinished {
                    round_number: state.round.round_number,
                    declarer,
                    given_up: false,
                    points,
                }))
            } else {
                Ok(None)
            }
        }
        EventKind::RoundFinished { .. } => {
            let any_below_zero = state.summary.values().any(|&p| p <= 0);
            let all_locked_out = state.summary.values().all(|&p| p >= NOT_ALLOWED_TO_BID_THRESHOLD);
            let max_rounds_reached = state.round.round_number >= state.game_config.max_rounds;
            if any_below_zero || all_locked_out || max_rounds_reached {
                Ok(Some(EventKind::GameEnded {
                    reason: EndReason::Finished,
                    blamed_seat: None,
                }))
            } else {
                let mut rng = rand::thread_rng();
                Ok(Some(EventKind::DeckShuffled {
                    deck: Deck::build_shuffled(&mut rng),
                }))
            }
        }
        _ => Ok(None),
    }
}

fn check_after_card_played(
    state: &GameState,
    seat: Seat,
    card: crate::domain::card::Card,
) -> Result<Option<EventKind>> {
    let cards_on_board_count = state.round.cards_on_board_count();
    if cards_on_board_count == 1 {
        let hand_cards = state
            .round
            .seat_infos
            .get(&seat)
            .map(|info| info.hand.cards())
            .unwrap_or(&[]);
        if !is_played_card_part_of_marriage(card, hand_cards) {
            return Ok(None);
        }
        if Some(card.suit) == state.round.trump_suit {
            return Ok(Some(EventKind::MarriagePointsAdded {
                points: LARGE_MARRIAGE_POINTS,
                seat,
            }));
        }
        if state.round.is_marriage_announced {
            return Ok(Some(EventKind::MarriagePointsAdded {
                points: SMALL_MARRIAGE_POINTS,
                seat,
            }));
        }
        Ok(None)
    } else if cards_on_board_count == 3 {
        let trick_cards: Vec<crate::domain::card::Card> = state.round.cards_on_board.values().copied().collect();
        let winning_card = trick_winning_card(&trick_cards, state.round.required_suit, state.round.trump_suit)?;
        let winning_seat = state
            .round
            .cards_on_board
            .iter()
            .find(|(_, &c)| c == winning_card)
            .map(|(&s, _)| s)
            .ok_or_else(|| AppError::internal("no_trick_winner", "could not locate the winning card on the board"))?;
        Ok(Some(EventKind::TrickTaken {
            seat: winning_seat,
            cards: trick_cards,
        }))
    } else {
        Ok(None)
    }
}

/// Whether `played_card`'s king/queen partner of the same suit is still in
/// the player's remaining hand, making it part of an announceable marriage.
fn is_played_card_part_of_marriage(
    played_card: crate::domain::card::Card,
    cards_left_in_hand: &[crate::domain::card::Card],
) -> bool {
    use crate::domain::card::Rank;
    let partner_rank = match played_card.rank {
        Rank::Queen => Rank::King,
        Rank::King => Rank::Queen,
        _ => return false,
    };
    cards_left_in_hand
        .iter()
        .any(|c| c.suit == played_card.suit && c.rank == partner_rank)
}

/// The winning card of a completed trick: highest trump if any trump was
/// played, else the highest card of the required suit.
fn trick_winning_card(
    trick_cards: &[crate::domain::card::Card],
    required_suit: Option<Suit>,
    trump_suit: Option<Suit>,
) -> Result<crate::domain::card::Card> {
    let trump_cards: Vec<crate::domain::card::Card> = trump_suit
        .map(|trump| trick_cards.iter().copied().filter(|c| c.suit == trump).collect())
        .unwrap_or_default();
    let pool = if !trump_cards.is_empty() {
        trump_cards
    } else {
        required_suit
            .map(|required| trick_cards.iter().copied().filter(|c| c.suit == required).collect())
            .unwrap_or_default()
    };
    pool.into_iter()
        .max_by_key(|c| c.strength())
        .ok_or_else(|| AppError::internal("empty_trick", "cannot determine the winner of an empty trick"))
}

/// Round accounting (`points_per_seat`): the per-seat delta subtracted from
/// `summary` once a round finishes.
///
/// With declarer `D` and winning bid `bid`: if `D`'s raw round points (card
/// points plus marriages, forced to 0 if the declarer gave up) meet or beat
/// `bid`, `D`'s delta is `+bid` (summary decreases, moving toward the win at
/// zero); otherwise it's `-bid`. Each non-declarer's delta is their raw round
/// points rounded to the nearest multiple of 5 (round down on a tie-ish diff
/// of 2 or less, else up), unless they've already reached `MUST_BID_THRESHOLD`
/// in which case it's 0. If the declarer gave up, every non-declarer's delta
/// is `-give_up_points` instead (a penalty: the round is spoiled for
/// everyone, not scored from actual trick points). With no declarer, every
/// delta is 0.
pub fn points_per_seat(state: &GameState, declarer: Option<Seat>, given_up: bool) -> BTreeMap<Seat, i32> {
    let Some(declarer) = declarer else {
        return state.round.active_seats().into_iter().map(|seat| (seat, 0)).collect();
    };
    let bid = state.round.highest_bid.map(|b| b.amount).unwrap_or(0);
    let mut deltas = BTreeMap::new();

    for seat in state.round.active_seats() {
        if seat == declarer {
            let raw = if given_up {
                0
            } else {
                state.round.seat_infos.get(&seat).map(|i| i.points).unwrap_or(0)
            };
            let delta = if raw >= bid { bid } else { -bid };
            deltas.insert(seat, delta);
        } else if given_up {
            deltas.insert(seat, -state.game_config.give_up_points);
        } else {
            let summary_points = *state.summary.get(&seat).unwrap_or(&0);
            if summary_points >= MUST_BID_THRESHOLD {
                deltas.insert(seat, 0);
            } else {
                let raw = state.round.seat_infos.get(&seat).map(|i| i.points).unwrap_or(0);
                deltas.insert(seat, round_to_nearest_five(raw));
            }
        }
    }
    deltas
}

fn round_to_nearest_five(points: i32) -> i32 {
    let diff = points.rem_euclid(5);
    if diff > 2 {
        points - diff + 5
    } else {
        points - diff
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::card::{Card, Rank};
    use crate::domain::config::GameConfig;

    fn fresh_state() -> GameState {
        GameState::new(GameConfig::default(), vec![Seat(1), Seat(2), Seat(3)], Seat(1))
    }

    fn apply(state: &GameState, seq: u64, kind: EventKind) -> GameState {
        apply_event(state, &Event::new(seq, kind)).unwrap()
    }

    #[test]
    fn start_game_deals_seven_cards_and_three_kitty() {
        let state = fresh_state();
        let (state, events) = process_command(&state, &Command::StartGame, 1).unwrap();
        assert!(matches!(events[0].kind, EventKind::DeckShuffled { .. }));
        assert_eq!(state.round.phase, Phase::Bidding);
        assert_eq!(state.active_seat, Seat(1));
        assert_eq!(state.round.cards_to_take.len(), 3);
        for seat in &state.taken_seats {
            assert_eq!(state.round.seat_infos[seat].hand.len(), 7);
        }
    }

    #[test]
    fn all_pass_finishes_round_with_zero_points_and_reshuffles() {
        let state = fresh_state();
        let (state, _) = process_command(&state, &Command::StartGame, 1).unwrap();

        let (state, events) = process_command(&state, &Command::MakeBid { seat: Seat(1), bid: -1 }, 2).unwrap();
        let (state, events2) = process_command(&state, &Command::MakeBid { seat: Seat(2), bid: -1 }, 2 + events.len() as u64).unwrap();
        let (state, events3) = process_command(
            &state,
            &Command::MakeBid { seat: Seat(3), bid: -1 },
            2 + events.len() as u64 + events2.len() as u64,
        )
        .unwrap();

        let kinds: Vec<&EventKind> = events3.iter().map(|e| &e.kind).collect();
        assert!(matches!(kinds[0], EventKind::BidMade { seat: Seat(3), bid: -1 }));
        assert!(matches!(kinds[1], EventKind::BiddingFinished { bid: None, by: None }));
        assert!(matches!(kinds[2], EventKind::RoundFinished { declarer: None, given_up: false, .. }));
        assert!(matches!(kinds[3], EventKind::DeckShuffled { .. }));
        for &points in state.summary.values() {
            assert_eq!(points, crate::domain::config::GAME_STARTING_POINTS);
        }
    }

    #[test]
    fn bidding_finished_when_only_bidder_has_no_raiser_left() {
        let state = fresh_state();
        let (state, _) = process_command(&state, &Command::StartGame, 1).unwrap();
        let (state, _) = process_command(&state, &Command::MakeBid { seat: Seat(1), bid: 80 }, 10).unwrap();
        let (state, events) = process_command(&state, &Command::MakeBid { seat: Seat(2), bid: -1 }, 20).unwrap();
        let kinds: Vec<&EventKind> = events.iter().map(|e| &e.kind).collect();
        assert!(matches!(kinds[0], EventKind::BidMade { seat: Seat(2), bid: -1 }));
        assert_eq!(kinds.len(), 1, "seat 3 still owes a bid; bidding should not close yet");
        // seat 3 still owes a bid; only after seat 3 passes does bidding close.
        assert_eq!(state.active_seat, Seat(3));
    }

    #[test]
    fn declarer_wins_with_trump_marriage() {
        let state = fresh_state();
        let (mut state, _) = process_command(&state, &Command::StartGame, 1).unwrap();
        // force a deterministic hand: seat 1 holds the club king+queen.
        let kc = Card::new(Suit::Club, Rank::King);
        let qc = Card::new(Suit::Club, Rank::Queen);
        {
            let info = state.round.seat_infos.get_mut(&Seat(1)).unwrap();
            if !info.hand.contains(kc) || !info.hand.contains(qc) {
                let mut cards: Vec<Card> = info.hand.cards().to_vec();
                cards[0] = kc;
                cards[1] = qc;
                info.hand = crate::domain::hand::Hand::new(cards);
            }
        }

        let (state, _) = process_command(&state, &Command::MakeBid { seat: Seat(1), bid: 80 }, 100).unwrap();
        let (state, events) = process_command(&state, &Command::MakeBid { seat: Seat(2), bid: -1 }, 110).unwrap();
        let (state, events2) =
            process_command(&state, &Command::MakeBid { seat: Seat(3), bid: -1 }, 110 + events.len() as u64).unwrap();
        let kinds: Vec<&EventKind> = events2.iter().map(|e| &e.kind).collect();
        assert!(matches!(kinds.iter().find(|k| matches!(k, EventKind::HiddenCardsTaken)), Some(_)));
        assert_eq!(state.round.phase, Phase::FormingHands);
        assert_eq!(state.active_seat, Seat(1));

        let hand = state.round.seat_infos[&Seat(1)].hand.clone();
        let others: Vec<Card> = hand
            .cards()
            .iter()
            .copied()
            .filter(|&c| c != kc && c != qc)
            .take(2)
            .collect();
        let seq = 200;
        let (state, _) =
            process_command(&state, &Command::PassCards { seat: Seat(1), to_next: others[0], to_prev: others[1] }, seq).unwrap();
        assert_eq!(state.round.phase, Phase::PlayingCards);

        let (state, events) = process_command(&state, &Command::PlayCard { seat: Seat(1), card: kc }, seq + 1).unwrap();
        let kinds: Vec<&EventKind> = events.iter().map(|e| &e.kind).collect();
        assert!(matches!(kinds[0], EventKind::CardPlayed { card, .. } if *card == kc));
        assert!(matches!(kinds[1], EventKind::MarriagePointsAdded { points: 40, seat: Seat(1) }));
        assert_eq!(state.round.trump_suit, Some(Suit::Club));
    }

    #[test]
    fn illegal_play_is_rejected_without_mutating_state() {
        let state = fresh_state();
        let (mut state, _) = process_command(&state, &Command::StartGame, 1).unwrap();
        state.round.phase = Phase::PlayingCards;
        state.round.required_suit = Some(Suit::Heart);
        state.round.trump_suit = Some(Suit::Club);
        let info = state.round.seat_infos.get_mut(&Seat(1)).unwrap();
        let mut cards = info.hand.cards().to_vec();
        cards[0] = Card::new(Suit::Heart, Rank::Nine);
        cards[1] = Card::new(Suit::Spade, Rank::Nine);
        info.hand = crate::domain::hand::Hand::new(cards);

        let before = state.clone();
        let err = process_command(&state, &Command::PlayCard { seat: Seat(1), card: Card::new(Suit::Spade, Rank::Nine) }, 500)
            .unwrap_err();
        assert!(matches!(err, AppError::Rules { reason, .. } if reason == "card_not_allowed_to_play"));
        assert_eq!(state, before);
    }

    #[test]
    fn cards_allowed_to_play_is_monotone_under_removal() {
        let state = fresh_state();
        let hand = crate::domain::hand::Hand::new(vec![
            Card::new(Suit::Heart, Rank::Nine),
            Card::new(Suit::Heart, Rank::King),
            Card::new(Suit::Club, Rank::Ace),
        ]);
        let before = hand.cards_allowed_to_play(Some(Suit::Heart), Some(Suit::Club));
        let reduced = hand.without_cards(&[Card::new(Suit::Heart, Rank::King)]).unwrap();
        let after = reduced.cards_allowed_to_play(Some(Suit::Heart), Some(Suit::Club));
        assert!(after.iter().all(|c| before.contains(c)));
        let _ = state;
    }

    #[test]
    fn round_to_nearest_five_rounds_down_on_diff_of_two_and_up_beyond() {
        assert_eq!(round_to_nearest_five(42), 40);
        assert_eq!(round_to_nearest_five(43), 45);
        assert_eq!(round_to_nearest_five(45), 45);
    }

    #[test]
    fn points_per_seat_all_passed_is_zero_everywhere() {
        let state = fresh_state();
        let points = points_per_seat(&state, None, false);
        assert!(points.values().all(|&p| p == 0));
    }

    #[test]
    fn given_up_declarer_forfeits_bid_and_losers_pay_give_up_points() {
        let mut state = fresh_state();
        state.round.highest_bid = Some(crate::domain::round::Bid { seat: Seat(1), amount: 80 });
        let points = points_per_seat(&state, Some(Seat(1)), true);
        assert_eq!(points[&Seat(1)], 80);
        assert_eq!(points[&Seat(2)], -state.game_config.give_up_points);
        assert_eq!(points[&Seat(3)], -state.game_config.give_up_points);
    }
}
