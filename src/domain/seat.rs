//! Seat numbers and ring navigation.

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// A seat number, 1-based. Seats form a ring over a given active set;
/// `next`/`prev` wrap around the minimum/maximum of that set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Seat(pub u8);

impl Seat {
    pub fn next(self, active: &[Seat]) -> Result<Seat, AppError> {
        if active.is_empty() {
            return Err(AppError::internal(
                "no_active_seats",
                "could not get next seat: no possible seats given",
            ));
        }
        let max = active.iter().map(|s| s.0).max().unwrap();
        if self.0 >= max {
            Ok(Seat(active.iter().map(|s| s.0).min().unwrap()))
        } else {
            let next = active.iter().map(|s| s.0).filter(|&n| n > self.0).min().unwrap();
            Ok(Seat(next))
        }
    }

    pub fn prev(self, active: &[Seat]) -> Result<Seat, AppError> {
        if active.is_empty() {
            return Err(AppError::internal(
                "no_active_seats",
                "could not get previous seat: no possible seats given",
            ));
        }
        let min = active.iter().map(|s| s.0).min().unwrap();
        if self.0 <= min {
            Ok(Seat(active.iter().map(|s| s.0).max().unwrap()))
        } else {
            let prev = active.iter().map(|s| s.0).filter(|&n| n < self.0).max().unwrap();
            Ok(Seat(prev))
        }
    }
}

impl std::fmt::Display for Seat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "-{}-", self.0)
    }
}
