//! Outcome generator: synthetic odds and a biased win/crash coin

use rand::Rng;
use rust_decimal::Decimal;

/// Lowest odds in cents (1.50x)
pub const MIN_ODDS_CENTS: i64 = 150;
/// Highest odds in cents (10.00x)
pub const MAX_ODDS_CENTS: i64 = 1000;
/// A round crashes when a draw from 1..=LOSS_DIE_SIDES lands on 1
pub const LOSS_DIE_SIDES: u32 = 13;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Outcome {
    /// Always scale 2, within [1.50, 10.00]
    pub odds: Decimal,
    pub is_win: bool,
}

/// Draw odds uniformly over the cent grid of [1.50, 10.00] and a result that
/// loses with probability 1/13.
pub fn generate<R: Rng + ?Sized>(rng: &mut R) -> Outcome {
    let cents = rng.gen_range(MIN_ODDS_CENTS..=MAX_ODDS_CENTS);
    let is_win = rng.gen_range(1..=LOSS_DIE_SIDES) != 1;

    Outcome {
        odds: Decimal::new(cents, 2),
        is_win,
    }
}

/// Number of bystanders shown on the result caption
pub fn social_proof_count<R: Rng + ?Sized>(rng: &mut R) -> u32 {
    rng.gen_range(400..=600)
}
