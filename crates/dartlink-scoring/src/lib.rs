//! Pure scoring rules for x01 darts.
//!
//! Everything in this crate is a stateless function over [`DartToken`]
//! values. No I/O, no shared state — the turn state machine in
//! `dartlink-game` calls in here for every classification and the answers
//! depend only on the arguments.
//!
//! Checkout rule: a leg ends only when a throw lands *exactly* on zero
//! with a double (`D<n>` or `D-Bull`). Landing on 1 is always a bust
//! because no dart scores exactly 1.

mod token;

pub use token::{ButtonInput, DartToken, Multiplier, TokenParseError};

// ---------------------------------------------------------------------------
// Throw classification
// ---------------------------------------------------------------------------

/// The outcome of subtracting one dart from the current score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThrowOutcome {
    /// The turn continues (or ends normally after the third dart) with
    /// this remaining score.
    Continue { remaining: u16 },
    /// Overshoot, landed on 1, or landed on 0 without a double. The
    /// whole turn is voided and the score restored.
    Bust,
    /// Exact zero with a valid checkout double. Leg won.
    Win,
}

/// Sum of dart values over a turn's input buffer.
pub fn turn_total(tokens: &[DartToken]) -> u16 {
    tokens.iter().map(|t| t.value()).sum()
}

/// Classifies a single throw against the score *before* the throw.
///
/// - Win iff `score_before - value == 0` and the token is a double.
/// - Bust iff the result is negative, exactly 1, or exactly 0 without
///   a qualifying double.
/// - Continue otherwise.
pub fn classify_throw(score_before: u16, token: &DartToken) -> ThrowOutcome {
    let after = i32::from(score_before) - i32::from(token.value());
    if after == 0 && token.is_valid_checkout() {
        ThrowOutcome::Win
    } else if after < 0 || after == 1 || after == 0 {
        ThrowOutcome::Bust
    } else {
        ThrowOutcome::Continue {
            remaining: after as u16,
        }
    }
}
