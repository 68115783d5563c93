//! Dart token vocabulary and button-input formatting.
//!
//! Tokens travel on the wire as strings ("T20", "D-Bull", "Miss") so the
//! string forms here are part of the protocol, not just display.

use std::fmt;
use std::str::FromStr;

/// The multiplier selected before a throw. Resets to `Single` after
/// every accepted dart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Multiplier {
    #[default]
    Single,
    Double,
    Triple,
}

impl Multiplier {
    /// Scoring factor for number segments.
    pub fn factor(self) -> u16 {
        match self {
            Self::Single => 1,
            Self::Double => 2,
            Self::Triple => 3,
        }
    }
}

/// A raw button press from the input layer, before the selected
/// multiplier is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonInput {
    /// One of the 1–20 segment buttons.
    Number(u8),
    Bull,
    Miss,
}

/// A single thrown dart, as recorded in the turn buffer.
///
/// The vocabulary is closed: numbers 1–20 with an optional multiplier
/// prefix, the bulls, and a miss. Tokens are only ever constructed from
/// the fixed button set or parsed from a peer's wire string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DartToken {
    Miss,
    /// Single bull (25). Not a valid checkout.
    Bull,
    /// Double bull (50). "D-Bull" on the wire.
    DoubleBull,
    /// A numbered segment with its multiplier.
    Number(Multiplier, u8),
}

impl DartToken {
    /// Point value of this dart.
    pub fn value(&self) -> u16 {
        match self {
            Self::Miss => 0,
            Self::Bull => 25,
            Self::DoubleBull => 50,
            Self::Number(m, n) => m.factor() * u16::from(*n),
        }
    }

    /// True iff this token can end a leg (double-out rule).
    pub fn is_valid_checkout(&self) -> bool {
        matches!(self, Self::DoubleBull | Self::Number(Multiplier::Double, _))
    }

    /// Formats a raw button press under the currently selected
    /// multiplier.
    ///
    /// Numbers pick up a D/T prefix; Bull under Double becomes D-Bull.
    /// Triple+Bull is blocked by the input layer, not here — it falls
    /// back to a plain Bull. Miss ignores the multiplier entirely.
    pub fn from_button(button: ButtonInput, multiplier: Multiplier) -> Self {
        match (button, multiplier) {
            (ButtonInput::Miss, _) => Self::Miss,
            (ButtonInput::Bull, Multiplier::Double) => Self::DoubleBull,
            (ButtonInput::Bull, _) => Self::Bull,
            (ButtonInput::Number(n), m) => Self::Number(m, n),
        }
    }
}

impl fmt::Display for DartToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Miss => write!(f, "Miss"),
            Self::Bull => write!(f, "Bull"),
            Self::DoubleBull => write!(f, "D-Bull"),
            Self::Number(Multiplier::Single, n) => write!(f, "{n}"),
            Self::Number(Multiplier::Double, n) => write!(f, "D{n}"),
            Self::Number(Multiplier::Triple, n) => write!(f, "T{n}"),
        }
    }
}

/// A string that is not in the dart token vocabulary.
#[derive(Debug, Clone, thiserror::Error)]
#[error("unrecognized dart token: {0:?}")]
pub struct TokenParseError(pub String);

impl FromStr for DartToken {
    type Err = TokenParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // An empty slot counts as a miss (value 0), matching the input
        // buffer's empty-string cells.
        match s {
            "" | "Miss" => return Ok(Self::Miss),
            "Bull" => return Ok(Self::Bull),
            "D-Bull" => return Ok(Self::DoubleBull),
            _ => {}
        }

        let (multiplier, digits) = match s.split_at_checked(1) {
            Some(("D", rest)) => (Multiplier::Double, rest),
            Some(("T", rest)) => (Multiplier::Triple, rest),
            _ => (Multiplier::Single, s),
        };

        let n: u8 = digits
            .parse()
            .map_err(|_| TokenParseError(s.to_string()))?;
        if !(1..=20).contains(&n) {
            return Err(TokenParseError(s.to_string()));
        }
        Ok(Self::Number(multiplier, n))
    }
}
