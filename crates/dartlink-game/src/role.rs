//! Session roles and their mapping onto wire player slots.

use dartlink_protocol::PlayerSlot;

/// Which side of the pairing this client is.
///
/// Assigned exactly once per session by the pairing protocol and
/// immutable thereafter. The role decides how the local/opponent fields
/// map onto the wire-level player1/player2 encoding: the first mover is
/// always player1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Role {
    /// Pairing has not completed yet.
    #[default]
    Unassigned,
    /// This client discovered the lobby first and moves first.
    FirstMover,
    /// This client joined an occupied lobby and moves second.
    SecondMover,
}

impl Role {
    /// The wire slot this role publishes its own fields under.
    pub fn slot(self) -> Option<PlayerSlot> {
        match self {
            Self::Unassigned => None,
            Self::FirstMover => Some(PlayerSlot::Player1),
            Self::SecondMover => Some(PlayerSlot::Player2),
        }
    }

    /// The role owning a given wire slot.
    pub fn from_slot(slot: PlayerSlot) -> Self {
        match slot {
            PlayerSlot::Player1 => Self::FirstMover,
            PlayerSlot::Player2 => Self::SecondMover,
        }
    }

    /// The opposing role. Unassigned has no opponent.
    pub fn other(self) -> Self {
        match self {
            Self::Unassigned => Self::Unassigned,
            Self::FirstMover => Self::SecondMover,
            Self::SecondMover => Self::FirstMover,
        }
    }

    /// True once the pairing protocol has fixed this role.
    pub fn is_assigned(self) -> bool {
        !matches!(self, Self::Unassigned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_mapping_round_trips() {
        assert_eq!(Role::FirstMover.slot(), Some(PlayerSlot::Player1));
        assert_eq!(Role::SecondMover.slot(), Some(PlayerSlot::Player2));
        assert_eq!(Role::Unassigned.slot(), None);
        assert_eq!(Role::from_slot(PlayerSlot::Player1), Role::FirstMover);
        assert_eq!(Role::from_slot(PlayerSlot::Player2), Role::SecondMover);
    }

    #[test]
    fn test_other() {
        assert_eq!(Role::FirstMover.other(), Role::SecondMover);
        assert_eq!(Role::SecondMover.other(), Role::FirstMover);
        assert_eq!(Role::Unassigned.other(), Role::Unassigned);
    }
}
