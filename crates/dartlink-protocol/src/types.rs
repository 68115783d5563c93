//! Core protocol types for Dartlink's wire format.
//!
//! Field names and type tags are load-bearing: they must match what the
//! peer's decoder expects (`"type": "GAME_STATE"`, camelCase fields,
//! `"player1"`/`"player2"` slot strings). The serde attributes below are
//! the single source of truth for that shape; the tests at the bottom
//! pin it down.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use rand::Rng;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A unique, opaque identifier for one participant.
///
/// Display names are not unique — two players picking the same name must
/// not collide — so identities are generated from the name plus a random
/// hex suffix. Serialized as a plain JSON string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerIdentity(pub String);

impl PlayerIdentity {
    /// Generates a fresh identity for a display name, e.g. `alice-9f3c21d8`.
    pub fn generate(name: &str) -> Self {
        let slug: String = name
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        let slug = if slug.is_empty() { "player" } else { &slug };
        let suffix: u32 = rand::rng().random();
        Self(format!("{slug}-{suffix:08x}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlayerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A named pub/sub channel.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelId(pub String);

impl ChannelId {
    /// The well-known lobby channel shared by all sessions for discovery.
    pub fn lobby() -> Self {
        Self("darts-lobby".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Derives the dedicated two-party game channel for a pair of identities.
///
/// The identities are sorted lexicographically before joining, so both
/// sides compute the identical name without any further negotiation.
pub fn game_channel_id(a: &PlayerIdentity, b: &PlayerIdentity) -> ChannelId {
    let (lo, hi) = if a.0 <= b.0 { (a, b) } else { (b, a) };
    ChannelId(format!("game-{}-{}", lo.0, hi.0))
}

/// Milliseconds since the Unix epoch, for wire timestamps.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

// ---------------------------------------------------------------------------
// Player slots
// ---------------------------------------------------------------------------

/// The wire-level player slot a participant's fields map onto.
///
/// Player1 is the first mover. Each client translates its local/opponent
/// view into these fixed slots when publishing and back when receiving.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayerSlot {
    Player1,
    Player2,
}

impl PlayerSlot {
    /// The opposing slot.
    pub fn other(self) -> Self {
        match self {
            Self::Player1 => Self::Player2,
            Self::Player2 => Self::Player1,
        }
    }
}

impl fmt::Display for PlayerSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Player1 => write!(f, "player1"),
            Self::Player2 => write!(f, "player2"),
        }
    }
}

// ---------------------------------------------------------------------------
// Game state snapshot
// ---------------------------------------------------------------------------

/// A complete, self-sufficient encoding of the shared game state.
///
/// Every snapshot carries both scores, both leg counts, and whose turn it
/// is — enough to fully resynchronize a receiver without reference to any
/// prior message. A lost snapshot is superseded by the next one, never
/// accumulated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameStateSnapshot {
    /// Sender identity, used by receivers to discard their own echo.
    pub player_id: PlayerIdentity,
    pub player1_score: u16,
    pub player2_score: u16,
    pub player1_legs: u32,
    pub player2_legs: u32,
    /// Whose turn it is after this update.
    pub current_player: PlayerSlot,
    pub timestamp: u64,
}

// ---------------------------------------------------------------------------
// DartValue — string token or raw points
// ---------------------------------------------------------------------------

/// The payload of a DART_THROWN notice.
///
/// Normally the dart token string ("T20", "D-Bull"); a bare number is
/// also accepted for compatibility. Purely informational either way —
/// the authoritative update is the GAME_STATE snapshot that follows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DartValue {
    Token(String),
    Points(u32),
}

impl fmt::Display for DartValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Token(s) => write!(f, "{s}"),
            Self::Points(n) => write!(f, "{n}"),
        }
    }
}

// ---------------------------------------------------------------------------
// GameMessage — the tagged union on the wire
// ---------------------------------------------------------------------------

/// Every message exchanged over the lobby and game channels.
///
/// `#[serde(tag = "type")]` produces internally tagged JSON, e.g.
/// `{ "type": "HELLO", "playerId": "...", ... }`. Each variant carries
/// the sender's identity so a client can reject its own echoed messages
/// (the transport does not suppress self-delivery).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum GameMessage {
    /// Lobby announcement: "I'm here, looking for an opponent."
    #[serde(rename = "HELLO", rename_all = "camelCase")]
    Hello {
        player_id: PlayerIdentity,
        player_name: String,
        timestamp: u64,
    },

    /// First mover's reply to a Hello, assigning the sender of that
    /// Hello the second-mover slot.
    #[serde(rename = "WELCOME", rename_all = "camelCase")]
    Welcome {
        player_id: PlayerIdentity,
        player_name: String,
        /// Always `player2`: the newcomer is the second mover.
        new_player_role: PlayerSlot,
        timestamp: u64,
    },

    /// Authoritative full-state broadcast.
    #[serde(rename = "GAME_STATE")]
    GameState(GameStateSnapshot),

    /// Advisory per-dart notice. Receivers log it and wait for the
    /// following GAME_STATE; its value is never applied directly.
    #[serde(rename = "DART_THROWN", rename_all = "camelCase")]
    DartThrown {
        player_id: PlayerIdentity,
        dart_value: DartValue,
        timestamp: u64,
    },

    /// Match-over notice. Exists on the wire for forward compatibility;
    /// clients only log it (no MatchOver state is implemented).
    #[serde(rename = "GAME_OVER", rename_all = "camelCase")]
    GameOver {
        player_id: PlayerIdentity,
        winner: String,
    },
}

impl GameMessage {
    /// The identity of whoever published this message.
    pub fn sender(&self) -> &PlayerIdentity {
        match self {
            Self::Hello { player_id, .. }
            | Self::Welcome { player_id, .. }
            | Self::DartThrown { player_id, .. }
            | Self::GameOver { player_id, .. } => player_id,
            Self::GameState(snapshot) => &snapshot.player_id,
        }
    }

    /// Short tag for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Hello { .. } => "HELLO",
            Self::Welcome { .. } => "WELCOME",
            Self::GameState(_) => "GAME_STATE",
            Self::DartThrown { .. } => "DART_THROWN",
            Self::GameOver { .. } => "GAME_OVER",
        }
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    //! Wire-shape tests. The JSON field names and type tags here are the
    //! contract with the peer; a serde attribute regression means two
    //! clients can no longer talk to each other.

    use super::*;

    fn id(s: &str) -> PlayerIdentity {
        PlayerIdentity(s.to_string())
    }

    // =====================================================================
    // Identities and channels
    // =====================================================================

    #[test]
    fn test_identity_serializes_as_plain_string() {
        let json = serde_json::to_string(&id("alice-01020304")).unwrap();
        assert_eq!(json, "\"alice-01020304\"");
    }

    #[test]
    fn test_generated_identities_are_distinct() {
        let a = PlayerIdentity::generate("Alice");
        let b = PlayerIdentity::generate("Alice");
        assert_ne!(a, b);
        assert!(a.as_str().starts_with("alice-"));
    }

    #[test]
    fn test_generated_identity_slug_strips_non_alphanumerics() {
        let a = PlayerIdentity::generate("Ms. Dart Queen!");
        assert!(a.as_str().starts_with("msdartqueen-"));
        let b = PlayerIdentity::generate("!!!");
        assert!(b.as_str().starts_with("player-"));
    }

    #[test]
    fn test_game_channel_is_order_independent() {
        let a = id("zed-1");
        let b = id("amy-2");
        let ab = game_channel_id(&a, &b);
        let ba = game_channel_id(&b, &a);
        assert_eq!(ab, ba);
        assert_eq!(ab.as_str(), "game-amy-2-zed-1");
    }

    #[test]
    fn test_lobby_channel_name_is_fixed() {
        assert_eq!(ChannelId::lobby().as_str(), "darts-lobby");
    }

    // =====================================================================
    // PlayerSlot
    // =====================================================================

    #[test]
    fn test_player_slot_wire_strings() {
        assert_eq!(
            serde_json::to_string(&PlayerSlot::Player1).unwrap(),
            "\"player1\""
        );
        assert_eq!(
            serde_json::to_string(&PlayerSlot::Player2).unwrap(),
            "\"player2\""
        );
        let p: PlayerSlot = serde_json::from_str("\"player2\"").unwrap();
        assert_eq!(p, PlayerSlot::Player2);
    }

    #[test]
    fn test_player_slot_other() {
        assert_eq!(PlayerSlot::Player1.other(), PlayerSlot::Player2);
        assert_eq!(PlayerSlot::Player2.other(), PlayerSlot::Player1);
    }

    // =====================================================================
    // GameMessage — one shape test per variant
    // =====================================================================

    #[test]
    fn test_hello_json_shape() {
        let msg = GameMessage::Hello {
            player_id: id("alice-1"),
            player_name: "Alice".into(),
            timestamp: 1000,
        };
        let json: serde_json::Value = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "HELLO");
        assert_eq!(json["playerId"], "alice-1");
        assert_eq!(json["playerName"], "Alice");
        assert_eq!(json["timestamp"], 1000);
    }

    #[test]
    fn test_welcome_json_shape() {
        let msg = GameMessage::Welcome {
            player_id: id("alice-1"),
            player_name: "Alice".into(),
            new_player_role: PlayerSlot::Player2,
            timestamp: 1001,
        };
        let json: serde_json::Value = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "WELCOME");
        assert_eq!(json["newPlayerRole"], "player2");
    }

    #[test]
    fn test_game_state_json_shape() {
        let msg = GameMessage::GameState(GameStateSnapshot {
            player_id: id("alice-1"),
            player1_score: 101,
            player2_score: 61,
            player1_legs: 1,
            player2_legs: 0,
            current_player: PlayerSlot::Player2,
            timestamp: 1002,
        });
        let json: serde_json::Value = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "GAME_STATE");
        assert_eq!(json["player1Score"], 101);
        assert_eq!(json["player2Score"], 61);
        assert_eq!(json["player1Legs"], 1);
        assert_eq!(json["player2Legs"], 0);
        assert_eq!(json["currentPlayer"], "player2");
    }

    #[test]
    fn test_dart_thrown_json_shape() {
        let msg = GameMessage::DartThrown {
            player_id: id("bob-2"),
            dart_value: DartValue::Token("T20".into()),
            timestamp: 1003,
        };
        let json: serde_json::Value = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "DART_THROWN");
        assert_eq!(json["dartValue"], "T20");
    }

    #[test]
    fn test_dart_thrown_accepts_numeric_value() {
        // dartValue may be a bare number on the wire.
        let json = r#"{"type":"DART_THROWN","playerId":"x","dartValue":60,"timestamp":1}"#;
        let msg: GameMessage = serde_json::from_str(json).unwrap();
        match msg {
            GameMessage::DartThrown { dart_value, .. } => {
                assert_eq!(dart_value, DartValue::Points(60));
            }
            other => panic!("expected DartThrown, got {other:?}"),
        }
    }

    #[test]
    fn test_game_over_json_shape() {
        let msg = GameMessage::GameOver {
            player_id: id("alice-1"),
            winner: "Alice".into(),
        };
        let json: serde_json::Value = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "GAME_OVER");
        assert_eq!(json["winner"], "Alice");
    }

    #[test]
    fn test_round_trip_all_variants() {
        let snapshot = GameStateSnapshot {
            player_id: id("a"),
            player1_score: 50,
            player2_score: 3,
            player1_legs: 2,
            player2_legs: 2,
            current_player: PlayerSlot::Player1,
            timestamp: 7,
        };
        let msgs = [
            GameMessage::Hello {
                player_id: id("a"),
                player_name: "A".into(),
                timestamp: 1,
            },
            GameMessage::Welcome {
                player_id: id("a"),
                player_name: "A".into(),
                new_player_role: PlayerSlot::Player2,
                timestamp: 2,
            },
            GameMessage::GameState(snapshot),
            GameMessage::DartThrown {
                player_id: id("a"),
                dart_value: DartValue::Token("D16".into()),
                timestamp: 3,
            },
            GameMessage::GameOver {
                player_id: id("a"),
                winner: "A".into(),
            },
        ];
        for msg in msgs {
            let bytes = serde_json::to_vec(&msg).unwrap();
            let decoded: GameMessage = serde_json::from_slice(&bytes).unwrap();
            assert_eq!(msg, decoded);
        }
    }

    #[test]
    fn test_sender_extracted_from_every_variant() {
        let msg = GameMessage::GameOver {
            player_id: id("winner-1"),
            winner: "W".into(),
        };
        assert_eq!(msg.sender(), &id("winner-1"));
    }

    #[test]
    fn test_unknown_type_tag_fails_to_decode() {
        let json = r#"{"type":"REMATCH","playerId":"x"}"#;
        let result: Result<GameMessage, _> = serde_json::from_str(json);
        assert!(result.is_err());
    }
}
