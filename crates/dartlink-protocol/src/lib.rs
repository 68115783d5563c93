//! Wire protocol for Dartlink.
//!
//! This crate defines the language two darts clients speak over the
//! channel service:
//!
//! - **Types** ([`GameMessage`], [`GameStateSnapshot`], [`PlayerSlot`],
//!   identity newtypes) — the structures that travel on the wire.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]) — how those messages are
//!   converted to/from bytes.
//! - **Channel naming** ([`game_channel_id`], [`ChannelId::lobby`]) — how
//!   both peers independently derive the same channel names.
//!
//! The protocol layer knows nothing about the transport or the game
//! rules; it only fixes the JSON shapes both sides must agree on.

mod codec;
mod error;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use types::{
    ChannelId, DartValue, GameMessage, GameStateSnapshot, PlayerIdentity,
    PlayerSlot, game_channel_id, now_ms,
};
