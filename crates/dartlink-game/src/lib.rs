//! Turn state machine for Dartlink.
//!
//! Each client owns exactly one [`TurnState`]: its authoritative view of
//! both scores, both leg counts, whose turn it is, and the current
//! 3-dart input buffer. Local throws mutate it directly; the peer's
//! view is reconciled by ingesting full [`GameStateSnapshot`] broadcasts.
//!
//! The machine never touches the transport. Every operation returns the
//! wire messages the caller should publish, so state mutation and
//! broadcast ordering are decoupled from callback timing — there is no
//! settle delay anywhere.
//!
//! [`GameStateSnapshot`]: dartlink_protocol::GameStateSnapshot

mod config;
mod role;
mod state;

pub use config::GameConfig;
pub use role::Role;
pub use state::{GamePhase, TurnState};
