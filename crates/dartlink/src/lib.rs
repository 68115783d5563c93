//! # Dartlink
//!
//! Synchronized two-player darts (101, double-out) over a pub/sub
//! channel service.
//!
//! The meta-crate ties the layers together: `dartlink-scoring` judges
//! darts, `dartlink-game` runs the turn machine, `dartlink-pairing`
//! finds the opponent, and `dartlink-channel` moves the messages. A
//! [`Session`] drives all of them from a single event loop.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use dartlink::prelude::*;
//!
//! # async fn demo() -> Result<(), DartlinkError> {
//! let hub = MemoryHub::new();
//! let client = hub.client(PlayerIdentity::generate("Alice"));
//! let (session, handle) = Session::connect(client, SessionConfig::new("Alice")).await?;
//! tokio::spawn(session.run());
//!
//! handle.command(Command::Throw(ButtonInput::Number(20))).await;
//! println!("score: {}", handle.view().score_self);
//! # Ok(())
//! # }
//! ```

mod error;
mod session;

pub use error::DartlinkError;
pub use session::{Command, GameView, Session, SessionConfig, SessionHandle};

pub mod prelude {
    //! Everything a client application typically needs.

    pub use crate::{Command, DartlinkError, GameView, Session, SessionConfig, SessionHandle};
    pub use dartlink_channel::{ChannelService, MemoryHub};
    #[cfg(feature = "relay")]
    pub use dartlink_channel::{RelayClient, RelayServer};
    pub use dartlink_game::{GameConfig, GamePhase, Role};
    pub use dartlink_protocol::{ChannelId, PlayerIdentity};
    pub use dartlink_scoring::{ButtonInput, DartToken, Multiplier};
}
