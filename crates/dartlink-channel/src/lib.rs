//! Pub/sub channel service for Dartlink.
//!
//! Provides the [`ChannelService`] trait the session layer talks to,
//! plus two implementations:
//!
//! - [`MemoryHub`] — an in-process hub for tests and same-process demos
//! - [`RelayClient`]/[`RelayServer`] — a WebSocket relay for real
//!   networked play (behind the default `relay` feature)
//!
//! Delivery contract, identical for both implementations:
//!
//! - publishing delivers to **every** subscriber of the channel,
//!   including the publisher itself — self-echo is not suppressed here,
//!   receivers filter on the sender identity
//! - delivery is at-least-once with no ordering guarantee across
//!   publishers; the game protocol tolerates loss and reordering by
//!   broadcasting full snapshots
//! - subscribing and unsubscribing emit presence events to the other
//!   subscribers of the channel

#![allow(async_fn_in_trait)]

mod error;
mod memory;
#[cfg(feature = "relay")]
mod relay;

pub use error::ChannelError;
pub use memory::{MemoryClient, MemoryHub};
#[cfg(feature = "relay")]
pub use relay::{RelayClient, RelayServer};

use dartlink_protocol::{ChannelId, GameMessage, PlayerIdentity};
use tokio::sync::mpsc;

/// A join or leave observed on a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresenceAction {
    Join,
    Leave,
}

/// Everything a subscriber can receive from a channel.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    /// A published game message. The publisher's own messages come back
    /// through here too.
    Message {
        channel: ChannelId,
        message: GameMessage,
    },
    /// Another participant joined or left the channel.
    Presence {
        channel: ChannelId,
        action: PresenceAction,
        identity: PlayerIdentity,
    },
}

impl ChannelEvent {
    /// The channel this event arrived on.
    pub fn channel(&self) -> &ChannelId {
        match self {
            Self::Message { channel, .. } | Self::Presence { channel, .. } => channel,
        }
    }
}

/// A live subscription to one channel.
///
/// Dropping the subscription stops delivery but does not announce a
/// leave; call [`ChannelService::unsubscribe`] for a clean exit.
pub struct Subscription {
    channel: ChannelId,
    rx: mpsc::UnboundedReceiver<ChannelEvent>,
}

impl Subscription {
    pub(crate) fn new(channel: ChannelId, rx: mpsc::UnboundedReceiver<ChannelEvent>) -> Self {
        Self { channel, rx }
    }

    pub fn channel(&self) -> &ChannelId {
        &self.channel
    }

    /// Waits for the next event. Returns `None` once the service side
    /// is gone (unsubscribed or disconnected).
    pub async fn recv(&mut self) -> Option<ChannelEvent> {
        self.rx.recv().await
    }
}

/// The pub/sub operations a game session needs.
///
/// One value of this trait represents one participant: the service
/// knows the caller's identity and attributes presence to it.
pub trait ChannelService: Send + Sync + 'static {
    /// The identity this client joins and publishes as.
    fn identity(&self) -> &PlayerIdentity;

    /// Joins a channel and returns the event stream for it.
    async fn subscribe(&self, channel: &ChannelId) -> Result<Subscription, ChannelError>;

    /// Leaves a channel, announcing the departure to other subscribers.
    async fn unsubscribe(&self, channel: &ChannelId) -> Result<(), ChannelError>;

    /// Publishes a message to every subscriber of the channel,
    /// including this client itself.
    async fn publish(
        &self,
        channel: &ChannelId,
        message: &GameMessage,
    ) -> Result<(), ChannelError>;

    /// The number of participants currently subscribed to the channel.
    async fn here_now(&self, channel: &ChannelId) -> Result<usize, ChannelError>;
}
